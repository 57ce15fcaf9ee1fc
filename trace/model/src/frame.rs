use super::Device;
use serde::{Deserialize, Serialize};

/// A captured frame.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub id: u64,
    /// Global ids of the scenes rendered in this frame.
    pub scenes: Vec<u64>,
}

/// A scene (render pass) within a frame.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// Scene number within its frame.
    pub id: u64,
    pub frame_id: u64,
    /// Scene number across all frames.
    pub global_id: u64,
    /// Width of the scene in tiles.
    pub width: u32,
    /// Height of the scene in tiles.
    pub height: u32,
    /// Jobs of the scene in submission order.
    pub jobs: Vec<u64>,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JobKind {
    Misc,
    Draw,
    Tile { x: u32, y: u32 },
}

/// A unit of device work.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub frame_id: u64,
    pub scene_id: u64,
    pub device: Device,
    pub kind: JobKind,
}

impl Job {
    #[must_use]
    pub fn tile(&self) -> Option<(u32, u32)> {
        match self.kind {
            JobKind::Tile { x, y } => Some((x, y)),
            JobKind::Misc | JobKind::Draw => None,
        }
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            JobKind::Tile { x, y } => {
                write!(f, "Job({}, {} tile x={x} y={y})", self.id, self.device)
            }
            JobKind::Draw => write!(f, "Job({}, {} draw)", self.id, self.device),
            JobKind::Misc => write!(f, "Job({}, {} misc)", self.id, self.device),
        }
    }
}
