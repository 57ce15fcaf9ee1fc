use serde::{Deserialize, Serialize};

/// Number of scenes of a frame that touched a cache line.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameBlockUsers {
    pub frame_id: u64,
    pub addr: u64,
    pub scene_users: u32,
}

/// Number of jobs of a scene that touched a cache line.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneBlockUsers {
    pub frame_id: u64,
    pub scene_id: u64,
    pub addr: u64,
    pub task_users: u32,
}
