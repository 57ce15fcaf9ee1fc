use super::Error;
use std::collections::HashMap;
use std::path::PathBuf;
use trace_model::{FrameBlockUsers, SceneBlockUsers};

/// Oracle classifying cache lines by how many scenes or jobs share them.
///
/// `None` means no classification is available for the frame or scene.
pub trait Classification: std::fmt::Debug {
    fn frame_blocks(&self, frame_id: u64) -> Result<Option<Vec<FrameBlockUsers>>, Error>;

    fn scene_blocks(
        &self,
        frame_id: u64,
        scene_id: u64,
    ) -> Result<Option<Vec<SceneBlockUsers>>, Error>;
}

#[derive(Debug, Default, Clone)]
pub struct Memory {
    frames: HashMap<u64, Vec<FrameBlockUsers>>,
    scenes: HashMap<(u64, u64), Vec<SceneBlockUsers>>,
}

impl Memory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_frame(mut self, frame_id: u64, blocks: Vec<FrameBlockUsers>) -> Self {
        self.frames.insert(frame_id, blocks);
        self
    }

    #[must_use]
    pub fn with_scene(mut self, frame_id: u64, scene_id: u64, blocks: Vec<SceneBlockUsers>) -> Self {
        self.scenes.insert((frame_id, scene_id), blocks);
        self
    }
}

impl Classification for Memory {
    fn frame_blocks(&self, frame_id: u64) -> Result<Option<Vec<FrameBlockUsers>>, Error> {
        Ok(self.frames.get(&frame_id).cloned())
    }

    fn scene_blocks(
        &self,
        frame_id: u64,
        scene_id: u64,
    ) -> Result<Option<Vec<SceneBlockUsers>>, Error> {
        Ok(self.scenes.get(&(frame_id, scene_id)).cloned())
    }
}

/// Classification files of a benchmark.
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
    benchmark: String,
}

impl Dir {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, benchmark: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            benchmark: benchmark.into(),
        }
    }

    #[must_use]
    pub fn frame_path(&self, frame_id: u64) -> PathBuf {
        self.path.join(&self.benchmark).join(format!(
            "{}_fr_{frame_id}_cacheline_classification.json",
            self.benchmark
        ))
    }

    #[must_use]
    pub fn scene_path(&self, frame_id: u64, scene_id: u64) -> PathBuf {
        self.path.join(&self.benchmark).join(format!(
            "{}_fr_{frame_id}_sc_{scene_id}_cacheline_classification.json",
            self.benchmark
        ))
    }

    fn read<T>(path: PathBuf) -> Result<Option<T>, Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let reader = match utils::fs::open_readable(&path) {
            Ok(reader) => reader,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let value = serde_json::from_reader(reader).map_err(|err| Error::parse(&path, err))?;
        Ok(Some(value))
    }
}

impl Classification for Dir {
    fn frame_blocks(&self, frame_id: u64) -> Result<Option<Vec<FrameBlockUsers>>, Error> {
        Self::read(self.frame_path(frame_id))
    }

    fn scene_blocks(
        &self,
        frame_id: u64,
        scene_id: u64,
    ) -> Result<Option<Vec<SceneBlockUsers>>, Error> {
        Self::read(self.scene_path(frame_id, scene_id))
    }
}
