use serde::{Deserialize, Serialize};

/// A job assigned to a core.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decision {
    pub frame_id: u64,
    pub scene_id: u64,
    pub job_id: u64,
    pub core_id: usize,
}
