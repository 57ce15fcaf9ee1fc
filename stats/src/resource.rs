use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum State {
    ALIVE,
    DEAD,
    ZOMBIE,
}

/// Per-frame usage of a resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub frame_id: u64,
    pub id: u64,
    pub state: State,
    pub num_blocks: u64,
    /// Blocks fetched from memory.
    pub read_blocks: u64,
    /// Blocks written back to memory.
    pub write_blocks: u64,
    /// Block reads issued by cores.
    pub core_read_blocks: u64,
    /// Block writes issued by cores.
    pub core_write_blocks: u64,
    /// Distinct blocks moved between cache and memory.
    pub touched_blocks: u64,
    /// Distinct blocks accessed by cores.
    pub core_touched_blocks: u64,
}
