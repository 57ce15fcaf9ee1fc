use serde::{Deserialize, Serialize};

/// Work done by a single core during a frame.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Core {
    pub core_id: usize,
    pub jobs: u64,
    pub packets: u64,
}

impl std::ops::AddAssign for Core {
    fn add_assign(&mut self, other: Self) {
        self.jobs += other.jobs;
        self.packets += other.packets;
    }
}

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub id: u64,
    /// Frame was replayed only to warm up state before the measured region.
    pub fast_forwarded: bool,
    pub cores: Vec<Core>,
}

impl Frame {
    #[must_use]
    pub fn total(&self) -> Core {
        let mut total = Core::default();
        for core in &self.cores {
            total += core.clone();
        }
        total
    }
}
