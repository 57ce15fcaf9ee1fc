use serde::{Deserialize, Serialize};

/// Descriptor of a GPU-visible allocation.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: u64,
    pub start_addr: u64,
    /// Last byte of the allocation (inclusive).
    pub end_addr: u64,
    #[serde(default)]
    pub name: Option<String>,
}

impl Resource {
    #[must_use]
    pub fn num_bytes(&self) -> u64 {
        self.end_addr.saturating_sub(self.start_addr) + 1
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("start_addr", &format_args!("{:#x}", self.start_addr))
            .field("size", &human_bytes::human_bytes(self.num_bytes() as f64))
            .finish()
    }
}
