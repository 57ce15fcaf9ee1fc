use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessKind {
    READ,
    WRITE,
}

/// A single recorded memory access of a job.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    pub kind: AccessKind,
    /// Virtual address of the access.
    pub addr: u64,
    /// Number of bytes accessed.
    pub length: u32,
    /// Resource the address belongs to, if known at capture time.
    pub resource_id: Option<u64>,
}

impl Access {
    #[must_use]
    pub fn read(addr: u64, length: u32, resource_id: Option<u64>) -> Self {
        Self {
            kind: AccessKind::READ,
            addr,
            length,
            resource_id,
        }
    }

    #[must_use]
    pub fn write(addr: u64, length: u32, resource_id: Option<u64>) -> Self {
        Self {
            kind: AccessKind::WRITE,
            addr,
            length,
            resource_id,
        }
    }
}
