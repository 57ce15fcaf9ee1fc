use serde::{Deserialize, Serialize};

/// Hardware device a job or command stream belongs to.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Device {
    CPU,
    GPU,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CPU => write!(f, "cpu"),
            Self::GPU => write!(f, "gpu"),
        }
    }
}
