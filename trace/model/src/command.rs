use serde::{Deserialize, Serialize};

/// An entry of the CPU or GPU command stream.
///
/// Commands mark synchronization points between the two devices.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Command {
    NewFrame,
    NewScene,
    EndScene,
    NewJob { id: u64 },
    EndJob { id: u64 },
    NewResource { id: u64 },
    EndResource { id: u64 },
    Sync,
    SyncProvides { id: u64 },
    SyncRequires { id: u64 },
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewFrame => write!(f, "NewFrame"),
            Self::NewScene => write!(f, "NewScene"),
            Self::EndScene => write!(f, "EndScene"),
            Self::NewJob { id } => write!(f, "NewJob({id})"),
            Self::EndJob { id } => write!(f, "EndJob({id})"),
            Self::NewResource { id } => write!(f, "NewResource({id})"),
            Self::EndResource { id } => write!(f, "EndResource({id})"),
            Self::Sync => write!(f, "Sync"),
            Self::SyncProvides { id } => write!(f, "SyncProvides({id})"),
            Self::SyncRequires { id } => write!(f, "SyncRequires({id})"),
        }
    }
}
