use super::address;
use trace_model::Device;

#[derive(Debug, strum::EnumIter, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Kind {
    READ,
    WRITE,
    /// A core started working on a job.
    NEW_JOB,
    /// A core drained the access queue of a job.
    END_JOB,
}

impl Kind {
    #[must_use]
    pub fn is_access(self) -> bool {
        matches!(self, Self::READ | Self::WRITE)
    }

    /// Memory access kind, for read and write packets.
    #[must_use]
    pub fn access_kind(self) -> Option<stats::mem::AccessKind> {
        match self {
            Self::READ => Some(stats::mem::AccessKind::READ),
            Self::WRITE => Some(stats::mem::AccessKind::WRITE),
            Self::NEW_JOB | Self::END_JOB => None,
        }
    }
}

impl From<trace_model::AccessKind> for Kind {
    fn from(kind: trace_model::AccessKind) -> Self {
        match kind {
            trace_model::AccessKind::READ => Self::READ,
            trace_model::AccessKind::WRITE => Self::WRITE,
        }
    }
}

/// An event flowing from the cores through the analyzer chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Packet {
    pub kind: Kind,
    pub vaddr: address,
    pub paddr: address,
    pub length: u32,
    pub core_id: usize,
    pub job_id: Option<u64>,
    pub resource_id: Option<u64>,
    pub device: Device,
}

impl Packet {
    /// Untranslated access issued by a job.
    ///
    /// The physical address equals the virtual address until translated.
    #[must_use]
    pub fn from_access(access: &trace_model::Access, job_id: u64, device: Device) -> Self {
        Self {
            kind: access.kind.into(),
            vaddr: access.addr,
            paddr: access.addr,
            length: access.length,
            core_id: 0,
            job_id: Some(job_id),
            resource_id: access.resource_id,
            device,
        }
    }

    #[must_use]
    pub fn marker(kind: Kind, job_id: u64, core_id: usize, device: Device) -> Self {
        Self {
            kind,
            vaddr: 0,
            paddr: 0,
            length: 0,
            core_id,
            job_id: Some(job_id),
            resource_id: None,
            device,
        }
    }

    #[must_use]
    pub fn is_write(&self) -> bool {
        self.kind == Kind::WRITE
    }
}

impl std::fmt::Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}({:#x}->{:#x}, {} bytes, core={}, job={:?}, rsc={:?}, {})",
            self.kind,
            self.vaddr,
            self.paddr,
            self.length,
            self.core_id,
            self.job_id,
            self.resource_id,
            self.device
        )
    }
}
