use std::path::PathBuf;

/// Errors that abort a simulation run.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unknown analyzer {name:?}")]
    UnknownAnalyzer { name: String },

    #[error("unknown scheduler {name:?}")]
    UnknownScheduler { name: String },

    #[error("invalid config: {message}")]
    InvalidConfig { message: String },

    #[error("unknown resource {id}")]
    UnknownResource { id: u64 },

    #[error("job queues are not empty at the start of a new {scope}")]
    QueuesNotEmpty { scope: &'static str },

    #[error("scheduled {scheduled} jobs but the scene has {expected} jobs")]
    JobCountMismatch { scheduled: usize, expected: usize },

    #[error("no translation for virtual address {vaddr:#x}")]
    MissingTranslation { vaddr: u64 },

    #[error("{scope} sharing filter saw {accesses} blocks but holds {mask} filtered blocks")]
    FilterMismatch {
        scope: &'static str,
        mask: usize,
        accesses: usize,
    },

    #[error("duplicate tile job at x={x} y={y}")]
    DuplicateTile { x: u32, y: u32 },

    #[error("expected frame {expected} but the trace contains frame {found}")]
    FrameMismatch { expected: u64, found: u64 },

    #[error("expected scene {expected} but the trace contains scene {found}")]
    SceneMismatch { expected: u64, found: u64 },

    #[error("trace has no {kind} with id {id}")]
    MissingTraceRecord { kind: &'static str, id: u64 },

    #[error("failed to parse {path:?}")]
    Parse {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error(transparent)]
    Fs(#[from] utils::fs::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    MsgPack(#[from] rmp_serde::decode::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub(crate) fn parse(
        path: impl Into<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
