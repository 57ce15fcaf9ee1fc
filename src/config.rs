use super::{address, Error};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[inline]
#[must_use]
pub fn bool_true() -> bool {
    true
}

/// Parameters of a single analyzer stage.
///
/// All keys besides `type`, `id` and `children` are model specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Stages receiving the packets forwarded by this stage.
    #[serde(default)]
    pub children: Vec<Model>,
    #[serde(flatten)]
    pub params: IndexMap<String, serde_yaml::Value>,
}

impl Model {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            children: Vec::new(),
            params: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_yaml::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Model) -> Self {
        self.children.push(child);
        self
    }

    /// Name used when reporting statistics of this stage.
    #[must_use]
    pub fn name(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.kind.clone())
    }

    /// Deserializes the model specific parameters.
    pub fn params<T>(&self) -> Result<T, Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let mapping: serde_yaml::Mapping = self
            .params
            .iter()
            .map(|(k, v)| (serde_yaml::Value::String(k.clone()), v.clone()))
            .collect();
        serde_yaml::from_value(serde_yaml::Value::Mapping(mapping)).map_err(|err| {
            Error::invalid_config(format!("model {}: {err}", self.name()))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerKind {
    Fcfs,
    Random,
    Z,
}

impl std::fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fcfs => write!(f, "fcfs"),
            Self::Random => write!(f, "random"),
            Self::Z => write!(f, "z"),
        }
    }
}

impl std::str::FromStr for SchedulerKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_lowercase().as_str() {
            "fcfs" => Ok(Self::Fcfs),
            "random" | "r" => Ok(Self::Random),
            "z" | "zorder" => Ok(Self::Z),
            _ => Err(Error::UnknownScheduler {
                name: name.to_string(),
            }),
        }
    }
}

/// Quadrant traversal order of the z-order scheduler.
///
/// Quadrants are labeled `A B` on top and `C D` on the bottom.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileOrder {
    /// Top left, bottom left, top right, bottom right.
    #[default]
    Acbd,
    /// Bottom left, top left, bottom right, top right.
    Cadb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Scheduler {
    /// Name of the scheduling policy (`fcfs`, `random` or `z`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Width of the independently z-ordered sub grids.
    pub z_width: Option<u32>,
    pub tile_order: TileOrder,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            kind: SchedulerKind::Fcfs.to_string(),
            z_width: None,
            tile_order: TileOrder::default(),
        }
    }
}

impl Scheduler {
    pub fn kind(&self) -> Result<SchedulerKind, Error> {
        self.kind.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct VirtualMemory {
    pub enabled: bool,
    pub base_addr: address,
    pub page_size: u64,
    pub init_size: u64,
    /// Start free page searches at a random block.
    pub fragmented: bool,
}

impl Default for VirtualMemory {
    fn default() -> Self {
        Self {
            enabled: true,
            base_addr: 4096,
            page_size: 4096,
            init_size: 0x100_0000,
            fragmented: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Simulation {
    pub num_gpu_cores: usize,
    /// Number of leading frames replayed only to warm up state.
    pub start_frame: u64,
    /// Last frame to replay.
    pub stop_frame: Option<u64>,
    /// Wall clock budget in seconds.
    pub stop_time: Option<f64>,
    pub seed: u64,
    /// Granularity of resource block tracking.
    pub block_size: u64,
    pub models: Vec<Model>,
    pub scheduler: Scheduler,
    pub virtual_memory: VirtualMemory,
    pub classification_input_dir: Option<PathBuf>,
    pub benchmark_name: Option<String>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            num_gpu_cores: 1,
            start_frame: 0,
            stop_frame: None,
            stop_time: None,
            seed: 0,
            block_size: 64,
            models: Vec::new(),
            scheduler: Scheduler::default(),
            virtual_memory: VirtualMemory::default(),
            classification_input_dir: None,
            benchmark_name: None,
        }
    }
}

impl Simulation {
    /// Loads a configuration from a YAML or JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let reader = utils::fs::open_readable(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config: Self = if is_json {
            serde_json::from_reader(reader).map_err(|err| Error::parse(path, err))?
        } else {
            serde_yaml::from_reader(reader).map_err(|err| Error::parse(path, err))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.num_gpu_cores == 0 {
            return Err(Error::invalid_config("num-gpu-cores must be at least 1"));
        }
        if !self.block_size.is_power_of_two() {
            return Err(Error::invalid_config(format!(
                "block size {} is not a power of two",
                self.block_size
            )));
        }
        if let Some(stop_time) = self.stop_time {
            if !stop_time.is_finite() || stop_time < 0.0 {
                return Err(Error::invalid_config(format!(
                    "stop time {stop_time} is not a valid number of seconds"
                )));
            }
        }
        self.scheduler.kind()?;
        if let Some(z_width) = self.scheduler.z_width {
            if !z_width.is_power_of_two() {
                return Err(Error::invalid_config(format!(
                    "z-width {z_width} is not a power of two"
                )));
            }
        }
        if !self.virtual_memory.page_size.is_power_of_two() {
            return Err(Error::invalid_config(format!(
                "page size {} is not a power of two",
                self.virtual_memory.page_size
            )));
        }
        Ok(())
    }
}
