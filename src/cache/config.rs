use crate::{config::bool_true, Error};
use serde::{Deserialize, Serialize};

fn default_associativity() -> usize {
    8
}

fn default_block_size() -> u64 {
    64
}

/// Parameters of a cache model.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Capacity in bytes.
    pub size: u64,
    #[serde(default = "default_associativity")]
    pub associativity: usize,
    #[serde(default = "default_block_size")]
    pub block_size: u64,
    #[serde(default = "default_block_size")]
    pub sub_block_size: u64,
    #[serde(default = "bool_true")]
    pub fetch_on_write_miss: bool,

    /// Resources larger than this many bytes bypass the cache.
    #[serde(default, alias = "max-rsc-size")]
    pub max_resource_size: Option<u64>,

    #[serde(default)]
    pub filter_inter_scene_sharing: bool,
    #[serde(default)]
    pub filter_intra_scene_sharing: bool,
    #[serde(default, alias = "filter-intra-task-sharing")]
    pub filter_intra_job_sharing: bool,
    #[serde(default = "bool_true")]
    pub exit_on_missing_classification: bool,

    /// Record fetched and written back blocks per resource.
    #[serde(default)]
    pub track_resource_traffic: bool,
}

impl Config {
    #[must_use]
    pub fn new(size: u64, associativity: usize, block_size: u64) -> Self {
        Self {
            size,
            associativity,
            block_size,
            sub_block_size: block_size,
            fetch_on_write_miss: true,
            max_resource_size: None,
            filter_inter_scene_sharing: false,
            filter_intra_scene_sharing: false,
            filter_intra_job_sharing: false,
            exit_on_missing_classification: true,
            track_resource_traffic: false,
        }
    }

    #[must_use]
    pub fn num_sets(&self) -> u64 {
        self.size / (self.associativity as u64 * self.block_size)
    }

    #[must_use]
    pub fn num_sub_blocks(&self) -> usize {
        (self.block_size / self.sub_block_size) as usize
    }

    /// Whether any sharing filter is enabled.
    #[must_use]
    pub fn has_filters(&self) -> bool {
        self.filter_inter_scene_sharing
            || self.filter_intra_scene_sharing
            || self.filter_intra_job_sharing
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.associativity == 0 {
            return Err(Error::invalid_config("associativity must be at least 1"));
        }
        if !self.block_size.is_power_of_two() {
            return Err(Error::invalid_config(format!(
                "block size {} is not a power of two",
                self.block_size
            )));
        }
        if !self.sub_block_size.is_power_of_two() || self.sub_block_size > self.block_size {
            return Err(Error::invalid_config(format!(
                "sub-block size {} must be a power of two no larger than the block size {}",
                self.sub_block_size, self.block_size
            )));
        }
        let set_size = self.associativity as u64 * self.block_size;
        if self.size == 0 || self.size % set_size != 0 || !self.num_sets().is_power_of_two() {
            return Err(Error::invalid_config(format!(
                "cache size {} does not yield a power of two number of {}-way sets of {} byte blocks",
                self.size, self.associativity, self.block_size
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}-way {} sets x {}B lines ({}B sub-blocks)",
            human_bytes::human_bytes(self.size as f64),
            self.associativity,
            self.num_sets(),
            self.block_size,
            self.sub_block_size,
        )
    }
}
