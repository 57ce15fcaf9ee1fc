use crate::address;
use smallvec::SmallVec;
use trace_model::Device;

pub const SAT_COUNTER_MAX: u8 = 100;

/// Saturating counter in `0..=max`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct SatCounter {
    value: u8,
    max: u8,
}

impl Default for SatCounter {
    fn default() -> Self {
        Self::new(SAT_COUNTER_MAX)
    }
}

impl SatCounter {
    #[must_use]
    pub fn new(max: u8) -> Self {
        Self { value: 0, max }
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> u8 {
        self.value
    }

    #[inline]
    pub fn inc(&mut self) {
        if self.value < self.max {
            self.value += 1;
        }
    }

    #[inline]
    pub fn set(&mut self, value: u8) {
        self.value = value.min(self.max);
    }

    #[inline]
    pub fn reset(&mut self) {
        self.value = 0;
    }
}

pub trait Block: std::fmt::Debug {
    #[must_use]
    fn is_valid(&self) -> bool;

    /// Block address stored in this slot.
    #[must_use]
    fn block_addr(&self) -> address;

    #[must_use]
    fn last_access_time(&self) -> u64;
}

pub type SubBlocks = SmallVec<[SatCounter; 8]>;

/// A cache line with per sub-block usage counters and reuse markers.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Line {
    pub valid: bool,
    pub dirty: bool,
    /// Physical block address.
    pub block_addr: address,
    /// Virtual block address of the access that installed the line.
    pub virt_block_addr: address,
    pub resource_id: Option<u64>,
    pub job_id: Option<u64>,
    pub device: Device,
    pub last_access_time: u64,

    pub last_frame: u64,
    /// Global scene index of the last access.
    pub last_scene: u64,
    pub last_job: Option<u64>,
    pub last_resource: Option<u64>,

    pub sub_blocks: SubBlocks,
}

impl Line {
    #[must_use]
    pub fn new(num_sub_blocks: usize) -> Self {
        Self {
            valid: false,
            dirty: false,
            block_addr: 0,
            virt_block_addr: 0,
            resource_id: None,
            job_id: None,
            device: Device::GPU,
            last_access_time: 0,
            last_frame: 0,
            last_scene: 0,
            last_job: None,
            last_resource: None,
            sub_blocks: SmallVec::from_elem(SatCounter::default(), num_sub_blocks),
        }
    }

    /// Number of sub-blocks accessed at least once and at least twice.
    ///
    /// Resets all counters.
    pub fn drain_utilization(&mut self) -> (u64, u64) {
        let mut touched = 0;
        let mut reused = 0;
        for counter in &mut self.sub_blocks {
            if counter.value() > 0 {
                touched += 1;
                if counter.value() > 1 {
                    reused += 1;
                }
                counter.reset();
            }
        }
        (touched, reused)
    }
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Line")
            .field("addr", &format_args!("{:#x}", self.block_addr))
            .field("valid", &self.valid)
            .field("dirty", &self.dirty)
            .field("last_access", &self.last_access_time)
            .finish()
    }
}

impl Block for Line {
    #[inline]
    fn is_valid(&self) -> bool {
        self.valid
    }

    #[inline]
    fn block_addr(&self) -> address {
        self.block_addr
    }

    #[inline]
    fn last_access_time(&self) -> u64 {
        self.last_access_time
    }
}
