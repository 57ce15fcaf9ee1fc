use super::{address, cache::block::Block, Error};

/// Result of probing a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Probe {
    /// Index of the line holding the block.
    HIT(usize),
    /// Index of the line to replace.
    MISS { victim: usize },
}

/// Generic set-associative tag store.
///
/// Recency is driven by the access time stored in each block, never by wall clock time.
#[derive(Debug)]
pub struct TagArray<B> {
    /// `num_sets` x `associativity` lines in total
    pub lines: Vec<B>,
    num_sets: usize,
    associativity: usize,
    block_size: u64,
    block_size_log2: u32,
}

impl<B> TagArray<B>
where
    B: Block,
{
    pub fn new(
        size: u64,
        associativity: usize,
        block_size: u64,
        mut new_block: impl FnMut() -> B,
    ) -> Result<Self, Error> {
        let block_size_log2 = utils::log2_exact(block_size).ok_or_else(|| {
            Error::invalid_config(format!("block size {block_size} is not a power of two"))
        })?;
        if associativity == 0 {
            return Err(Error::invalid_config("associativity must be at least 1"));
        }
        let set_size = associativity as u64 * block_size;
        if size == 0 || size % set_size != 0 {
            return Err(Error::invalid_config(format!(
                "cache size {size} is not a multiple of {associativity} x {block_size} bytes"
            )));
        }
        let num_sets = (size / set_size) as usize;
        if !num_sets.is_power_of_two() {
            return Err(Error::invalid_config(format!(
                "number of sets {num_sets} is not a power of two"
            )));
        }
        let lines = (0..num_sets * associativity).map(|_| new_block()).collect();
        Ok(Self {
            lines,
            num_sets,
            associativity,
            block_size,
            block_size_log2,
        })
    }

    #[inline]
    #[must_use]
    pub fn block_addr(&self, addr: address) -> address {
        addr & !(self.block_size - 1)
    }

    /// Cache-wide block id of an address.
    #[inline]
    #[must_use]
    pub fn block_id(&self, addr: address) -> u64 {
        addr >> self.block_size_log2
    }

    #[inline]
    #[must_use]
    pub fn set_index(&self, addr: address) -> usize {
        (self.block_id(addr) as usize) & (self.num_sets - 1)
    }

    #[must_use]
    pub fn num_sets(&self) -> usize {
        self.num_sets
    }

    #[must_use]
    pub fn associativity(&self) -> usize {
        self.associativity
    }

    #[must_use]
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    #[must_use]
    pub fn block_size_log2(&self) -> u32 {
        self.block_size_log2
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.lines.len()
    }

    /// Probes the set of `addr`.
    ///
    /// A miss selects an invalid line if the set has one (the last one scanned),
    /// otherwise the least recently used line, ties going to the lowest index.
    #[must_use]
    pub fn probe(&self, addr: address) -> Probe {
        let block_addr = self.block_addr(addr);
        let start = self.set_index(addr) * self.associativity;
        let end = start + self.associativity;

        let mut invalid_line = None;
        let mut lru_line = start;
        let mut lru_time = u64::MAX;

        for idx in start..end {
            let line = &self.lines[idx];
            if line.is_valid() && line.block_addr() == block_addr {
                return Probe::HIT(idx);
            }
            if !line.is_valid() {
                invalid_line = Some(idx);
            }
            if line.last_access_time() < lru_time {
                lru_time = line.last_access_time();
                lru_line = idx;
            }
        }

        let victim = invalid_line.unwrap_or(lru_line);
        log::trace!(
            "tag_array::probe({:#x}) => miss set={} victim={}",
            addr,
            start / self.associativity,
            victim
        );
        Probe::MISS { victim }
    }

    #[inline]
    #[must_use]
    pub fn get_block_mut(&mut self, idx: usize) -> &mut B {
        &mut self.lines[idx]
    }
}
