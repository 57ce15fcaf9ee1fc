use super::{address, config, Error};
use bitvec::array::BitArray;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashMap;

/// Number of pages per block of the free list.
pub const PAGES_PER_BLOCK: usize = 256;

pub type PageBlock = BitArray<[u64; PAGES_PER_BLOCK / 64]>;

/// Maps virtual resource pages onto a synthetic, disjoint physical space.
///
/// Overlapping virtual ranges get fresh physical pages, the newest
/// translation wins. Freeing keeps stale translations in place.
#[derive(Debug)]
pub struct VirtualMemoryManager {
    base_addr: address,
    page_size: u64,
    fragmented: bool,
    rng: StdRng,
    translations: HashMap<address, address>,
    free_list: Vec<PageBlock>,
    allocated_pages: usize,
}

impl VirtualMemoryManager {
    pub fn new(config: &config::VirtualMemory, seed: u64) -> Result<Self, Error> {
        if !config.page_size.is_power_of_two() {
            return Err(Error::invalid_config(format!(
                "page size {} is not a power of two",
                config.page_size
            )));
        }
        let block_bytes = PAGES_PER_BLOCK as u64 * config.page_size;
        let num_blocks = (config.init_size / block_bytes).max(1) as usize;
        log::debug!(
            "virtual memory: base={:#x} page size={} blocks={} fragmented={}",
            config.base_addr,
            config.page_size,
            num_blocks,
            config.fragmented
        );
        Ok(Self {
            base_addr: config.base_addr,
            page_size: config.page_size,
            fragmented: config.fragmented,
            rng: StdRng::seed_from_u64(seed),
            translations: HashMap::new(),
            free_list: vec![PageBlock::ZERO; num_blocks],
            allocated_pages: 0,
        })
    }

    #[inline]
    #[must_use]
    pub fn page_addr(&self, addr: address) -> address {
        addr & !(self.page_size - 1)
    }

    #[inline]
    #[must_use]
    pub fn page_offset(&self, addr: address) -> address {
        addr & (self.page_size - 1)
    }

    #[must_use]
    pub fn num_pages(&self) -> usize {
        self.free_list.len() * PAGES_PER_BLOCK
    }

    #[must_use]
    pub fn num_free_pages(&self) -> usize {
        self.num_pages() - self.allocated_pages
    }

    #[must_use]
    pub fn num_allocated_pages(&self) -> usize {
        self.allocated_pages
    }

    fn ppage_addr(&self, block: usize, page: usize) -> address {
        self.base_addr + (block * PAGES_PER_BLOCK + page) as u64 * self.page_size
    }

    /// Finds a free page, scanning blocks from `block` with wrap-around.
    fn find_free_page(&self, mut block: usize) -> (usize, usize) {
        loop {
            if let Some(page) = self.free_list[block].first_zero() {
                return (block, page);
            }
            block = (block + 1) % self.free_list.len();
        }
    }

    /// Maps every page of the virtual range `[start, end]` to a free physical page.
    pub fn alloc(&mut self, start: address, end: address) {
        let start_vpage = self.page_addr(start);
        let end_vpage = self.page_addr(end);
        log::trace!("vmem: alloc {start:#x}..={end:#x}");

        let mut vpage = start_vpage;
        while vpage <= end_vpage {
            if self.num_free_pages() == 0 {
                self.free_list.push(PageBlock::ZERO);
                log::debug!("vmem: grow to {} pages", self.num_pages());
            }
            let first = if self.fragmented {
                self.rng.gen_range(0..self.free_list.len())
            } else {
                0
            };
            let (block, page) = self.find_free_page(first);
            self.free_list[block].set(page, true);
            self.allocated_pages += 1;

            let ppage = self.ppage_addr(block, page);
            log::trace!("vmem: map {vpage:#x} -> {ppage:#x}");
            self.translations.insert(vpage, ppage);

            vpage = match vpage.checked_add(self.page_size) {
                Some(next) => next,
                None => break,
            };
        }
    }

    /// Releases the physical pages backing `[start, end]`.
    ///
    /// Translations are left in place.
    pub fn free(&mut self, start: address, end: address) -> Result<(), Error> {
        let start_vpage = self.page_addr(start);
        let end_vpage = self.page_addr(end);
        log::trace!("vmem: free {start:#x}..={end:#x}");

        let mut vpage = start_vpage;
        while vpage <= end_vpage {
            let ppage = self.translate(vpage)?;
            let page_nbr = ((ppage - self.base_addr) / self.page_size) as usize;
            let (block, page) = (page_nbr / PAGES_PER_BLOCK, page_nbr % PAGES_PER_BLOCK);
            if self.free_list[block].replace(page, false) {
                self.allocated_pages -= 1;
            }
            vpage = match vpage.checked_add(self.page_size) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(())
    }

    pub fn translate(&self, vaddr: address) -> Result<address, Error> {
        let ppage = self
            .translations
            .get(&self.page_addr(vaddr))
            .ok_or(Error::MissingTranslation { vaddr })?;
        Ok(ppage | self.page_offset(vaddr))
    }

    /// Whether the physical page is currently allocated.
    #[must_use]
    pub fn is_allocated(&self, paddr: address) -> bool {
        let Some(offset) = paddr.checked_sub(self.base_addr) else {
            return false;
        };
        let page_nbr = (offset / self.page_size) as usize;
        self.free_list
            .get(page_nbr / PAGES_PER_BLOCK)
            .is_some_and(|block| block[page_nbr % PAGES_PER_BLOCK])
    }
}
