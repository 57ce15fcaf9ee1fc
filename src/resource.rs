use super::{address, Error};
use rangemap::RangeInclusiveMap;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockState {
    /// Block was fetched from memory.
    pub read_touched: bool,
    /// Block was written back to memory.
    pub write_touched: bool,
    pub core_read_touched: bool,
    pub core_write_touched: bool,
}

impl BlockState {
    #[must_use]
    pub fn touched(&self) -> bool {
        self.read_touched || self.write_touched
    }

    #[must_use]
    pub fn core_touched(&self) -> bool {
        self.core_read_touched || self.core_write_touched
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameStats {
    pub used: bool,
    pub read_blocks: u64,
    pub write_blocks: u64,
    pub core_read_blocks: u64,
    pub core_write_blocks: u64,
}

/// A GPU-visible allocation and its usage during the current frame.
#[derive(Debug, Clone)]
pub struct GpuResource {
    pub id: u64,
    pub start_addr: address,
    /// Last byte of the allocation (inclusive).
    pub end_addr: address,
    pub name: Option<String>,
    pub block_size: u64,
    pub dead: bool,
    pub zombie: bool,
    pub frame_stats: FrameStats,
    blocks: Vec<BlockState>,
    last_frame_blocks: Vec<BlockState>,
}

impl GpuResource {
    #[must_use]
    pub fn new(desc: &trace_model::Resource, block_size: u64) -> Self {
        let num_blocks = desc.num_bytes().div_ceil(block_size) as usize;
        Self {
            id: desc.id,
            start_addr: desc.start_addr,
            end_addr: desc.end_addr,
            name: desc.name.clone(),
            block_size,
            dead: false,
            zombie: false,
            frame_stats: FrameStats::default(),
            blocks: vec![BlockState::default(); num_blocks],
            last_frame_blocks: vec![BlockState::default(); num_blocks],
        }
    }

    #[must_use]
    pub fn num_bytes(&self) -> u64 {
        self.end_addr - self.start_addr + 1
    }

    #[must_use]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn contains(&self, addr: address) -> bool {
        (self.start_addr..=self.end_addr).contains(&addr)
    }

    #[must_use]
    pub fn block_idx(&self, addr: address) -> Option<usize> {
        if self.contains(addr) {
            Some(((addr - self.start_addr) / self.block_size) as usize)
        } else {
            None
        }
    }

    #[must_use]
    pub fn state(&self) -> stats::resource::State {
        if self.zombie {
            stats::resource::State::ZOMBIE
        } else if self.dead {
            stats::resource::State::DEAD
        } else {
            stats::resource::State::ALIVE
        }
    }

    #[must_use]
    pub fn blocks(&self) -> &[BlockState] {
        &self.blocks
    }

    /// Block state of the previous frame.
    #[must_use]
    pub fn last_frame_blocks(&self) -> &[BlockState] {
        &self.last_frame_blocks
    }

    /// Records a core access to `addr`.
    pub fn record_core_access(&mut self, addr: address, is_write: bool) {
        self.frame_stats.used = true;
        let block = self.block_idx(addr).and_then(|idx| self.blocks.get_mut(idx));
        if is_write {
            self.frame_stats.core_write_blocks += 1;
            if let Some(block) = block {
                block.core_write_touched = true;
            }
        } else {
            self.frame_stats.core_read_blocks += 1;
            if let Some(block) = block {
                block.core_read_touched = true;
            }
        }
    }

    /// Records a block fetched from memory.
    pub fn record_fetch(&mut self, addr: address) {
        self.frame_stats.read_blocks += 1;
        if let Some(block) = self.block_idx(addr).and_then(|idx| self.blocks.get_mut(idx)) {
            block.read_touched = true;
        }
    }

    /// Records a block written back to memory.
    pub fn record_writeback(&mut self, addr: address) {
        self.frame_stats.write_blocks += 1;
        if let Some(block) = self.block_idx(addr).and_then(|idx| self.blocks.get_mut(idx)) {
            block.write_touched = true;
        }
    }

    #[must_use]
    pub fn stats(&self, frame_id: u64) -> stats::Resource {
        stats::Resource {
            frame_id,
            id: self.id,
            state: self.state(),
            num_blocks: self.blocks.len() as u64,
            read_blocks: self.frame_stats.read_blocks,
            write_blocks: self.frame_stats.write_blocks,
            core_read_blocks: self.frame_stats.core_read_blocks,
            core_write_blocks: self.frame_stats.core_write_blocks,
            touched_blocks: self.blocks.iter().filter(|b| b.touched()).count() as u64,
            core_touched_blocks: self.blocks.iter().filter(|b| b.core_touched()).count() as u64,
        }
    }

    /// Saves the block state of this frame and clears all frame statistics.
    pub fn reset_stats(&mut self) {
        self.frame_stats = FrameStats::default();
        self.last_frame_blocks.copy_from_slice(&self.blocks);
        self.blocks.fill(BlockState::default());
    }
}

impl std::fmt::Display for GpuResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GpuResource({}, {:#x}..={:#x}, {}, {:?})",
            self.id,
            self.start_addr,
            self.end_addr,
            human_bytes::human_bytes(self.num_bytes() as f64),
            self.state(),
        )
    }
}

/// Tracks the lifecycle of all resources of a trace.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    block_size: u64,
    /// Live resources by address range.
    alive: RangeInclusiveMap<address, u64>,
    /// Every resource ever added, by id.
    resources: BTreeMap<u64, GpuResource>,
    dead: Vec<u64>,
    zombies: Vec<u64>,
}

impl ResourceTracker {
    #[must_use]
    pub fn new(block_size: u64) -> Self {
        Self {
            block_size,
            ..Self::default()
        }
    }

    /// Starts tracking a new resource.
    ///
    /// A resource overlapping a live resource is only indexed by id.
    pub fn add(&mut self, desc: &trace_model::Resource) -> &GpuResource {
        let resource = GpuResource::new(desc, self.block_size);
        log::debug!("new resource {resource}");
        let range = resource.start_addr..=resource.end_addr;
        if self.alive.overlaps(&range) {
            log::warn!("resource {} overlaps a live resource", resource.id);
        } else {
            self.alive.insert(range, resource.id);
        }
        let id = resource.id;
        self.resources.insert(id, resource);
        &self.resources[&id]
    }

    /// Marks a resource as deallocated.
    ///
    /// Returns the address range the resource occupied, or `None` if it was
    /// already dead.
    pub fn destroy(&mut self, id: u64) -> Result<Option<RangeInclusive<address>>, Error> {
        let resource = self
            .resources
            .get_mut(&id)
            .ok_or(Error::UnknownResource { id })?;
        if resource.dead {
            log::warn!("resource {id} destroyed twice");
            return Ok(None);
        }
        let range = resource.start_addr..=resource.end_addr;
        if self.alive.get(&resource.start_addr) == Some(&id) {
            self.alive.remove(range.clone());
        }
        resource.dead = true;
        self.dead.push(id);
        log::debug!("destroyed resource {id}");
        Ok(Some(range))
    }

    /// Brings a dead resource back for one more stats cycle.
    ///
    /// Returns `true` if the resource became a zombie.
    pub fn resurrect(&mut self, id: u64) -> Result<bool, Error> {
        let resource = self
            .resources
            .get_mut(&id)
            .ok_or(Error::UnknownResource { id })?;
        if !resource.dead || resource.zombie {
            return Ok(false);
        }
        resource.zombie = true;
        self.zombies.push(id);
        log::trace!("resurrected resource {id}");
        Ok(true)
    }

    /// Records a writeback of a block of resource `id`.
    ///
    /// Writebacks to dead resources resurrect them.
    pub fn record_writeback(&mut self, id: u64, addr: address, track: bool) -> Result<(), Error> {
        let resource = self
            .resources
            .get_mut(&id)
            .ok_or(Error::UnknownResource { id })?;
        if track {
            resource.record_writeback(addr);
        }
        self.resurrect(id)?;
        Ok(())
    }

    #[must_use]
    pub fn find_by_address(&self, addr: address) -> Option<&GpuResource> {
        let id = self.alive.get(&addr)?;
        self.resources.get(id)
    }

    pub fn find_by_address_mut(&mut self, addr: address) -> Option<&mut GpuResource> {
        let id = *self.alive.get(&addr)?;
        self.resources.get_mut(&id)
    }

    #[must_use]
    pub fn find_by_id(&self, id: u64) -> Option<&GpuResource> {
        self.resources.get(&id)
    }

    pub fn find_by_id_mut(&mut self, id: u64) -> Option<&mut GpuResource> {
        self.resources.get_mut(&id)
    }

    pub fn get(&self, id: u64) -> Result<&GpuResource, Error> {
        self.find_by_id(id).ok_or(Error::UnknownResource { id })
    }

    pub fn get_mut(&mut self, id: u64) -> Result<&mut GpuResource, Error> {
        self.find_by_id_mut(id).ok_or(Error::UnknownResource { id })
    }

    pub fn alive(&self) -> impl Iterator<Item = &GpuResource> + '_ {
        self.alive
            .iter()
            .filter_map(|(_, id)| self.resources.get(id))
    }

    #[must_use]
    pub fn dead(&self) -> &[u64] {
        &self.dead
    }

    #[must_use]
    pub fn zombies(&self) -> &[u64] {
        &self.zombies
    }

    pub fn clear_dead(&mut self) {
        self.dead.clear();
    }

    pub fn clear_zombies(&mut self) {
        for id in self.zombies.drain(..) {
            if let Some(resource) = self.resources.get_mut(&id) {
                resource.zombie = false;
            }
        }
    }

    /// Collects the frame statistics of all live, dead and zombie resources.
    ///
    /// Live resources are only reported if used during the frame.
    #[must_use]
    pub fn frame_stats(&self, frame_id: u64) -> Vec<stats::Resource> {
        let alive = self
            .alive()
            .filter(|resource| resource.frame_stats.used)
            .map(|resource| resource.stats(frame_id));
        let dead_or_zombie = self
            .dead
            .iter()
            .chain(self.zombies.iter())
            .filter_map(|id| self.resources.get(id))
            .map(|resource| resource.stats(frame_id));
        alive.chain(dead_or_zombie).collect()
    }

    /// Resets the frame statistics of all live, dead and zombie resources.
    pub fn reset_stats(&mut self) {
        let ids: Vec<u64> = self
            .alive
            .iter()
            .map(|(_, id)| *id)
            .chain(self.dead.iter().copied())
            .chain(self.zombies.iter().copied())
            .collect();
        for id in ids {
            if let Some(resource) = self.resources.get_mut(&id) {
                resource.reset_stats();
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::ResourceTracker;
    use color_eyre::eyre;
    use pretty_assertions_sorted as diff;
    use stats::resource::State;

    fn desc(id: u64, start_addr: u64, end_addr: u64) -> trace_model::Resource {
        trace_model::Resource {
            id,
            start_addr,
            end_addr,
            name: None,
        }
    }

    #[test]
    fn find_live_resources() {
        let mut rt = ResourceTracker::new(64);
        rt.add(&desc(1, 0x1000, 0x1fff));
        rt.add(&desc(2, 0x4000, 0x403f));

        diff::assert_eq!(rt.find_by_address(0x1800).map(|r| r.id), Some(1));
        diff::assert_eq!(rt.find_by_address(0x2000).map(|r| r.id), None);
        diff::assert_eq!(rt.find_by_id(2).map(|r| r.num_blocks()), Some(1));
        diff::assert_eq!(rt.find_by_id(1).map(|r| r.num_blocks()), Some(64));
    }

    #[test]
    fn destroyed_resource_is_found_by_id_only() -> eyre::Result<()> {
        let mut rt = ResourceTracker::new(64);
        rt.add(&desc(1, 0x1000, 0x1fff));
        rt.destroy(1)?;

        diff::assert_eq!(rt.find_by_address(0x1000).map(|r| r.id), None);
        diff::assert_eq!(rt.find_by_id(1).map(|r| r.state()), Some(State::DEAD));
        diff::assert_eq!(rt.dead(), &[1]);
        assert!(rt.destroy(7).is_err());
        Ok(())
    }

    #[test]
    fn overlapping_resource_is_only_indexed_by_id() {
        let mut rt = ResourceTracker::new(64);
        rt.add(&desc(1, 0x1000, 0x1fff));
        rt.add(&desc(2, 0x1800, 0x27ff));

        diff::assert_eq!(rt.find_by_address(0x1900).map(|r| r.id), Some(1));
        diff::assert_eq!(rt.find_by_address(0x2400).map(|r| r.id), None);
        diff::assert_eq!(rt.find_by_id(2).map(|r| r.id), Some(2));
        diff::assert_eq!(rt.alive().map(|r| r.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn destroy_returns_freed_range() -> eyre::Result<()> {
        let mut rt = ResourceTracker::new(64);
        rt.add(&desc(1, 0x1000, 0x1fff));
        rt.add(&desc(2, 0x2000, 0x203f));

        diff::assert_eq!(rt.destroy(1)?, Some(0x1000..=0x1fff));
        diff::assert_eq!(rt.destroy(1)?, None);
        diff::assert_eq!(rt.dead(), &[1]);
        diff::assert_eq!(rt.find_by_address(0x2000).map(|r| r.id), Some(2));

        // the freed range can be reused by a new resource
        rt.add(&desc(3, 0x1000, 0x17ff));
        diff::assert_eq!(rt.find_by_address(0x1400).map(|r| r.id), Some(3));
        Ok(())
    }

    #[test]
    fn writeback_to_dead_resource_creates_zombie_once() -> eyre::Result<()> {
        let mut rt = ResourceTracker::new(64);
        rt.add(&desc(1, 0x1000, 0x1fff));
        rt.destroy(1)?;

        rt.record_writeback(1, 0x1000, true)?;
        rt.record_writeback(1, 0x1040, true)?;
        diff::assert_eq!(rt.dead(), &[1]);
        diff::assert_eq!(rt.zombies(), &[1]);

        let stats = rt.frame_stats(0);
        diff::assert_eq!(stats.len(), 2);
        diff::assert_eq!(stats[0].state, State::ZOMBIE);
        diff::assert_eq!(stats[0].write_blocks, 2);
        diff::assert_eq!(stats[0].touched_blocks, 2);

        rt.clear_dead();
        rt.clear_zombies();
        assert!(rt.zombies().is_empty());
        diff::assert_eq!(rt.find_by_id(1).map(|r| r.state()), Some(State::DEAD));

        // a later writeback resurrects it again
        diff::assert_eq!(rt.resurrect(1)?, true);
        Ok(())
    }

    #[test]
    fn alive_resource_is_never_resurrected() -> eyre::Result<()> {
        let mut rt = ResourceTracker::new(64);
        rt.add(&desc(1, 0x1000, 0x1fff));
        rt.record_writeback(1, 0x1000, false)?;
        assert!(rt.zombies().is_empty());
        assert!(rt.record_writeback(9, 0x1000, false).is_err());
        Ok(())
    }

    #[test]
    fn reset_stats_saves_block_state() {
        let mut rt = ResourceTracker::new(64);
        rt.add(&desc(1, 0x1000, 0x10ff));
        let resource = rt.find_by_id_mut(1).unwrap();
        resource.record_core_access(0x1040, false);
        resource.record_core_access(0x1080, true);
        resource.record_fetch(0x1040);

        let stats = rt.frame_stats(3);
        diff::assert_eq!(stats.len(), 1);
        diff::assert_eq!(stats[0].frame_id, 3);
        diff::assert_eq!(stats[0].core_read_blocks, 1);
        diff::assert_eq!(stats[0].core_write_blocks, 1);
        diff::assert_eq!(stats[0].core_touched_blocks, 2);
        diff::assert_eq!(stats[0].read_blocks, 1);

        rt.reset_stats();
        let resource = rt.find_by_id(1).unwrap();
        assert!(!resource.frame_stats.used);
        assert!(resource.blocks().iter().all(|b| !b.core_touched()));
        assert!(resource.last_frame_blocks()[1].core_read_touched);
        assert!(resource.last_frame_blocks()[2].core_write_touched);
        assert!(rt.frame_stats(4).is_empty());
    }
}
