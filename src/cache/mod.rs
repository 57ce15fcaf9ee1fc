pub mod block;
pub mod bypass;
pub mod config;
pub mod filter;

pub use bypass::Bypass;
pub use config::Config;
pub use filter::SharingFilter;

use crate::{
    analyzer::Analyzer,
    context::Context,
    packet::{self, Packet},
    tag_array::{Probe, TagArray},
    Error,
};
use block::Line;
use smallvec::SmallVec;
use stats::cache::AccessStat;

#[derive(Debug, strum::EnumIter, Clone, Copy, Hash, PartialEq, Eq)]
pub enum AccessStatus {
    HIT,
    /// Missed in the cache but a sharing filter turned it into a hit.
    FILTER_HIT,
    MISS,
    /// Missed and was not installed.
    BYPASS,
}

/// Set-associative LRU cache model.
///
/// Variants differ only in their bypass strategy and sharing filters.
#[derive(Debug)]
pub struct CacheModel {
    name: String,
    config: Config,
    tags: TagArray<Line>,
    bypass: Bypass,
    filters: Vec<Box<dyn SharingFilter>>,
    /// Local access time, advanced once per read or write.
    tick: u64,

    global: stats::Cache,
    per_job: stats::PerId,
    per_core: stats::PerId,
    per_resource: stats::PerId,
    block_utilization: stats::Distribution,
    block_reutilization: stats::Distribution,
}

impl CacheModel {
    pub fn new(
        name: impl Into<String>,
        config: Config,
        bypass: Bypass,
        filters: Vec<Box<dyn SharingFilter>>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let num_sub_blocks = config.num_sub_blocks();
        let tags = TagArray::new(
            config.size,
            config.associativity,
            config.block_size,
            || Line::new(num_sub_blocks),
        )?;
        let name = name.into();
        log::debug!("{name}: {config} bypass={bypass:?} filters={filters:?}");
        Ok(Self {
            name,
            tags,
            bypass,
            filters,
            tick: 0,
            global: stats::Cache::default(),
            per_job: stats::PerId::default(),
            per_core: stats::PerId::default(),
            per_resource: stats::PerId::default(),
            block_utilization: stats::Distribution::new(0, num_sub_blocks as u64, 1),
            block_reutilization: stats::Distribution::new(0, num_sub_blocks as u64, 1),
            config,
        })
    }

    /// Sharing filters for the enabled scopes.
    #[must_use]
    pub fn filters_from_config(config: &Config) -> Vec<Box<dyn SharingFilter>> {
        let block_size_log2 = config.block_size.trailing_zeros();
        let mut filters: Vec<Box<dyn SharingFilter>> = Vec::new();
        if config.filter_inter_scene_sharing {
            filters.push(Box::new(filter::InterScene::new(
                block_size_log2,
                config.exit_on_missing_classification,
            )));
        }
        if config.filter_intra_scene_sharing {
            filters.push(Box::new(filter::IntraScene::new(block_size_log2)));
        }
        if config.filter_intra_job_sharing {
            filters.push(Box::new(filter::IntraJob::default()));
        }
        filters
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> &stats::Cache {
        &self.global
    }

    #[must_use]
    pub fn per_job(&self) -> &stats::PerId {
        &self.per_job
    }

    #[must_use]
    pub fn per_core(&self) -> &stats::PerId {
        &self.per_core
    }

    #[must_use]
    pub fn per_resource(&self) -> &stats::PerId {
        &self.per_resource
    }

    #[must_use]
    pub fn block_utilization(&self) -> &stats::Distribution {
        &self.block_utilization
    }

    #[must_use]
    pub fn block_reutilization(&self) -> &stats::Distribution {
        &self.block_reutilization
    }

    #[must_use]
    pub fn tags(&self) -> &TagArray<Line> {
        &self.tags
    }

    /// Applies `f` to the global statistics and every partition of `packet`.
    fn record(&mut self, packet: &Packet, f: impl Fn(&mut stats::Cache)) {
        f(&mut self.global);
        f(self.per_core.entry(packet.core_id as u64));
        if let Some(job_id) = packet.job_id {
            f(self.per_job.entry(job_id));
        }
        if let Some(resource_id) = packet.resource_id {
            f(self.per_resource.entry(resource_id));
        }
    }

    fn sub_block_idx(&self, addr: crate::address) -> usize {
        ((addr & (self.config.block_size - 1)) / self.config.sub_block_size) as usize
    }

    /// Simulates a single read or write.
    ///
    /// Fetches and writebacks for the next level are pushed to `forward`.
    pub fn access(
        &mut self,
        packet: &Packet,
        kind: stats::AccessKind,
        ctx: &mut Context,
        forward: &mut Vec<Packet>,
    ) -> Result<AccessStatus, Error> {
        self.tick += 1;
        let block_id = self.tags.block_id(packet.paddr);

        let mut filter_hit = false;
        for filter in &mut self.filters {
            filter_hit |= filter.observe(block_id, packet);
        }

        let status = match self.tags.probe(packet.paddr) {
            Probe::HIT(idx) => {
                self.hit(idx, packet, kind, ctx);
                AccessStatus::HIT
            }
            Probe::MISS { .. } if filter_hit => {
                let sub_block_size = self.config.sub_block_size;
                self.record(packet, |stats| {
                    stats.inc(kind, AccessStat::HIT, 1);
                    stats.inc(kind, AccessStat::GPU_SIDE_BYTES, sub_block_size);
                });
                AccessStatus::FILTER_HIT
            }
            Probe::MISS { victim } => self.miss(victim, packet, kind, ctx, forward)?,
        };
        log::trace!("{}: {} => {:?}", self.name, packet, status);
        Ok(status)
    }

    fn hit(&mut self, idx: usize, packet: &Packet, kind: stats::AccessKind, ctx: &Context) {
        let sub_block = self.sub_block_idx(packet.paddr);
        let tick = self.tick;
        let line = self.tags.get_block_mut(idx);
        line.last_access_time = tick;
        line.dirty |= packet.is_write();
        line.sub_blocks[sub_block].inc();

        let mut intra: SmallVec<[AccessStat; 4]> = SmallVec::new();
        if line.last_frame == ctx.frame_nbr {
            intra.push(AccessStat::INTRA_FRAME_HIT);
        }
        line.last_frame = ctx.frame_nbr;

        if line.last_scene == ctx.global_scene_idx {
            intra.push(AccessStat::INTRA_SCENE_HIT);
        }
        line.last_scene = ctx.global_scene_idx;

        if packet.job_id.is_some() && line.last_job == packet.job_id {
            intra.push(AccessStat::INTRA_JOB_HIT);
        }
        line.last_job = packet.job_id;

        if packet.resource_id.is_some() && line.last_resource == packet.resource_id {
            intra.push(AccessStat::INTRA_RESOURCE_HIT);
        }
        line.last_resource = packet.resource_id;

        let sub_block_size = self.config.sub_block_size;
        self.record(packet, |stats| {
            stats.inc(kind, AccessStat::HIT, 1);
            stats.inc(kind, AccessStat::GPU_SIDE_BYTES, sub_block_size);
            for stat in &intra {
                stats.inc(kind, *stat, 1);
            }
        });
    }

    fn miss(
        &mut self,
        victim: usize,
        packet: &Packet,
        kind: stats::AccessKind,
        ctx: &mut Context,
        forward: &mut Vec<Packet>,
    ) -> Result<AccessStatus, Error> {
        let block_size = self.config.block_size;
        let block_addr = self.tags.block_addr(packet.paddr);
        let virt_block_addr = self.tags.block_addr(packet.vaddr);
        self.record(packet, |stats| stats.inc(kind, AccessStat::MISS, 1));

        if !packet.is_write() || self.config.fetch_on_write_miss {
            self.record(packet, |stats| {
                stats.inc(kind, AccessStat::MEM_SIDE_BYTES, block_size);
            });
            forward.push(Packet {
                kind: packet::Kind::READ,
                vaddr: virt_block_addr,
                paddr: block_addr,
                length: block_size as u32,
                ..packet.clone()
            });
            if self.config.track_resource_traffic {
                if let Some(resource_id) = packet.resource_id {
                    ctx.resources
                        .get_mut(resource_id)?
                        .record_fetch(packet.vaddr);
                }
            }
        }

        if self.bypass.bypass(packet, &ctx.resources)? {
            return Ok(AccessStatus::BYPASS);
        }

        let line = self.tags.get_block_mut(victim);
        if line.valid {
            let (touched, reused) = line.drain_utilization();
            let writeback = line.dirty.then(|| Packet {
                kind: packet::Kind::WRITE,
                vaddr: line.virt_block_addr,
                paddr: line.block_addr,
                length: block_size as u32,
                core_id: packet.core_id,
                job_id: line.job_id,
                resource_id: line.resource_id,
                device: line.device,
            });

            self.block_utilization.sample(touched);
            self.block_reutilization.sample(reused);
            self.record(packet, |stats| stats.evictions += 1);

            if let Some(writeback) = writeback {
                self.record(packet, |stats| {
                    stats.writebacks += 1;
                    stats.inc(kind, AccessStat::MEM_SIDE_BYTES, block_size);
                });
                if let Some(resource_id) = writeback.resource_id {
                    ctx.resources.record_writeback(
                        resource_id,
                        writeback.vaddr,
                        self.config.track_resource_traffic,
                    )?;
                }
                forward.push(writeback);
            }
        }

        let sub_block = self.sub_block_idx(packet.paddr);
        let line = self.tags.get_block_mut(victim);
        line.valid = true;
        line.dirty = packet.is_write();
        line.block_addr = block_addr;
        line.virt_block_addr = virt_block_addr;
        line.resource_id = packet.resource_id;
        line.job_id = packet.job_id;
        line.device = packet.device;
        line.last_access_time = self.tick;
        line.last_frame = ctx.frame_nbr;
        line.last_scene = ctx.global_scene_idx;
        line.last_job = packet.job_id;
        line.last_resource = packet.resource_id;
        line.sub_blocks[sub_block].set(1);
        Ok(AccessStatus::MISS)
    }
}

impl Analyzer for CacheModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(
        &mut self,
        packet: &Packet,
        ctx: &mut Context,
        forward: &mut Vec<Packet>,
    ) -> Result<(), Error> {
        let Some(kind) = packet.kind.access_kind() else {
            return Ok(());
        };
        self.access(packet, kind, ctx, forward)?;
        Ok(())
    }

    fn start_new_frame(&mut self, frame_id: u64, ctx: &mut Context) -> Result<(), Error> {
        for filter in &mut self.filters {
            filter.start_new_frame(frame_id, ctx)?;
        }
        Ok(())
    }

    fn start_new_scene(
        &mut self,
        frame_id: u64,
        scene_id: u64,
        ctx: &mut Context,
    ) -> Result<(), Error> {
        for filter in &mut self.filters {
            filter.start_new_scene(frame_id, scene_id, ctx)?;
        }
        Ok(())
    }

    fn dump_stats(&mut self, ctx: &mut Context) -> Result<(), Error> {
        ctx.sink.cache_stats(stats::cache::Dump {
            model: self.name.clone(),
            frame_id: ctx.frame_nbr,
            scene_id: ctx.scene_nbr,
            global: self.global.clone(),
            per_job: self.per_job.clone(),
            per_core: self.per_core.clone(),
            per_resource: self.per_resource.clone(),
            block_utilization: self.block_utilization.clone(),
            block_reutilization: self.block_reutilization.clone(),
        });
        Ok(())
    }

    fn reset_stats(&mut self) {
        self.global = stats::Cache::default();
        self.per_job.clear();
        self.per_core.clear();
        self.per_resource.clear();
        self.block_utilization.reset();
        self.block_reutilization.reset();
    }
}
