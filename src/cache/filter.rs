use crate::{context::Context, packet::Packet, Error};
use std::collections::{HashMap, HashSet};

/// Turns repeated accesses to shared blocks into hits.
///
/// The first access to a block within the filter's scope misses normally.
pub trait SharingFilter: std::fmt::Debug {
    fn scope(&self) -> &'static str;

    /// Observes an access to `block_id`.
    ///
    /// Returns `true` if the access should count as a hit.
    fn observe(&mut self, block_id: u64, packet: &Packet) -> bool;

    fn start_new_frame(&mut self, _frame_id: u64, _ctx: &mut Context) -> Result<(), Error> {
        Ok(())
    }

    fn start_new_scene(
        &mut self,
        _frame_id: u64,
        _scene_id: u64,
        _ctx: &mut Context,
    ) -> Result<(), Error> {
        Ok(())
    }
}

/// Filtered block ids of a scope and the ones seen so far.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Mask {
    blocks: HashSet<u64>,
    accesses: HashSet<u64>,
}

impl Mask {
    fn observe(&mut self, block_id: u64) -> bool {
        if !self.blocks.contains(&block_id) {
            return false;
        }
        !self.accesses.insert(block_id)
    }

    /// Every filtered block must have been seen before the scope ends.
    fn clear(&mut self, scope: &'static str) -> Result<(), Error> {
        if self.blocks.len() != self.accesses.len() {
            return Err(Error::FilterMismatch {
                scope,
                mask: self.blocks.len(),
                accesses: self.accesses.len(),
            });
        }
        self.blocks.clear();
        self.accesses.clear();
        Ok(())
    }
}

/// Blocks shared by several scenes of a frame.
#[derive(Debug)]
pub struct InterScene {
    block_size_log2: u32,
    exit_on_missing: bool,
    mask: Mask,
}

impl InterScene {
    #[must_use]
    pub fn new(block_size_log2: u32, exit_on_missing: bool) -> Self {
        Self {
            block_size_log2,
            exit_on_missing,
            mask: Mask::default(),
        }
    }
}

impl SharingFilter for InterScene {
    fn scope(&self) -> &'static str {
        "inter-scene"
    }

    fn observe(&mut self, block_id: u64, _packet: &Packet) -> bool {
        self.mask.observe(block_id)
    }

    fn start_new_frame(&mut self, frame_id: u64, ctx: &mut Context) -> Result<(), Error> {
        let scope = self.scope();
        self.mask.clear(scope)?;
        match ctx.classification.frame_blocks(frame_id)? {
            Some(blocks) => {
                self.mask.blocks.extend(
                    blocks
                        .iter()
                        .filter(|block| block.scene_users > 1)
                        .map(|block| block.addr >> self.block_size_log2),
                );
                log::debug!(
                    "frame {frame_id}: {} blocks shared between scenes",
                    self.mask.blocks.len()
                );
            }
            None => {
                log::warn!("missing cacheline classification for frame {frame_id}");
                if self.exit_on_missing {
                    ctx.stop(format!("no cacheline classification for frame {frame_id}"));
                }
            }
        }
        Ok(())
    }
}

/// Blocks shared by several jobs of a scene.
#[derive(Debug)]
pub struct IntraScene {
    block_size_log2: u32,
    mask: Mask,
}

impl IntraScene {
    #[must_use]
    pub fn new(block_size_log2: u32) -> Self {
        Self {
            block_size_log2,
            mask: Mask::default(),
        }
    }
}

impl SharingFilter for IntraScene {
    fn scope(&self) -> &'static str {
        "intra-scene"
    }

    fn observe(&mut self, block_id: u64, _packet: &Packet) -> bool {
        self.mask.observe(block_id)
    }

    fn start_new_scene(
        &mut self,
        frame_id: u64,
        scene_id: u64,
        ctx: &mut Context,
    ) -> Result<(), Error> {
        let scope = self.scope();
        self.mask.clear(scope)?;
        match ctx.classification.scene_blocks(frame_id, scene_id)? {
            Some(blocks) => {
                self.mask.blocks.extend(
                    blocks
                        .iter()
                        .filter(|block| block.task_users > 1)
                        .map(|block| block.addr >> self.block_size_log2),
                );
            }
            None => {
                log::warn!(
                    "missing cacheline classification for frame {frame_id} scene {scene_id}"
                );
            }
        }
        Ok(())
    }
}

/// Repeated accesses of a job to the same block.
#[derive(Debug, Default)]
pub struct IntraJob {
    seen: HashMap<u64, HashSet<u64>>,
}

impl SharingFilter for IntraJob {
    fn scope(&self) -> &'static str {
        "intra-job"
    }

    fn observe(&mut self, block_id: u64, packet: &Packet) -> bool {
        match packet.job_id {
            Some(job_id) => !self.seen.entry(job_id).or_default().insert(block_id),
            None => false,
        }
    }

    fn start_new_scene(
        &mut self,
        _frame_id: u64,
        _scene_id: u64,
        _ctx: &mut Context,
    ) -> Result<(), Error> {
        self.seen.clear();
        Ok(())
    }
}
