use super::{Base, Job, Scheduler};
use crate::{config::TileOrder, Error};
use std::collections::{HashMap, VecDeque};
use trace_model::{JobKind, Scene};

/// Serves tiles along a recursive z-order curve.
///
/// Draw jobs come first, then tiles, then misc jobs.
#[derive(Debug)]
pub struct ZOrder {
    base: Base,
    /// Width of the independently z-ordered sub grids.
    z_width: Option<u32>,
    order: TileOrder,
    draws: VecDeque<Job>,
    tiles: VecDeque<Job>,
    misc: VecDeque<Job>,
}

impl ZOrder {
    pub fn new(z_width: Option<u32>, order: TileOrder) -> Result<Self, Error> {
        if let Some(z_width) = z_width {
            if !z_width.is_power_of_two() {
                return Err(Error::invalid_config(format!(
                    "z-width {z_width} is not a power of two"
                )));
            }
        }
        Ok(Self {
            base: Base::default(),
            z_width,
            order,
            draws: VecDeque::new(),
            tiles: VecDeque::new(),
            misc: VecDeque::new(),
        })
    }

    fn schedule_tiles(
        &mut self,
        pending: &mut HashMap<(u32, u32), Job>,
        x: u32,
        y: u32,
        size: u32,
    ) {
        if size == 1 {
            if let Some(job) = pending.remove(&(x, y)) {
                self.tiles.push_back(job);
            }
            return;
        }
        let s = size / 2;
        let quadrants = match self.order {
            TileOrder::Acbd => [(x, y), (x, y + s), (x + s, y), (x + s, y + s)],
            TileOrder::Cadb => [(x, y + s), (x, y), (x + s, y + s), (x + s, y)],
        };
        for (qx, qy) in quadrants {
            self.schedule_tiles(pending, qx, qy, s);
        }
    }
}

impl Scheduler for ZOrder {
    fn name(&self) -> &'static str {
        "z"
    }

    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn queue_gpu_jobs(&mut self, scene: &Scene, jobs: Vec<Job>) -> Result<(), Error> {
        let mut pending = HashMap::new();
        for job in jobs {
            match job.info.kind {
                JobKind::Draw => self.draws.push_back(job),
                JobKind::Misc => self.misc.push_back(job),
                JobKind::Tile { x, y } => {
                    if pending.insert((x, y), job).is_some() {
                        return Err(Error::DuplicateTile { x, y });
                    }
                }
            }
        }

        let size = scene.width.max(scene.height).next_power_of_two();
        let z_width = self.z_width.unwrap_or(size);
        for y in (0..scene.height).step_by(z_width as usize) {
            for x in (0..scene.width).step_by(z_width as usize) {
                self.schedule_tiles(&mut pending, x, y, z_width);
            }
        }
        if !pending.is_empty() {
            log::warn!(
                "{} tiles outside of the {}x{} scene",
                pending.len(),
                scene.width,
                scene.height
            );
        }
        Ok(())
    }

    fn next_gpu_job(&mut self, _core_id: usize) -> Option<Job> {
        self.draws
            .pop_front()
            .or_else(|| self.tiles.pop_front())
            .or_else(|| self.misc.pop_front())
    }

    fn num_gpu_jobs(&self) -> usize {
        self.draws.len() + self.tiles.len() + self.misc.len()
    }
}
