use super::{Base, Job, Scheduler};
use crate::Error;
use std::collections::VecDeque;
use trace_model::{JobKind, Scene};

/// First come first serve.
///
/// GPU draw jobs are served by job id, then tiles in raster order, then misc jobs.
#[derive(Debug, Default)]
pub struct Fcfs {
    base: Base,
    gpu_queue: VecDeque<Job>,
}

impl Scheduler for Fcfs {
    fn name(&self) -> &'static str {
        "fcfs"
    }

    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn queue_gpu_jobs(&mut self, scene: &Scene, jobs: Vec<Job>) -> Result<(), Error> {
        let mut draws = Vec::new();
        let mut tiles = Vec::new();
        let mut misc = Vec::new();
        for job in jobs {
            match job.info.kind {
                JobKind::Draw => draws.push(job),
                JobKind::Tile { x, y } => {
                    let raster_idx = u64::from(y) * u64::from(scene.width) + u64::from(x);
                    tiles.push((raster_idx, job));
                }
                JobKind::Misc => misc.push(job),
            }
        }
        draws.sort_by_key(Job::id);
        tiles.sort_by_key(|(raster_idx, _)| *raster_idx);

        self.gpu_queue.extend(draws);
        self.gpu_queue.extend(tiles.into_iter().map(|(_, job)| job));
        self.gpu_queue.extend(misc);
        Ok(())
    }

    fn next_gpu_job(&mut self, _core_id: usize) -> Option<Job> {
        self.gpu_queue.pop_front()
    }

    fn num_gpu_jobs(&self) -> usize {
        self.gpu_queue.len()
    }
}
