pub mod fcfs;
pub mod random;
pub mod zorder;

pub use fcfs::Fcfs;
pub use random::Random;
pub use zorder::ZOrder;

use crate::{config, sink::StatsSink, trace::TraceStore, Error};
use std::collections::VecDeque;
use trace_model::{Access, Device, Scene};

/// A job in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub info: trace_model::Job,
    /// Core the job was assigned to.
    pub core_id: Option<usize>,
    /// Remaining accesses, loaded when a core starts the job.
    pub accesses: Option<VecDeque<Access>>,
}

impl Job {
    #[must_use]
    pub fn new(info: trace_model::Job) -> Self {
        Self {
            info,
            core_id: None,
            accesses: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.info.id
    }

    /// Whether the job has no accesses left.
    ///
    /// Jobs whose accesses have not been loaded yet are not done.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.accesses.as_ref().is_some_and(VecDeque::is_empty)
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.info.fmt(f)
    }
}

/// Frame and scene bookkeeping shared by all policies.
///
/// CPU jobs are always served in submission order.
#[derive(Debug, Default)]
pub struct Base {
    next_frame_id: u64,
    /// Global index of the next scene.
    next_scene_id: u64,
    frame_id: u64,
    /// Scene number of the next scene within the current frame.
    next_local_scene_id: u64,
    cpu_queue: VecDeque<Job>,
}

/// Job scheduling policy.
///
/// Policies decide the order of GPU jobs, all other bookkeeping is provided.
pub trait Scheduler: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn base(&self) -> &Base;

    fn base_mut(&mut self) -> &mut Base;

    /// Queues the GPU jobs of a new scene.
    fn queue_gpu_jobs(&mut self, scene: &Scene, jobs: Vec<Job>) -> Result<(), Error>;

    fn next_gpu_job(&mut self, core_id: usize) -> Option<Job>;

    fn num_gpu_jobs(&self) -> usize;

    fn next_cpu_job(&mut self, _core_id: usize) -> Option<Job> {
        self.base_mut().cpu_queue.pop_front()
    }

    fn num_queued(&self) -> usize {
        self.base().cpu_queue.len() + self.num_gpu_jobs()
    }

    fn is_empty(&self) -> bool {
        self.num_queued() == 0
    }

    fn start_new_frame(&mut self, frame_id: u64, trace: &dyn TraceStore) -> Result<(), Error> {
        if !self.is_empty() {
            return Err(Error::QueuesNotEmpty { scope: "frame" });
        }
        let expected = self.base().next_frame_id;
        if frame_id != expected {
            return Err(Error::FrameMismatch {
                expected,
                found: frame_id,
            });
        }
        let frame = trace.frame(frame_id)?.ok_or(Error::MissingTraceRecord {
            kind: "frame",
            id: frame_id,
        })?;
        let base = self.base_mut();
        base.frame_id = frame.id;
        base.next_frame_id += 1;
        base.next_local_scene_id = 0;
        log::debug!("{}: frame {} with {} scenes", self.name(), frame.id, frame.scenes.len());
        Ok(())
    }

    /// Fills the queues with the jobs of the next scene.
    fn start_new_scene(&mut self, trace: &dyn TraceStore) -> Result<(), Error> {
        if !self.is_empty() {
            return Err(Error::QueuesNotEmpty { scope: "scene" });
        }
        let global_id = self.base().next_scene_id;
        let scene = trace.scene(global_id)?.ok_or(Error::MissingTraceRecord {
            kind: "scene",
            id: global_id,
        })?;
        let (frame_id, local_id) = (self.base().frame_id, self.base().next_local_scene_id);
        if scene.frame_id != frame_id {
            return Err(Error::FrameMismatch {
                expected: frame_id,
                found: scene.frame_id,
            });
        }
        if scene.id != local_id {
            return Err(Error::SceneMismatch {
                expected: local_id,
                found: scene.id,
            });
        }

        let mut gpu_jobs = Vec::new();
        for &job_id in &scene.jobs {
            let info = trace.job(frame_id, job_id)?.ok_or(Error::MissingTraceRecord {
                kind: "job",
                id: job_id,
            })?;
            match info.device {
                Device::CPU => self.base_mut().cpu_queue.push_back(Job::new(info)),
                Device::GPU => gpu_jobs.push(Job::new(info)),
            }
        }
        self.queue_gpu_jobs(&scene, gpu_jobs)?;

        let scheduled = self.num_queued();
        if scheduled != scene.jobs.len() {
            return Err(Error::JobCountMismatch {
                scheduled,
                expected: scene.jobs.len(),
            });
        }
        let base = self.base_mut();
        base.next_scene_id += 1;
        base.next_local_scene_id += 1;
        log::debug!(
            "{}: scene {} (frame {} scene {}) with {} jobs ({} gpu)",
            self.name(),
            scene.global_id,
            scene.frame_id,
            scene.id,
            scheduled,
            self.num_gpu_jobs(),
        );
        Ok(())
    }

    /// Assigns the next job of `device` to `core_id`.
    ///
    /// `None` if there is no work left for the device.
    fn get_next_job(
        &mut self,
        core_id: usize,
        device: Device,
        sink: &mut dyn StatsSink,
    ) -> Option<Job> {
        let mut job = match device {
            Device::CPU => self.next_cpu_job(core_id),
            Device::GPU => self.next_gpu_job(core_id),
        }?;
        job.core_id = Some(core_id);
        log::debug!("{}: {} => core {}", self.name(), job, core_id);
        sink.schedule_decision(stats::Decision {
            frame_id: job.info.frame_id,
            scene_id: job.info.scene_id,
            job_id: job.info.id,
            core_id,
        });
        Some(job)
    }
}

pub fn build(config: &config::Scheduler, seed: u64) -> Result<Box<dyn Scheduler>, Error> {
    let scheduler: Box<dyn Scheduler> = match config.kind()? {
        config::SchedulerKind::Fcfs => Box::new(Fcfs::default()),
        config::SchedulerKind::Random => Box::new(Random::new(seed)),
        config::SchedulerKind::Z => Box::new(ZOrder::new(config.z_width, config.tile_order)?),
    };
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::Scheduler;
    use crate::{config, sink::Recorder, testing, Error};
    use color_eyre::eyre;
    use pretty_assertions_sorted as diff;
    use trace_model::{Device, JobKind};

    #[test]
    fn queues_hold_all_scene_jobs() -> eyre::Result<()> {
        let jobs = [
            testing::job(0, Device::CPU, JobKind::Misc),
            testing::job(1, Device::GPU, JobKind::Draw),
            testing::job(2, Device::GPU, JobKind::Tile { x: 0, y: 0 }),
            testing::job(3, Device::GPU, JobKind::Misc),
            testing::job(4, Device::CPU, JobKind::Misc),
        ];
        let trace = testing::trace_with_scene(&jobs, 1, 1);
        for kind in ["fcfs", "random", "z"] {
            let mut scheduler = super::build(
                &config::Scheduler {
                    kind: kind.to_string(),
                    ..config::Scheduler::default()
                },
                0,
            )?;
            scheduler.start_new_frame(0, &trace)?;
            scheduler.start_new_scene(&trace)?;
            diff::assert_eq!(scheduler.num_queued(), jobs.len());
            diff::assert_eq!(scheduler.num_gpu_jobs(), 3);

            // a new scene may not start before all jobs are handed out
            assert!(matches!(
                scheduler.start_new_scene(&trace),
                Err(Error::QueuesNotEmpty { scope: "scene" })
            ));

            let mut sink = Recorder::new();
            let cpu: Vec<u64> = std::iter::from_fn(|| scheduler.get_next_job(0, Device::CPU, &mut sink))
                .map(|job| job.id())
                .collect();
            diff::assert_eq!(cpu, vec![0, 4]);
            while let Some(job) = scheduler.get_next_job(1, Device::GPU, &mut sink) {
                diff::assert_eq!(job.core_id, Some(1));
            }
            assert!(scheduler.is_empty());
            diff::assert_eq!(sink.stats.schedule.len(), jobs.len());
        }
        Ok(())
    }

    #[test]
    fn frame_and_scene_must_match() -> eyre::Result<()> {
        let jobs = [testing::job(0, Device::GPU, JobKind::Draw)];
        let trace = testing::trace_with_scene(&jobs, 1, 1);
        let mut scheduler = super::build(&config::Scheduler::default(), 0)?;
        assert!(matches!(
            scheduler.start_new_frame(1, &trace),
            Err(Error::FrameMismatch {
                expected: 0,
                found: 1
            })
        ));
        scheduler.start_new_frame(0, &trace)?;
        scheduler.start_new_scene(&trace)?;
        let mut sink = Recorder::new();
        scheduler.get_next_job(1, Device::GPU, &mut sink);
        // the trace has a single scene
        assert!(matches!(
            scheduler.start_new_scene(&trace),
            Err(Error::MissingTraceRecord { kind: "scene", id: 1 })
        ));
        Ok(())
    }

    #[test]
    fn unknown_scheduler() {
        let config = config::Scheduler {
            kind: "lottery".to_string(),
            ..config::Scheduler::default()
        };
        assert!(matches!(
            super::build(&config, 0),
            Err(Error::UnknownScheduler { .. })
        ));
    }
}
