use crate::{
    analyzer::{Node, Registry},
    barrier::Barrier,
    classification::Classification,
    config,
    context::Context,
    core::Env,
    cpu::{Cpu, Event},
    gpu::Gpu,
    scheduler::{self, Scheduler},
    sink::StatsSink,
    trace::TraceStore,
    Error,
};
use itertools::Itertools;
use std::time::{Duration, Instant};

/// Number of ticks between wall clock budget checks.
const STOP_TIME_CHECK_INTERVAL: u64 = 1 << 12;

/// Replays a trace through the configured memory hierarchy.
#[derive(Debug)]
pub struct Simulator {
    config: config::Simulation,
    pub ctx: Context,
    scheduler: Box<dyn Scheduler>,
    analyzers: Vec<Node>,
    cpu: Cpu,
    gpu: Gpu,
    barrier: Barrier,

    /// Frames left to fast forward.
    start_budget: u64,
    /// Frames left to replay after the current one.
    stop_budget: Option<u64>,
    frame_active: bool,
    ticks: u64,
    start_time: Instant,
    frame_start_time: Instant,
}

impl Simulator {
    pub fn new(
        config: config::Simulation,
        trace: Box<dyn TraceStore>,
        classification: Box<dyn Classification>,
        sink: Box<dyn StatsSink>,
    ) -> Result<Self, Error> {
        Self::with_registry(&Registry::with_builtin(), config, trace, classification, sink)
    }

    /// Builds the analyzers with a custom registry and starts the first frame.
    pub fn with_registry(
        registry: &Registry,
        config: config::Simulation,
        trace: Box<dyn TraceStore>,
        classification: Box<dyn Classification>,
        sink: Box<dyn StatsSink>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let analyzers = registry.build_all(&config.models)?;
        let scheduler = scheduler::build(&config.scheduler, config.seed)?;
        let ctx = Context::new(&config, trace, classification, sink)?;
        log::info!(
            "{} gpu cores, {} scheduler, analyzers [{}]",
            config.num_gpu_cores,
            scheduler.name(),
            analyzers.iter().flat_map(Node::names).join(", ")
        );
        let mut sim = Self {
            cpu: Cpu::new(),
            gpu: Gpu::new(config.num_gpu_cores),
            barrier: Barrier::new(),
            start_budget: config.start_frame,
            stop_budget: config.stop_frame,
            frame_active: false,
            ticks: 0,
            start_time: Instant::now(),
            frame_start_time: Instant::now(),
            ctx,
            scheduler,
            analyzers,
            config,
        };
        sim.handle_new_frame()?;
        Ok(sim)
    }

    #[must_use]
    pub fn config(&self) -> &config::Simulation {
        &self.config
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.ctx.running
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Takes the statistics collected by the sink.
    pub fn stats(&mut self) -> Option<stats::Stats> {
        self.ctx.sink.take_stats()
    }

    #[tracing::instrument(skip_all, name = "run")]
    pub fn run(&mut self) -> Result<(), Error> {
        let stop_time = self.config.stop_time.map(Duration::from_secs_f64);
        while self.ctx.running {
            self.tick()?;
            if self.ticks % STOP_TIME_CHECK_INTERVAL == 0 {
                if let Some(stop_time) = stop_time {
                    if self.start_time.elapsed() >= stop_time {
                        self.ctx.stop(format!("exceeded time budget of {stop_time:?}"));
                    }
                }
            }
        }
        log::info!(
            "finished after {} ticks and {} packets in {:?}",
            self.ticks,
            self.ctx.tsc,
            self.start_time.elapsed()
        );
        Ok(())
    }

    /// Advances the CPU and then the GPU by one step.
    pub fn tick(&mut self) -> Result<(), Error> {
        self.ticks += 1;

        let event = {
            let mut env = Env {
                ctx: &mut self.ctx,
                scheduler: self.scheduler.as_mut(),
                analyzers: &mut self.analyzers,
            };
            self.cpu.tick(&mut env, &mut self.barrier)?
        };
        match event {
            Some(Event::NewScene) => self.handle_new_scene()?,
            Some(Event::EndScene) => self.handle_end_scene()?,
            Some(Event::EndFrame) => {
                self.handle_end_frame()?;
                if self.ctx.running {
                    self.handle_new_frame()?;
                }
            }
            None => {}
        }
        if !self.ctx.running {
            return Ok(());
        }

        {
            let mut env = Env {
                ctx: &mut self.ctx,
                scheduler: self.scheduler.as_mut(),
                analyzers: &mut self.analyzers,
            };
            self.gpu.tick(&mut env, &mut self.barrier)?;
        }

        if self.cpu.is_done() && self.gpu.is_done() {
            self.finish("command streams exhausted");
        } else if (self.cpu.is_done() && self.gpu.is_blocked(&self.barrier))
            || (self.gpu.is_done() && self.cpu.is_blocked(&self.barrier))
        {
            log::warn!(
                "cpu ({:?}) and gpu ({:?}) command streams are out of sync",
                self.cpu.state(),
                self.gpu.state()
            );
            self.finish("command streams out of sync");
        }
        Ok(())
    }

    fn finish(&mut self, reason: &str) {
        if self.frame_active {
            self.record_frame();
        }
        self.ctx.stop(reason);
    }

    fn handle_new_frame(&mut self) -> Result<(), Error> {
        let frame_id = self.ctx.frame_nbr;
        let Some(frame) = self.ctx.trace.frame(frame_id)? else {
            self.ctx.stop(format!("no frame {frame_id} in trace"));
            return Ok(());
        };
        log::info!(
            "frame {} with {} scenes{}",
            frame.id,
            frame.scenes.len(),
            if self.start_budget > 0 { " (fast forward)" } else { "" }
        );
        for node in &mut self.analyzers {
            node.start_new_frame(frame_id, &mut self.ctx)?;
        }
        self.scheduler
            .start_new_frame(frame_id, self.ctx.trace.as_ref())?;
        self.frame_active = true;
        self.frame_start_time = Instant::now();
        Ok(())
    }

    fn handle_new_scene(&mut self) -> Result<(), Error> {
        let (frame_id, scene_id) = (self.ctx.frame_nbr, self.ctx.scene_nbr);
        log::info!("frame {frame_id} scene {scene_id}");
        for node in &mut self.analyzers {
            node.start_new_scene(frame_id, scene_id, &mut self.ctx)?;
        }
        self.scheduler.start_new_scene(self.ctx.trace.as_ref())?;
        Ok(())
    }

    fn handle_end_scene(&mut self) -> Result<(), Error> {
        for node in &mut self.analyzers {
            node.dump_stats(&mut self.ctx)?;
        }
        for node in &mut self.analyzers {
            node.reset_stats();
        }
        self.ctx.scene_nbr += 1;
        self.ctx.global_scene_idx += 1;
        Ok(())
    }

    /// Reports the per-core and per-resource statistics of the current frame.
    fn record_frame(&mut self) {
        let frame_id = self.ctx.frame_nbr;
        let mut cores = vec![self.cpu.core().stats().clone()];
        cores.extend(self.gpu.cores().iter().map(|core| core.stats().clone()));
        self.cpu.core_mut().reset_stats();
        for core in self.gpu.cores_mut() {
            core.reset_stats();
        }
        let frame = stats::Frame {
            id: frame_id,
            fast_forwarded: self.start_budget > 0,
            cores,
        };
        log::info!(
            "frame {} done in {:?}: {:?}",
            frame_id,
            self.frame_start_time.elapsed(),
            frame.total()
        );
        self.ctx.sink.frame(frame);

        for resource in self.ctx.resources.frame_stats(frame_id) {
            self.ctx.sink.resource(resource);
        }
        self.ctx.resources.reset_stats();
        self.ctx.resources.clear_dead();
        self.ctx.resources.clear_zombies();
        self.frame_active = false;
    }

    fn handle_end_frame(&mut self) -> Result<(), Error> {
        self.record_frame();
        self.ctx.frame_nbr += 1;
        self.ctx.scene_nbr = 0;
        self.start_budget = self.start_budget.saturating_sub(1);
        match self.stop_budget {
            Some(0) => self.ctx.stop("reached stop frame"),
            Some(ref mut frames_left) => *frames_left -= 1,
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Simulator;
    use crate::{classification, config, sink::Recorder, testing, trace};
    use color_eyre::eyre;
    use pretty_assertions_sorted as diff;
    use trace_model::{Access, Command, Device, Frame, Job, JobKind, Resource, Scene};

    fn job(frame_id: u64, id: u64, device: Device, kind: JobKind) -> Job {
        Job {
            id,
            frame_id,
            scene_id: 0,
            device,
            kind,
        }
    }

    /// Frames with a single scene with one CPU and two GPU jobs each.
    fn frames(num_frames: u64) -> trace::Memory {
        let mut trace = trace::Memory::new().with_resource(Resource {
            id: 1,
            start_addr: 0x10000,
            end_addr: 0x10fff,
            name: Some("vertex buffer".to_string()),
        });
        for frame_id in 0..num_frames {
            let jobs = [
                job(frame_id, 0, Device::CPU, JobKind::Misc),
                job(frame_id, 1, Device::GPU, JobKind::Draw),
                job(frame_id, 2, Device::GPU, JobKind::Tile { x: 0, y: 0 }),
            ];
            trace = trace
                .with_frame(Frame {
                    id: frame_id,
                    scenes: vec![frame_id],
                })
                .with_scene(Scene {
                    id: 0,
                    frame_id,
                    global_id: frame_id,
                    width: 1,
                    height: 1,
                    jobs: vec![0, 1, 2],
                })
                .with_job(jobs[0].clone(), vec![Access::write(0x10000, 4, Some(1))])
                .with_job(
                    jobs[1].clone(),
                    vec![
                        Access::read(0x10000, 4, Some(1)),
                        Access::read(0x10004, 4, Some(1)),
                    ],
                )
                .with_job(jobs[2].clone(), vec![Access::read(0x10040, 4, None)]);
        }
        trace
    }

    fn commands(num_frames: u64) -> Vec<Command> {
        let mut commands = vec![Command::NewResource { id: 1 }];
        for _ in 0..num_frames {
            commands.extend([
                Command::NewScene,
                Command::NewJob { id: 0 },
                Command::EndScene,
                Command::Sync,
                Command::NewFrame,
            ]);
        }
        commands
    }

    fn trace(num_frames: u64) -> trace::Memory {
        frames(num_frames)
            .with_commands(Device::CPU, commands(num_frames))
            .with_commands(Device::GPU, commands(num_frames))
    }

    fn config() -> eyre::Result<config::Simulation> {
        let mut config: config::Simulation = serde_yaml::from_str(
            r"
num-gpu-cores: 2
models:
  - type: BaseCache
    id: l1
    size: 4096
    associativity: 4
    children:
      - type: BaseCache
        id: l2
        size: 65536
",
        )?;
        config.seed = 7;
        Ok(config)
    }

    fn run(config: config::Simulation, trace: trace::Memory) -> eyre::Result<stats::Stats> {
        testing::init_logging();
        let mut sim = Simulator::new(
            config,
            Box::new(trace),
            Box::new(classification::Memory::new()),
            Box::new(Recorder::new()),
        )?;
        sim.run()?;
        assert!(!sim.is_running());
        Ok(sim.stats().unwrap_or_default())
    }

    #[test]
    fn replay_single_frame() -> eyre::Result<()> {
        let stats = run(config()?, trace(1))?;

        diff::assert_eq!(stats.frames.len(), 1);
        let frame = &stats.frames[0];
        assert!(!frame.fast_forwarded);
        diff::assert_eq!(
            frame.cores.iter().map(|c| c.core_id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        diff::assert_eq!(frame.total().jobs, 3);
        diff::assert_eq!(frame.total().packets, 4);
        diff::assert_eq!(stats.schedule.len(), 3);

        let l1 = stats.reduce_cache("l1");
        diff::assert_eq!(l1.total_accesses(), 4);
        diff::assert_eq!(l1.num_misses(), 2);
        diff::assert_eq!(l1.num_hits(), 2);
        // every l1 miss fetches a block from l2
        diff::assert_eq!(stats.reduce_cache("l2").total_accesses(), 2);
        diff::assert_eq!(stats.cache_dumps("l1").count(), 1);

        diff::assert_eq!(stats.resources.len(), 1);
        diff::assert_eq!(stats.resources[0].id, 1);
        diff::assert_eq!(stats.resources[0].core_read_blocks, 3);
        diff::assert_eq!(stats.resources[0].core_write_blocks, 1);
        diff::assert_eq!(stats.resources[0].core_touched_blocks, 2);
        Ok(())
    }

    #[test]
    fn replay_is_deterministic() -> eyre::Result<()> {
        let first = run(config()?, trace(3))?;
        let second = run(config()?, trace(3))?;
        diff::assert_eq!(first, second);
        diff::assert_eq!(first.frames.len(), 3);
        diff::assert_eq!(first.caches.len(), 2 * 3);
        Ok(())
    }

    #[test]
    fn frame_budgets() -> eyre::Result<()> {
        let mut config = config()?;
        config.start_frame = 1;
        config.stop_frame = Some(1);
        let stats = run(config, trace(4))?;
        diff::assert_eq!(
            stats
                .frames
                .iter()
                .map(|frame| (frame.id, frame.fast_forwarded))
                .collect::<Vec<_>>(),
            vec![(0, true), (1, false)]
        );
        Ok(())
    }

    #[test]
    fn out_of_sync_command_streams_stop() -> eyre::Result<()> {
        let trace = frames(1)
            .with_commands(Device::CPU, commands(1))
            .with_commands(Device::GPU, [Command::Sync]);
        let stats = run(config()?, trace)?;
        diff::assert_eq!(stats.frames.len(), 1);
        Ok(())
    }

    #[test]
    fn unknown_resource_is_fatal() -> eyre::Result<()> {
        let trace = trace(1).with_job(
            job(0, 2, Device::GPU, JobKind::Tile { x: 0, y: 0 }),
            vec![Access::read(0x10040, 4, Some(99))],
        );
        assert!(run(config()?, trace).is_err());
        Ok(())
    }

    #[test]
    fn late_writeback_revives_destroyed_resource() -> eyre::Result<()> {
        let mut config: config::Simulation = serde_yaml::from_str(
            r"
num-gpu-cores: 1
models:
  - type: BaseCache
    id: l1
    size: 64
    associativity: 1
    track-resource-traffic: true
",
        )?;
        config.seed = 7;

        let writer = job(0, 0, Device::GPU, JobKind::Draw);
        let reader = job(1, 0, Device::GPU, JobKind::Draw);
        let commands = [
            Command::NewResource { id: 1 },
            Command::NewResource { id: 2 },
            Command::NewScene,
            Command::EndScene,
            Command::EndResource { id: 1 },
            Command::NewFrame,
            Command::NewScene,
            Command::EndScene,
            Command::NewFrame,
        ];
        let mut trace = trace::Memory::new()
            .with_resource(Resource {
                id: 1,
                start_addr: 0x10000,
                end_addr: 0x10fff,
                name: None,
            })
            .with_resource(Resource {
                id: 2,
                start_addr: 0x20000,
                end_addr: 0x20fff,
                name: None,
            })
            .with_job(writer, vec![Access::write(0x10000, 4, Some(1))])
            .with_job(reader, vec![Access::read(0x20000, 4, Some(2))])
            .with_commands(Device::CPU, commands.clone())
            .with_commands(Device::GPU, commands);
        for frame_id in 0..2 {
            trace = trace
                .with_frame(Frame {
                    id: frame_id,
                    scenes: vec![frame_id],
                })
                .with_scene(Scene {
                    id: 0,
                    frame_id,
                    global_id: frame_id,
                    width: 1,
                    height: 1,
                    jobs: vec![0],
                });
        }

        let stats = run(config, trace)?;
        // the dirty line of resource 1 is only evicted by the read of the next frame
        diff::assert_eq!(stats.reduce_cache("l1").writebacks, 1);
        diff::assert_eq!(
            stats
                .resources
                .iter()
                .map(|r| (r.frame_id, r.id, r.state, r.write_blocks))
                .collect::<Vec<_>>(),
            vec![
                (0, 1, stats::resource::State::DEAD, 0),
                (1, 2, stats::resource::State::ALIVE, 0),
                (1, 1, stats::resource::State::ZOMBIE, 1),
            ]
        );
        Ok(())
    }
}
