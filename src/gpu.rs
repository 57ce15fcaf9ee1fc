use crate::{
    barrier::{self, Barrier},
    core::{self, Core, Env},
    Error,
};
use trace_model::Device;

/// The GPU side of the replay, owning all GPU cores.
///
/// The GPU arrives at every barrier first and resumes once the CPU has
/// acknowledged it.
#[derive(Debug)]
pub struct Gpu {
    cores: Vec<Core>,
    state: barrier::State,
    barrier_id: u64,
}

impl Gpu {
    /// GPU cores are numbered from 1, core 0 is the CPU.
    #[must_use]
    pub fn new(num_cores: usize) -> Self {
        Self {
            cores: (1..=num_cores)
                .map(|id| Core::new(id, Device::GPU))
                .collect(),
            state: barrier::State::PROCESS_CMD,
            barrier_id: 0,
        }
    }

    #[must_use]
    pub fn cores(&self) -> &[Core] {
        &self.cores
    }

    pub fn cores_mut(&mut self) -> &mut [Core] {
        &mut self.cores
    }

    #[must_use]
    pub fn state(&self) -> barrier::State {
        self.state
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == barrier::State::DONE
    }

    /// Whether the GPU waits for a barrier the CPU has not reached.
    #[must_use]
    pub fn is_blocked(&self, barrier: &Barrier) -> bool {
        self.state.is_waiting() && !barrier.is_ready(Device::CPU, self.barrier_id)
    }

    fn arrive(&mut self, barrier: &mut Barrier) {
        self.barrier_id += 1;
        barrier.signal(Device::GPU, self.barrier_id);
        self.state = self.state.wait();
    }

    #[tracing::instrument(skip_all, name = "gpu_tick")]
    pub fn tick(&mut self, env: &mut Env, barrier: &mut Barrier) -> Result<(), Error> {
        use crate::barrier::State;
        match self.state {
            State::PROCESS_CMD => match env.ctx.trace.next_command(Device::GPU)? {
                Some(command) => {
                    log::debug!("gpu: {command}");
                    if let Some(dispatch) = State::dispatch(&command) {
                        self.state = dispatch;
                    }
                }
                None => {
                    log::debug!("gpu: command stream exhausted");
                    self.state = State::DONE;
                }
            },
            State::D_SYNC | State::D_RSC_SYNC => self.arrive(barrier),
            State::D_NEW_SCENE_SYNC | State::D_END_SCENE_SYNC | State::D_FRAME_SYNC => {
                let mut running = false;
                for gpu_core in &mut self.cores {
                    running |= gpu_core.tick(env)? == core::State::RUNNING;
                }
                if !running {
                    self.arrive(barrier);
                }
            }
            State::W_SYNC
            | State::W_RSC_SYNC
            | State::W_NEW_SCENE_SYNC
            | State::W_END_SCENE_SYNC
            | State::W_FRAME_SYNC => {
                if barrier.is_ready(Device::CPU, self.barrier_id) {
                    self.state = State::PROCESS_CMD;
                }
            }
            State::DONE => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Gpu;
    use crate::{
        barrier::{Barrier, State},
        classification,
        core::{self, Env},
        cpu::{Cpu, Event},
        scheduler::{Fcfs, Scheduler},
        testing,
    };
    use color_eyre::eyre;
    use pretty_assertions_sorted as diff;
    use trace_model::{Access, Command, Device, JobKind};

    #[test]
    fn arrives_first_and_waits_for_cpu() -> eyre::Result<()> {
        let trace = crate::trace::Memory::new()
            .with_commands(Device::GPU, [Command::Sync, Command::NewResource { id: 1 }]);
        let mut ctx = testing::context(trace, classification::Memory::new())?;
        let mut scheduler = Fcfs::default();
        let mut env = Env {
            ctx: &mut ctx,
            scheduler: &mut scheduler,
            analyzers: &mut [],
        };
        let mut gpu = Gpu::new(1);
        let mut barrier = Barrier::new();

        gpu.tick(&mut env, &mut barrier)?;
        diff::assert_eq!(gpu.state(), State::D_SYNC);
        assert!(!gpu.is_blocked(&barrier));

        gpu.tick(&mut env, &mut barrier)?;
        diff::assert_eq!(gpu.state(), State::W_SYNC);
        diff::assert_eq!(barrier.reached(Device::GPU), 1);
        assert!(gpu.is_blocked(&barrier));

        gpu.tick(&mut env, &mut barrier)?;
        diff::assert_eq!(gpu.state(), State::W_SYNC);

        barrier.signal(Device::CPU, 1);
        assert!(!gpu.is_blocked(&barrier));
        gpu.tick(&mut env, &mut barrier)?;
        diff::assert_eq!(gpu.state(), State::PROCESS_CMD);

        // the gpu only synchronizes on resource commands
        gpu.tick(&mut env, &mut barrier)?;
        diff::assert_eq!(gpu.state(), State::D_RSC_SYNC);
        gpu.tick(&mut env, &mut barrier)?;
        diff::assert_eq!(gpu.state(), State::W_RSC_SYNC);
        diff::assert_eq!(barrier.reached(Device::GPU), 2);
        assert!(env.ctx.resources.alive().next().is_none());

        barrier.signal(Device::CPU, 2);
        gpu.tick(&mut env, &mut barrier)?;
        gpu.tick(&mut env, &mut barrier)?;
        assert!(gpu.is_done());
        assert!(!gpu.is_blocked(&barrier));
        Ok(())
    }

    #[test]
    fn cores_drain_scene_before_arriving() -> eyre::Result<()> {
        let jobs = [
            testing::job(0, Device::GPU, JobKind::Draw),
            testing::job(1, Device::GPU, JobKind::Draw),
        ];
        let trace = testing::trace_with_scene(&jobs, 1, 1)
            .with_job(jobs[0].clone(), vec![Access::read(0x0, 4, None)])
            .with_job(jobs[1].clone(), vec![Access::read(0x40, 4, None)])
            .with_commands(Device::GPU, [Command::EndScene]);
        let mut ctx = testing::context(trace, classification::Memory::new())?;
        let mut scheduler = Fcfs::default();
        scheduler.start_new_frame(0, ctx.trace.as_ref())?;
        scheduler.start_new_scene(ctx.trace.as_ref())?;
        let mut env = Env {
            ctx: &mut ctx,
            scheduler: &mut scheduler,
            analyzers: &mut [],
        };
        let mut gpu = Gpu::new(2);
        let mut barrier = Barrier::new();

        gpu.tick(&mut env, &mut barrier)?;
        diff::assert_eq!(gpu.state(), State::D_END_SCENE_SYNC);

        gpu.tick(&mut env, &mut barrier)?;
        diff::assert_eq!(gpu.state(), State::D_END_SCENE_SYNC);
        diff::assert_eq!(barrier.reached(Device::GPU), 0);
        diff::assert_eq!(
            gpu.cores().iter().map(core::Core::state).collect::<Vec<_>>(),
            vec![core::State::RUNNING, core::State::RUNNING]
        );

        gpu.tick(&mut env, &mut barrier)?;
        diff::assert_eq!(gpu.state(), State::W_END_SCENE_SYNC);
        diff::assert_eq!(barrier.reached(Device::GPU), 1);
        diff::assert_eq!(
            gpu.cores()
                .iter()
                .map(|c| (c.id(), c.state(), c.stats().jobs, c.stats().packets))
                .collect::<Vec<_>>(),
            vec![(1, core::State::IDLE, 1, 1), (2, core::State::IDLE, 1, 1)]
        );
        assert!(env.scheduler.is_empty());
        Ok(())
    }

    #[test]
    fn devices_meet_at_every_barrier() -> eyre::Result<()> {
        let commands = [
            Command::NewScene,
            Command::Sync,
            Command::EndScene,
            Command::NewFrame,
        ];
        let trace = crate::trace::Memory::new()
            .with_commands(Device::CPU, commands.clone())
            .with_commands(Device::GPU, commands);
        let mut ctx = testing::context(trace, classification::Memory::new())?;
        let mut scheduler = Fcfs::default();
        let mut env = Env {
            ctx: &mut ctx,
            scheduler: &mut scheduler,
            analyzers: &mut [],
        };
        let (mut cpu, mut gpu) = (Cpu::new(), Gpu::new(2));
        let mut barrier = Barrier::new();

        let mut events = Vec::new();
        let mut ticks = 0;
        while !(cpu.is_done() && gpu.is_done()) {
            assert!(
                !(cpu.is_blocked(&barrier) && gpu.is_blocked(&barrier)),
                "deadlock at {barrier:?}"
            );
            if let Some(event) = cpu.tick(&mut env, &mut barrier)? {
                events.push((event, barrier.reached(Device::CPU)));
            }
            gpu.tick(&mut env, &mut barrier)?;
            // the cpu never gets ahead of the gpu
            assert!(barrier.reached(Device::CPU) <= barrier.reached(Device::GPU));
            ticks += 1;
            assert!(ticks < 100);
        }
        diff::assert_eq!(
            events,
            vec![
                (Event::NewScene, 1),
                (Event::EndScene, 3),
                (Event::EndFrame, 4)
            ]
        );
        diff::assert_eq!(barrier.reached(Device::CPU), 4);
        diff::assert_eq!(barrier.reached(Device::GPU), 4);
        Ok(())
    }
}
