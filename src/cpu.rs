use crate::{
    barrier::{self, Barrier},
    core::{self, Core, Env},
    Error,
};
use trace_model::{Command, Device};

/// Driver callback requested by the CPU after leaving a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    NewScene,
    EndScene,
    EndFrame,
}

/// The CPU side of the replay.
///
/// The CPU leads every barrier: it waits for the GPU to arrive, advances its
/// own counter and then asks the driver to start or end scenes and frames.
#[derive(Debug)]
pub struct Cpu {
    core: Core,
    state: barrier::State,
    barrier_id: u64,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub const CORE_ID: usize = 0;

    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Core::new(Self::CORE_ID, Device::CPU),
            state: barrier::State::PROCESS_CMD,
            barrier_id: 0,
        }
    }

    #[must_use]
    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    #[must_use]
    pub fn state(&self) -> barrier::State {
        self.state
    }

    /// Whether the command stream is exhausted.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == barrier::State::DONE
    }

    /// Whether the CPU waits for a barrier the GPU has not reached.
    #[must_use]
    pub fn is_blocked(&self, barrier: &Barrier) -> bool {
        self.state.is_waiting() && !barrier.is_ready(Device::GPU, self.barrier_id + 1)
    }

    fn process_command(&mut self, command: Command, env: &mut Env) -> Result<(), Error> {
        log::debug!("cpu: {command}");
        match command {
            Command::NewJob { .. } | Command::EndJob { .. } => {}
            Command::NewResource { id } => {
                let desc = env
                    .ctx
                    .trace
                    .resource(id)?
                    .ok_or(Error::MissingTraceRecord { kind: "resource", id })?;
                env.ctx.resources.add(&desc);
                if let Some(vmem) = env.ctx.vmem.as_mut() {
                    vmem.alloc(desc.start_addr, desc.end_addr);
                }
                self.state = barrier::State::W_RSC_SYNC;
            }
            Command::EndResource { id } => {
                let range = env.ctx.resources.destroy(id)?;
                if let (Some(range), Some(vmem)) = (range, env.ctx.vmem.as_mut()) {
                    vmem.free(*range.start(), *range.end())?;
                }
                self.state = barrier::State::W_RSC_SYNC;
            }
            other => {
                if let Some(dispatch) = barrier::State::dispatch(&other) {
                    self.state = dispatch;
                }
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, name = "cpu_tick")]
    pub fn tick(&mut self, env: &mut Env, barrier: &mut Barrier) -> Result<Option<Event>, Error> {
        use crate::barrier::State;
        match self.state {
            State::PROCESS_CMD => match env.ctx.trace.next_command(Device::CPU)? {
                Some(command) => self.process_command(command, env)?,
                None => {
                    log::debug!("cpu: command stream exhausted");
                    self.state = State::DONE;
                }
            },
            State::D_SYNC | State::D_RSC_SYNC => {
                self.state = self.state.wait();
            }
            State::D_NEW_SCENE_SYNC | State::D_END_SCENE_SYNC | State::D_FRAME_SYNC => {
                if self.core.tick(env)? == core::State::IDLE {
                    self.state = self.state.wait();
                }
            }
            State::W_SYNC
            | State::W_RSC_SYNC
            | State::W_NEW_SCENE_SYNC
            | State::W_END_SCENE_SYNC
            | State::W_FRAME_SYNC => {
                let id = self.barrier_id + 1;
                if !barrier.is_ready(Device::GPU, id) {
                    return Ok(None);
                }
                self.barrier_id = id;
                barrier.signal(Device::CPU, id);
                let event = match self.state {
                    State::W_NEW_SCENE_SYNC => Some(Event::NewScene),
                    State::W_END_SCENE_SYNC => Some(Event::EndScene),
                    State::W_FRAME_SYNC => Some(Event::EndFrame),
                    _ => None,
                };
                self.state = State::PROCESS_CMD;
                return Ok(event);
            }
            State::DONE => {}
        }
        Ok(None)
    }
}
