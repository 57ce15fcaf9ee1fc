use crate::{
    analyzer::Node,
    context::Context,
    packet::{self, Packet},
    scheduler::{Job, Scheduler},
    Error,
};
use std::collections::VecDeque;
use trace_model::Device;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    RUNNING,
    IDLE,
}

/// Everything a device borrows from the simulator to make progress.
pub struct Env<'a> {
    pub ctx: &'a mut Context,
    pub scheduler: &'a mut dyn Scheduler,
    pub analyzers: &'a mut [Node],
}

impl<'a> Env<'a> {
    /// Sends a packet through every top-level analyzer.
    pub fn send_packet(&mut self, packet: &Packet) -> Result<(), Error> {
        if packet.kind.is_access() {
            self.ctx.tsc += 1;
            let resource = match packet.resource_id {
                Some(id) => Some(self.ctx.resources.get_mut(id)?),
                None => self.ctx.resources.find_by_address_mut(packet.vaddr),
            };
            if let Some(resource) = resource {
                resource.record_core_access(packet.vaddr, packet.is_write());
            }
        }
        for node in self.analyzers.iter_mut() {
            node.process(packet, self.ctx)?;
        }
        Ok(())
    }
}

/// A single lane of a device, working on one job at a time.
#[derive(Debug)]
pub struct Core {
    id: usize,
    device: Device,
    state: State,
    job: Option<Job>,
    stats: stats::sim::Core,
}

impl Core {
    #[must_use]
    pub fn new(id: usize, device: Device) -> Self {
        Self {
            id,
            device,
            state: State::IDLE,
            job: None,
            stats: stats::sim::Core {
                core_id: id,
                ..stats::sim::Core::default()
            },
        }
    }

    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    #[must_use]
    pub fn stats(&self) -> &stats::sim::Core {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = stats::sim::Core {
            core_id: self.id,
            ..stats::sim::Core::default()
        };
    }

    /// Issues at most one access of the current job.
    ///
    /// A core without a job or with a drained job asks the scheduler for the
    /// next one and becomes idle if there is none.
    pub fn tick(&mut self, env: &mut Env) -> Result<State, Error> {
        self.state = State::RUNNING;

        if self.job.as_ref().map_or(true, Job::is_done) {
            if let Some(done) = self.job.take() {
                log::debug!("core {}: finished {}", self.id, done);
                env.send_packet(&Packet::marker(
                    packet::Kind::END_JOB,
                    done.id(),
                    self.id,
                    self.device,
                ))?;
            }
            let Some(mut job) =
                env.scheduler
                    .get_next_job(self.id, self.device, env.ctx.sink.as_mut())
            else {
                self.state = State::IDLE;
                return Ok(self.state);
            };
            job.accesses = Some(VecDeque::from(env.ctx.trace.accesses(&job.info)?));
            self.stats.jobs += 1;
            env.send_packet(&Packet::marker(
                packet::Kind::NEW_JOB,
                job.id(),
                self.id,
                self.device,
            ))?;
            self.job = Some(job);
        }

        let Some(job) = self.job.as_mut() else {
            return Ok(self.state);
        };
        let Some(access) = job.accesses.as_mut().and_then(VecDeque::pop_front) else {
            return Ok(self.state);
        };
        let mut packet = Packet::from_access(&access, job.id(), self.device);
        packet.core_id = self.id;
        packet.paddr = env.ctx.translate(packet.vaddr)?;
        self.stats.packets += 1;
        env.send_packet(&packet)?;
        Ok(self.state)
    }
}
