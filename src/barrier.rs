use trace_model::Device;

/// Two-party rendezvous between the CPU and the GPU.
///
/// Each device only advances its own counter and only reads the other one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Barrier {
    cpu: u64,
    gpu: u64,
}

impl Barrier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last barrier reached by `device`.
    #[must_use]
    pub fn reached(&self, device: Device) -> u64 {
        match device {
            Device::CPU => self.cpu,
            Device::GPU => self.gpu,
        }
    }

    /// Marks barrier `id` as reached by `device`.
    pub fn signal(&mut self, device: Device, id: u64) {
        let counter = match device {
            Device::CPU => &mut self.cpu,
            Device::GPU => &mut self.gpu,
        };
        debug_assert!(id >= *counter, "barrier counters never decrease");
        *counter = id.max(*counter);
        log::trace!("{device} reached barrier {id}");
    }

    #[must_use]
    pub fn is_ready(&self, device: Device, id: u64) -> bool {
        self.reached(device) >= id
    }
}

/// Command processing state of a device.
///
/// `D_*` states dispatch the work of a barrier command, `W_*` states wait
/// for the other device to reach the barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    PROCESS_CMD,
    D_SYNC,
    D_RSC_SYNC,
    D_NEW_SCENE_SYNC,
    D_END_SCENE_SYNC,
    D_FRAME_SYNC,
    W_SYNC,
    W_RSC_SYNC,
    W_NEW_SCENE_SYNC,
    W_END_SCENE_SYNC,
    W_FRAME_SYNC,
    /// The command stream is exhausted.
    DONE,
}

impl State {
    /// Wait state following a dispatch state.
    #[must_use]
    pub fn wait(self) -> Self {
        match self {
            Self::D_SYNC => Self::W_SYNC,
            Self::D_RSC_SYNC => Self::W_RSC_SYNC,
            Self::D_NEW_SCENE_SYNC => Self::W_NEW_SCENE_SYNC,
            Self::D_END_SCENE_SYNC => Self::W_END_SCENE_SYNC,
            Self::D_FRAME_SYNC => Self::W_FRAME_SYNC,
            other => other,
        }
    }

    #[must_use]
    pub fn is_waiting(self) -> bool {
        matches!(
            self,
            Self::W_SYNC
                | Self::W_RSC_SYNC
                | Self::W_NEW_SCENE_SYNC
                | Self::W_END_SCENE_SYNC
                | Self::W_FRAME_SYNC
        )
    }

    /// Dispatch state entered after `command`.
    ///
    /// `None` for commands without a barrier.
    #[must_use]
    pub fn dispatch(command: &trace_model::Command) -> Option<Self> {
        use trace_model::Command;
        match command {
            Command::NewFrame => Some(Self::D_FRAME_SYNC),
            Command::NewScene => Some(Self::D_NEW_SCENE_SYNC),
            Command::EndScene => Some(Self::D_END_SCENE_SYNC),
            Command::NewResource { .. } | Command::EndResource { .. } => Some(Self::D_RSC_SYNC),
            Command::Sync | Command::SyncProvides { .. } | Command::SyncRequires { .. } => {
                Some(Self::D_SYNC)
            }
            Command::NewJob { .. } | Command::EndJob { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Barrier, State};
    use trace_model::{Command, Device};

    #[test]
    fn counters_are_independent() {
        let mut barrier = Barrier::new();
        assert!(barrier.is_ready(Device::CPU, 0));
        assert!(!barrier.is_ready(Device::GPU, 1));
        barrier.signal(Device::GPU, 1);
        assert!(barrier.is_ready(Device::GPU, 1));
        assert!(!barrier.is_ready(Device::CPU, 1));
        barrier.signal(Device::CPU, 1);
        barrier.signal(Device::GPU, 2);
        assert_eq!(barrier.reached(Device::CPU), 1);
        assert_eq!(barrier.reached(Device::GPU), 2);
    }

    #[test]
    fn dispatch_states() {
        assert_eq!(State::dispatch(&Command::NewJob { id: 0 }), None);
        assert_eq!(
            State::dispatch(&Command::SyncRequires { id: 0 }).map(State::wait),
            Some(State::W_SYNC)
        );
        assert_eq!(
            State::dispatch(&Command::NewFrame).map(State::wait),
            Some(State::W_FRAME_SYNC)
        );
        assert!(State::W_RSC_SYNC.is_waiting());
        assert!(!State::D_RSC_SYNC.is_waiting());
    }
}
