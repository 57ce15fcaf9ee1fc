use super::{
    address, classification::Classification, config, resource::ResourceTracker, sink::StatsSink,
    trace::TraceStore, vmem::VirtualMemoryManager, Error,
};

/// State shared by all components of a single run.
#[derive(Debug)]
pub struct Context {
    /// Frame currently replayed.
    pub frame_nbr: u64,
    /// Scene number within the current frame.
    pub scene_nbr: u64,
    /// Scene number across all frames.
    pub global_scene_idx: u64,
    /// Number of packets sent into the analyzer chain.
    pub tsc: u64,
    pub running: bool,
    pub resources: ResourceTracker,
    pub vmem: Option<VirtualMemoryManager>,
    pub trace: Box<dyn TraceStore>,
    pub classification: Box<dyn Classification>,
    pub sink: Box<dyn StatsSink>,
}

impl Context {
    pub fn new(
        config: &config::Simulation,
        trace: Box<dyn TraceStore>,
        classification: Box<dyn Classification>,
        sink: Box<dyn StatsSink>,
    ) -> Result<Self, Error> {
        let vmem = if config.virtual_memory.enabled {
            Some(VirtualMemoryManager::new(
                &config.virtual_memory,
                config.seed,
            )?)
        } else {
            None
        };
        Ok(Self {
            frame_nbr: 0,
            scene_nbr: 0,
            global_scene_idx: 0,
            tsc: 0,
            running: true,
            resources: ResourceTracker::new(config.block_size),
            vmem,
            trace,
            classification,
            sink,
        })
    }

    /// Physical address of `vaddr`.
    ///
    /// Identity when virtual memory is disabled.
    pub fn translate(&self, vaddr: address) -> Result<address, Error> {
        match &self.vmem {
            Some(vmem) => vmem.translate(vaddr),
            None => Ok(vaddr),
        }
    }

    /// Requests a controlled shutdown after the current tick.
    pub fn stop(&mut self, reason: impl std::fmt::Display) {
        if self.running {
            log::info!("stopping simulation: {reason}");
        }
        self.running = false;
    }
}
