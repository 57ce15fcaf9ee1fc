use crate::{
    classification::Classification, config, context::Context, sink::Recorder, trace,
    trace::TraceStore, Error,
};
use trace_model::{Device, Frame, Job, JobKind, Scene};

static LOGGER: std::sync::Once = std::sync::Once::new();

pub fn init_logging() {
    LOGGER.call_once(|| {
        env_logger::builder().is_test(true).init();
    });
}

/// Simulation config without virtual memory.
#[must_use]
pub fn config() -> config::Simulation {
    config::Simulation {
        virtual_memory: config::VirtualMemory {
            enabled: false,
            ..config::VirtualMemory::default()
        },
        ..config::Simulation::default()
    }
}

/// Context recording into a [`Recorder`], without virtual memory.
pub fn context(
    trace: impl TraceStore + 'static,
    classification: impl Classification + 'static,
) -> Result<Context, Error> {
    init_logging();
    Context::new(
        &config(),
        Box::new(trace),
        Box::new(classification),
        Box::new(Recorder::new()),
    )
}

#[must_use]
pub fn job(id: u64, device: Device, kind: JobKind) -> Job {
    Job {
        id,
        frame_id: 0,
        scene_id: 0,
        device,
        kind,
    }
}

#[must_use]
pub fn scene(global_id: u64, width: u32, height: u32, jobs: &[Job]) -> Scene {
    Scene {
        id: global_id,
        frame_id: 0,
        global_id,
        width,
        height,
        jobs: jobs.iter().map(|job| job.id).collect(),
    }
}

/// Trace of a single frame with a single scene.
#[must_use]
pub fn trace_with_scene(jobs: &[Job], width: u32, height: u32) -> trace::Memory {
    let mut trace = trace::Memory::new()
        .with_frame(Frame {
            id: 0,
            scenes: vec![0],
        })
        .with_scene(scene(0, width, height, jobs));
    for job in jobs {
        trace = trace.with_job(job.clone(), vec![]);
    }
    trace
}
