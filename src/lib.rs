#![allow(
    clippy::upper_case_acronyms,
    non_camel_case_types,
    clippy::too_many_arguments,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::too_many_lines,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

pub mod analyzer;
pub mod barrier;
pub mod cache;
pub mod classification;
pub mod config;
pub mod context;
pub mod core;
pub mod cpu;
pub mod error;
pub mod gpu;
pub mod packet;
pub mod resource;
pub mod scheduler;
pub mod sim;
pub mod sink;
pub mod tag_array;
pub mod trace;
pub mod vmem;

#[cfg(test)]
pub mod testing;

pub use error::{Error, Result};
pub use sim::Simulator;

use std::path::Path;

pub type address = u64;

/// Name of a benchmark, derived from the last component of its trace directory.
#[must_use]
pub fn benchmark_name(trace_dir: &Path) -> String {
    trace_dir
        .file_name()
        .map_or_else(|| "trace".to_string(), |name| name.to_string_lossy().to_string())
}

/// Replays the trace in `trace_dir` and collects all statistics in memory.
///
/// Sharing classifications are read from `classification-input-dir` when
/// configured.
#[tracing::instrument(skip(config))]
pub fn simulate_trace(trace_dir: &Path, config: &config::Simulation) -> Result<stats::Stats> {
    let start = std::time::Instant::now();
    let trace = trace::Dir::open(trace_dir)?;
    let benchmark = config
        .benchmark_name
        .clone()
        .unwrap_or_else(|| benchmark_name(trace_dir));
    let classification: Box<dyn classification::Classification> =
        match &config.classification_input_dir {
            Some(dir) => Box::new(classification::Dir::new(dir, &benchmark)),
            None => Box::new(classification::Memory::new()),
        };

    let mut sim = Simulator::new(
        config.clone(),
        Box::new(trace),
        classification,
        Box::new(sink::Recorder::new()),
    )?;
    sim.run()?;
    log::info!("{benchmark}: simulated {} ticks in {:?}", sim.ticks(), start.elapsed());
    Ok(sim.stats().unwrap_or_default())
}
