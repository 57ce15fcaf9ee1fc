use clap::Parser;
use color_eyre::eyre::{self, WrapErr};
use console::{style, Style};
use gltracesim::config;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Debug, Parser)]
#[command(author, version, about = "replays graphics memory traces through cache models", long_about = None)]
struct Options {
    /// Simulation config (YAML or JSON)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Directory statistics are written to, one subdirectory per benchmark
    #[arg(short, long, value_name = "OUTPUT_DIR")]
    output: PathBuf,
    /// Trace directories to replay
    #[arg(value_name = "TRACE_DIR", required = true)]
    traces: Vec<PathBuf>,
    #[arg(long = "cores")]
    num_gpu_cores: Option<usize>,
    /// Scheduler (fcfs, random or z)
    #[arg(long)]
    scheduler: Option<String>,
    #[arg(long)]
    start_frame: Option<u64>,
    #[arg(long)]
    stop_frame: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    /// Directory with sharing classifications
    #[arg(long)]
    classification: Option<PathBuf>,
    /// Increase log verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Options {
    fn simulation_config(&self) -> eyre::Result<config::Simulation> {
        let mut config = match &self.config {
            Some(path) => config::Simulation::from_file(path)
                .wrap_err_with(|| format!("failed to load config {}", path.display()))?,
            None => config::Simulation::default(),
        };
        if let Some(num_gpu_cores) = self.num_gpu_cores {
            config.num_gpu_cores = num_gpu_cores;
        }
        if let Some(scheduler) = &self.scheduler {
            config.scheduler.kind = scheduler.clone();
        }
        if let Some(start_frame) = self.start_frame {
            config.start_frame = start_frame;
        }
        if self.stop_frame.is_some() {
            config.stop_frame = self.stop_frame;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.classification.is_some() {
            config.classification_input_dir = self.classification.clone();
        }
        config.validate()?;
        Ok(config)
    }

    fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

fn run_benchmark(
    trace_dir: &Path,
    config: &config::Simulation,
    output: &Path,
) -> eyre::Result<stats::Stats> {
    let benchmark = gltracesim::benchmark_name(trace_dir);
    let stats = gltracesim::simulate_trace(trace_dir, config)
        .wrap_err_with(|| format!("failed to simulate {}", trace_dir.display()))?;
    gltracesim::sink::write_stats(&stats, &output.join(&benchmark))?;
    Ok(stats)
}

fn print_benchmark_result(
    trace_dir: &Path,
    result: &eyre::Result<stats::Stats>,
    elapsed: Duration,
) {
    let benchmark = gltracesim::benchmark_name(trace_dir);
    let (color, status) = match result {
        Ok(stats) => {
            let frames = stats.frames.iter().filter(|f| !f.fast_forwarded).count();
            (
                Style::new().green(),
                format!("{frames} frames in {elapsed:?}"),
            )
        }
        Err(err) => (Style::new().red(), format!("failed after {elapsed:?}: {err:#}")),
    };
    println!(
        "{:>12} {:>20} [ {} ] {}",
        "simulating",
        color.apply_to(&benchmark),
        trace_dir.display(),
        color.apply_to(status),
    );
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let options = Options::parse();

    env_logger::Builder::new()
        .filter_level(options.log_level())
        .parse_default_env()
        .init();

    let start = Instant::now();
    let config = options.simulation_config()?;
    utils::fs::create_dirs(&options.output)?;

    let simulate = |trace_dir: &PathBuf| {
        let start = Instant::now();
        let result = run_benchmark(trace_dir, &config, &options.output);
        print_benchmark_result(trace_dir, &result, start.elapsed());
        result
    };

    #[cfg(feature = "parallel")]
    let results: Vec<_> = {
        use rayon::prelude::*;
        options.traces.par_iter().map(simulate).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let results: Vec<_> = options.traces.iter().map(simulate).collect();

    let failed = results.iter().filter(|result| result.is_err()).count();
    println!(
        "simulated {} benchmarks in {:?} ({} failed) -> {}",
        results.len(),
        start.elapsed(),
        style(failed).red(),
        options.output.display(),
    );
    if let Some(err) = results.into_iter().find_map(Result::err) {
        return Err(err);
    }
    Ok(())
}
