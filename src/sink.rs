use super::Error;
use serde::Serialize;
use std::path::Path;

/// Receives the statistics produced during a run.
pub trait StatsSink: std::fmt::Debug {
    fn cache_stats(&mut self, dump: stats::cache::Dump);

    fn schedule_decision(&mut self, decision: stats::Decision);

    fn frame(&mut self, frame: stats::Frame);

    fn resource(&mut self, resource: stats::Resource);

    /// Takes the collected statistics, if the sink keeps them.
    fn take_stats(&mut self) -> Option<stats::Stats> {
        None
    }
}

/// Collects all statistics in memory.
#[derive(Debug, Default)]
pub struct Recorder {
    pub stats: stats::Stats,
}

impl Recorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsSink for Recorder {
    fn cache_stats(&mut self, dump: stats::cache::Dump) {
        log::debug!(
            "{} frame={} scene={}: {:?}",
            dump.model,
            dump.frame_id,
            dump.scene_id,
            dump.global
        );
        self.stats.caches.push(dump);
    }

    fn schedule_decision(&mut self, decision: stats::Decision) {
        self.stats.schedule.push(decision);
    }

    fn frame(&mut self, frame: stats::Frame) {
        self.stats.frames.push(frame);
    }

    fn resource(&mut self, resource: stats::Resource) {
        self.stats.resources.push(resource);
    }

    fn take_stats(&mut self) -> Option<stats::Stats> {
        Some(std::mem::take(&mut self.stats))
    }
}

/// Writes `stats.json` and `cache_stats.csv` to `out_dir`.
pub fn write_stats(stats: &stats::Stats, out_dir: &Path) -> Result<(), Error> {
    utils::fs::create_dirs(out_dir)?;

    let writer = utils::fs::open_writable(out_dir.join("stats.json"))?;
    let mut json_serializer = serde_json::Serializer::with_formatter(
        writer,
        serde_json::ser::PrettyFormatter::with_indent(b"    "),
    );
    stats.serialize(&mut json_serializer)?;

    let writer = utils::fs::open_writable(out_dir.join("cache_stats.csv"))?;
    let mut csv_writer = csv::WriterBuilder::new()
        .flexible(false)
        .from_writer(writer);
    for dump in &stats.caches {
        for row in dump.flatten() {
            csv_writer.serialize(row)?;
        }
    }
    csv_writer.flush()?;
    Ok(())
}
