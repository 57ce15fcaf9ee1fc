#![allow(non_camel_case_types, clippy::upper_case_acronyms)]

pub mod cache;
pub mod distribution;
pub mod mem;
pub mod resource;
pub mod scheduler;
pub mod sim;

pub use cache::{Cache, PerId};
pub use distribution::Distribution;
pub use mem::AccessKind;
pub use resource::Resource;
pub use scheduler::Decision;
pub use sim::Frame;

use serde::{Deserialize, Serialize};

/// All statistics produced by a simulation run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Per-scene dumps of every cache model, in dump order.
    pub caches: Vec<cache::Dump>,
    pub schedule: Vec<Decision>,
    pub frames: Vec<Frame>,
    pub resources: Vec<Resource>,
}

impl Stats {
    /// Dumps of a single cache model.
    pub fn cache_dumps<'a>(&'a self, model: &'a str) -> impl Iterator<Item = &'a cache::Dump> + 'a {
        self.caches.iter().filter(move |dump| dump.model == model)
    }

    /// Sum of the global statistics of all dumps of a cache model.
    #[must_use]
    pub fn reduce_cache(&self, model: &str) -> Cache {
        let mut total = Cache::default();
        for dump in self.cache_dumps(model) {
            total += dump.global.clone();
        }
        total
    }
}
