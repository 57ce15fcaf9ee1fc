use super::{Base, Job, Scheduler};
use crate::Error;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::VecDeque;
use trace_model::Scene;

/// Serves the GPU jobs of a scene in a random order.
///
/// The order only depends on the seed.
#[derive(Debug)]
pub struct Random {
    base: Base,
    rng: StdRng,
    gpu_queue: VecDeque<Job>,
}

impl Random {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            base: Base::default(),
            rng: StdRng::seed_from_u64(seed),
            gpu_queue: VecDeque::new(),
        }
    }
}

impl Scheduler for Random {
    fn name(&self) -> &'static str {
        "random"
    }

    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn queue_gpu_jobs(&mut self, _scene: &Scene, mut jobs: Vec<Job>) -> Result<(), Error> {
        jobs.shuffle(&mut self.rng);
        self.gpu_queue.extend(jobs);
        Ok(())
    }

    fn next_gpu_job(&mut self, _core_id: usize) -> Option<Job> {
        self.gpu_queue.pop_front()
    }

    fn num_gpu_jobs(&self) -> usize {
        self.gpu_queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::Random;
    use crate::{scheduler::Scheduler, sink::Recorder, testing};
    use color_eyre::eyre;
    use pretty_assertions_sorted as diff;
    use trace_model::{Device, JobKind};

    fn gpu_order(seed: u64) -> eyre::Result<Vec<u64>> {
        let jobs: Vec<_> = (0..32)
            .map(|id| testing::job(id, Device::GPU, JobKind::Draw))
            .collect();
        let trace = testing::trace_with_scene(&jobs, 1, 1);
        let mut scheduler = Random::new(seed);
        scheduler.start_new_frame(0, &trace)?;
        scheduler.start_new_scene(&trace)?;
        let mut sink = Recorder::new();
        Ok(
            std::iter::from_fn(|| scheduler.get_next_job(1, Device::GPU, &mut sink))
                .map(|job| job.id())
                .collect(),
        )
    }

    #[test]
    fn shuffle_is_seeded() -> eyre::Result<()> {
        let order = gpu_order(42)?;
        diff::assert_eq!(order, gpu_order(42)?);

        let mut sorted = order.clone();
        sorted.sort_unstable();
        diff::assert_eq!(sorted, (0..32).collect::<Vec<_>>());
        assert_ne!(order, sorted);
        Ok(())
    }
}
