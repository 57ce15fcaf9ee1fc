use serde::{Deserialize, Serialize};

/// Histogram with fixed-width buckets over `[min, max]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub min: u64,
    pub max: u64,
    pub bucket_size: u64,
    pub buckets: Vec<u64>,
    pub underflows: u64,
    pub overflows: u64,
    pub samples: u64,
}

impl Distribution {
    #[must_use]
    pub fn new(min: u64, max: u64, bucket_size: u64) -> Self {
        let bucket_size = bucket_size.max(1);
        let num_buckets = (max.saturating_sub(min) / bucket_size + 1) as usize;
        Self {
            min,
            max,
            bucket_size,
            buckets: vec![0; num_buckets],
            underflows: 0,
            overflows: 0,
            samples: 0,
        }
    }

    pub fn sample(&mut self, value: u64) {
        self.samples += 1;
        if value < self.min {
            self.underflows += 1;
        } else if value > self.max {
            self.overflows += 1;
        } else {
            let bucket = ((value - self.min) / self.bucket_size) as usize;
            self.buckets[bucket] += 1;
        }
    }

    pub fn reset(&mut self) {
        self.buckets.iter_mut().for_each(|count| *count = 0);
        self.underflows = 0;
        self.overflows = 0;
        self.samples = 0;
    }
}

impl std::ops::AddAssign<&Distribution> for Distribution {
    fn add_assign(&mut self, other: &Distribution) {
        debug_assert_eq!(self.buckets.len(), other.buckets.len());
        for (count, other) in self.buckets.iter_mut().zip(other.buckets.iter()) {
            *count += other;
        }
        self.underflows += other.underflows;
        self.overflows += other.overflows;
        self.samples += other.samples;
    }
}

#[cfg(test)]
mod tests {
    use super::Distribution;
    use pretty_assertions_sorted as diff;

    #[test]
    fn sample_into_buckets() {
        let mut dist = Distribution::new(0, 4, 1);
        for value in [0, 1, 1, 4, 7] {
            dist.sample(value);
        }
        diff::assert_eq!(dist.buckets, vec![1, 2, 0, 0, 1]);
        diff::assert_eq!(dist.overflows, 1);
        diff::assert_eq!(dist.underflows, 0);
        diff::assert_eq!(dist.samples, 5);

        dist.reset();
        diff::assert_eq!(dist.samples, 0);
        diff::assert_eq!(dist.buckets, vec![0; 5]);
    }

    #[test]
    fn underflow_below_min() {
        let mut dist = Distribution::new(2, 10, 4);
        dist.sample(1);
        dist.sample(5);
        dist.sample(6);
        diff::assert_eq!(dist.buckets, vec![1, 1, 0]);
        diff::assert_eq!(dist.underflows, 1);
    }
}
