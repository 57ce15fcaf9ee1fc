use super::{distribution::Distribution, mem::AccessKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

#[derive(
    Debug,
    strum::EnumIter,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum AccessStat {
    HIT,
    MISS,
    /// Line was last touched in the same frame.
    INTRA_FRAME_HIT,
    /// Line was last touched in the same scene.
    INTRA_SCENE_HIT,
    /// Line was last touched by the same job.
    INTRA_JOB_HIT,
    /// Line was last touched through the same resource.
    INTRA_RESOURCE_HIT,
    /// Bytes delivered to the cores.
    GPU_SIDE_BYTES,
    /// Bytes moved between this cache and the next level.
    MEM_SIDE_BYTES,
}

impl std::fmt::Display for AccessStat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

pub type CacheCsvRow = ((AccessKind, AccessStat), u64);

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {
    pub accesses: BTreeMap<AccessKind, BTreeMap<AccessStat, u64>>,
    pub evictions: u64,
    pub writebacks: u64,
}

impl Default for Cache {
    fn default() -> Self {
        let accesses = AccessKind::iter()
            .map(|kind| (kind, AccessStat::iter().map(|stat| (stat, 0)).collect()))
            .collect();
        Self {
            accesses,
            evictions: 0,
            writebacks: 0,
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut out = f.debug_struct("CacheStats");
        for ((kind, stat), count) in self.iter() {
            if count > 0 {
                out.field(&format!("{kind:?}[{stat:?}]"), &count);
            }
        }
        out.field("evictions", &self.evictions);
        out.field("writebacks", &self.writebacks);
        out.finish_non_exhaustive()
    }
}

impl std::ops::AddAssign for Cache {
    fn add_assign(&mut self, other: Self) {
        for ((kind, stat), count) in other.iter() {
            self.inc(kind, stat, count);
        }
        self.evictions += other.evictions;
        self.writebacks += other.writebacks;
    }
}

impl Cache {
    #[inline]
    pub fn inc(&mut self, kind: impl Into<AccessKind>, stat: impl Into<AccessStat>, count: u64) {
        *self
            .accesses
            .entry(kind.into())
            .or_default()
            .entry(stat.into())
            .or_insert(0) += count;
    }

    #[must_use]
    pub fn get(&self, kind: AccessKind, stat: AccessStat) -> u64 {
        self.accesses
            .get(&kind)
            .and_then(|stats| stats.get(&stat))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of a statistic over all access kinds.
    #[must_use]
    pub fn total(&self, stat: AccessStat) -> u64 {
        AccessKind::iter().map(|kind| self.get(kind, stat)).sum()
    }

    #[must_use]
    pub fn num_hits(&self) -> u64 {
        self.total(AccessStat::HIT)
    }

    #[must_use]
    pub fn num_misses(&self) -> u64 {
        self.total(AccessStat::MISS)
    }

    #[must_use]
    pub fn total_accesses(&self) -> u64 {
        self.num_hits() + self.num_misses()
    }

    pub fn iter(&self) -> impl Iterator<Item = ((AccessKind, AccessStat), u64)> + '_ {
        self.accesses.iter().flat_map(|(kind, stats)| {
            stats
                .iter()
                .map(move |(stat, count)| ((*kind, *stat), *count))
        })
    }

    #[must_use]
    pub fn flatten(self) -> Vec<CacheCsvRow> {
        self.iter().collect()
    }
}

pub type PerIdCsvRow = (u64, CacheCsvRow);

/// Cache statistics partitioned by job, core or resource id.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerId(pub BTreeMap<u64, Cache>);

impl PerId {
    /// Statistics of `id`, created on first use.
    pub fn entry(&mut self, id: u64) -> &mut Cache {
        self.0.entry(id).or_default()
    }

    #[must_use]
    pub fn flatten(self) -> Vec<PerIdCsvRow> {
        self.0
            .into_iter()
            .flat_map(|(id, cache)| cache.flatten().into_iter().map(move |row| (id, row)))
            .collect()
    }
}

impl std::ops::Deref for PerId {
    type Target = BTreeMap<u64, Cache>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for PerId {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Statistics of one cache model for one scene.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dump {
    pub model: String,
    pub frame_id: u64,
    pub scene_id: u64,
    pub global: Cache,
    pub per_job: PerId,
    pub per_core: PerId,
    pub per_resource: PerId,
    /// Number of touched sub-blocks per evicted line.
    pub block_utilization: Distribution,
    /// Number of reused sub-blocks per evicted line.
    pub block_reutilization: Distribution,
}

/// A flattened CSV row of a [`Dump`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CsvRow {
    pub model: String,
    pub frame_id: u64,
    pub scene_id: u64,
    /// `global`, `job`, `core` or `resource`.
    pub scope: &'static str,
    pub id: Option<u64>,
    pub access_kind: AccessKind,
    pub stat: String,
    pub count: u64,
}

impl Dump {
    /// Flattens all non-zero counters into CSV rows.
    #[must_use]
    pub fn flatten(&self) -> Vec<CsvRow> {
        let row = |scope: &'static str, id: Option<u64>, ((kind, stat), count): CacheCsvRow| CsvRow {
            model: self.model.clone(),
            frame_id: self.frame_id,
            scene_id: self.scene_id,
            scope,
            id,
            access_kind: kind,
            stat: stat.to_string(),
            count,
        };
        let mut rows: Vec<CsvRow> = self
            .global
            .clone()
            .flatten()
            .into_iter()
            .map(|r| row("global", None, r))
            .collect();
        for (scope, per_id) in [
            ("job", &self.per_job),
            ("core", &self.per_core),
            ("resource", &self.per_resource),
        ] {
            rows.extend(
                per_id
                    .clone()
                    .flatten()
                    .into_iter()
                    .map(|(id, r)| row(scope, Some(id), r)),
            );
        }
        rows.retain(|row| row.count > 0);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessStat, Cache, PerId};
    use crate::mem::AccessKind;
    use pretty_assertions_sorted as diff;

    #[test]
    fn default_has_all_counters() {
        let stats = Cache::default();
        diff::assert_eq!(stats.iter().count(), 2 * 8);
        diff::assert_eq!(stats.total_accesses(), 0);
    }

    #[test]
    fn add_assign_sums_counters() {
        let mut a = Cache::default();
        a.inc(AccessKind::READ, AccessStat::HIT, 2);
        a.evictions = 1;
        let mut b = Cache::default();
        b.inc(AccessKind::READ, AccessStat::HIT, 1);
        b.inc(AccessKind::WRITE, AccessStat::MISS, 1);
        b.writebacks = 3;
        a += b;
        diff::assert_eq!(a.get(AccessKind::READ, AccessStat::HIT), 3);
        diff::assert_eq!(a.get(AccessKind::WRITE, AccessStat::MISS), 1);
        diff::assert_eq!(a.total_accesses(), 4);
        diff::assert_eq!((a.evictions, a.writebacks), (1, 3));
    }

    #[test]
    fn per_id_flatten() {
        let mut per_job = PerId::default();
        per_job.entry(1).inc(AccessKind::READ, AccessStat::MISS, 1);
        per_job.entry(2).inc(AccessKind::READ, AccessStat::MISS, 2);
        per_job.entry(2).evictions += 1;
        diff::assert_eq!(per_job.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        let misses: Vec<_> = per_job
            .flatten()
            .into_iter()
            .filter(|(_, ((_, stat), count))| *stat == AccessStat::MISS && *count > 0)
            .map(|(id, (_, count))| (id, count))
            .collect();
        diff::assert_eq!(misses, vec![(1, 1), (2, 2)]);
    }
}
