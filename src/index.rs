//! Per-chromosome locus indexing for fast overlap and proximity queries.

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::interval::Interval;
use crate::locus::Locus;

/// Collection-scoped locus identifier.
pub type LocusId = u64;

/// Minimum number of loci before chromosome indexes are built in
/// parallel. Below this threshold, sequential construction is faster
/// due to thread spawn overhead.
pub const PARALLEL_THRESHOLD: usize = 10_000;

/// Direction for nearest-neighbor queries, relative to the reference
/// coordinate axis (not locus strand).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Loci ending at or before the query position.
    Upstream,
    /// Loci starting at or after the query position.
    Downstream,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    start: u64,
    end: u64,
    id: LocusId,
}

/// Index for a single chromosome: entries sorted by (start, end) with a
/// running maximum end, plus an end-sorted view for upstream lookups.
///
/// `query_overlap` binary-searches the upper bound on start, then scans
/// backward; the running max end bounds the scan, so nested intervals
/// cannot degrade it to a full pass.
#[derive(Debug, Default)]
struct ChromIndex {
    by_start: Vec<Entry>,
    max_end: Vec<u64>,
    by_end: Vec<(u64, LocusId)>,
}

impl ChromIndex {
    fn build(mut entries: Vec<Entry>) -> Self {
        entries.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

        let mut max_end = Vec::with_capacity(entries.len());
        let mut running = 0u64;
        for entry in &entries {
            running = running.max(entry.end);
            max_end.push(running);
        }

        let mut by_end: Vec<(u64, LocusId)> =
            entries.iter().map(|e| (e.end, e.id)).collect();
        by_end.sort_unstable();

        Self {
            by_start: entries,
            max_end,
            by_end,
        }
    }

    fn overlaps(&self, query: &Interval) -> Vec<LocusId> {
        let upper = self
            .by_start
            .partition_point(|e| e.start < query.end());

        let mut results = Vec::new();
        for i in (0..upper).rev() {
            if self.max_end[i] <= query.start() {
                break;
            }
            let entry = &self.by_start[i];
            if entry.end > query.start() {
                results.push(entry.id);
            }
        }
        results.reverse();
        results
    }

    fn upstream(&self, position: u64, n: usize) -> Vec<LocusId> {
        let bound = self.by_end.partition_point(|(end, _)| *end <= position);
        self.by_end[..bound]
            .iter()
            .rev()
            .take(n)
            .map(|(_, id)| *id)
            .collect()
    }

    fn downstream(&self, position: u64, n: usize) -> Vec<LocusId> {
        let bound = self.by_start.partition_point(|e| e.start < position);
        self.by_start[bound..]
            .iter()
            .take(n)
            .map(|e| e.id)
            .collect()
    }
}

/// An indexed view over a set of loci, organized by chromosome.
///
/// Built in bulk from `(LocusId, &Locus)` pairs in `O(n log n)`; query
/// results reference loci by id. Querying a chromosome absent from the
/// index yields an empty result, never an error.
#[derive(Debug, Default)]
pub struct LocusIndex {
    chroms: FxHashMap<String, ChromIndex>,
    len: usize,
}

impl LocusIndex {
    /// Build an index from identified loci.
    pub fn build<'a, I>(loci: I) -> Self
    where
        I: IntoIterator<Item = (LocusId, &'a Locus)>,
    {
        let mut groups: FxHashMap<String, Vec<Entry>> = FxHashMap::default();
        let mut len = 0usize;
        for (id, locus) in loci {
            len += 1;
            groups
                .entry(locus.chromosome().to_string())
                .or_default()
                .push(Entry {
                    start: locus.start(),
                    end: locus.end(),
                    id,
                });
        }

        let chroms: FxHashMap<String, ChromIndex> = if len >= PARALLEL_THRESHOLD {
            groups
                .into_iter()
                .collect::<Vec<_>>()
                .into_par_iter()
                .map(|(chrom, entries)| (chrom, ChromIndex::build(entries)))
                .collect()
        } else {
            groups
                .into_iter()
                .map(|(chrom, entries)| (chrom, ChromIndex::build(entries)))
                .collect()
        };

        log::debug!(
            "built locus index: {} loci across {} chromosomes",
            len,
            chroms.len()
        );

        Self { chroms, len }
    }

    /// All loci overlapping the query interval, in (start, end) order.
    pub fn query_overlap(&self, chromosome: &str, query: &Interval) -> Vec<LocusId> {
        match self.chroms.get(chromosome) {
            Some(ci) => ci.overlaps(query),
            None => Vec::new(),
        }
    }

    /// All loci within `window` bp of `position` (symmetric, half-open).
    pub fn query_window(&self, chromosome: &str, position: u64, window: u64) -> Vec<LocusId> {
        let query = Interval::from_bounds(
            position.saturating_sub(window),
            position.saturating_add(window),
        );
        self.query_overlap(chromosome, &query)
    }

    /// The nearest locus in the given direction: the maximal end at or
    /// before `position` (upstream), or the minimal start at or after it
    /// (downstream). `None` when no locus qualifies.
    pub fn nearest(
        &self,
        chromosome: &str,
        position: u64,
        direction: Direction,
    ) -> Option<LocusId> {
        self.nearest_n(chromosome, position, direction, 1)
            .into_iter()
            .next()
    }

    /// Up to `n` nearest loci in the given direction, closest first.
    pub fn nearest_n(
        &self,
        chromosome: &str,
        position: u64,
        direction: Direction,
        n: usize,
    ) -> Vec<LocusId> {
        match self.chroms.get(chromosome) {
            Some(ci) => match direction {
                Direction::Upstream => ci.upstream(position, n),
                Direction::Downstream => ci.downstream(position, n),
            },
            None => Vec::new(),
        }
    }

    /// Chromosomes present in the index.
    pub fn chromosomes(&self) -> impl Iterator<Item = &str> {
        self.chroms.keys().map(String::as_str)
    }

    pub fn contains_chromosome(&self, chromosome: &str) -> bool {
        self.chroms.contains_key(chromosome)
    }

    /// Total number of indexed loci.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_loci() -> Vec<Locus> {
        vec![
            Locus::new("chr8", 100, 150).unwrap(),
            Locus::new("chr8", 160, 175).unwrap(),
            Locus::new("chr8", 180, 200).unwrap(),
            Locus::new("chr2", 100, 200).unwrap(),
        ]
    }

    fn build(loci: &[Locus]) -> LocusIndex {
        LocusIndex::build(loci.iter().enumerate().map(|(i, l)| (i as LocusId, l)))
    }

    #[test]
    fn test_query_overlap() {
        let loci = sample_loci();
        let index = build(&loci);

        let query = Interval::new(140, 170).unwrap();
        let hits = index.query_overlap("chr8", &query);
        assert_eq!(hits, vec![0, 1]); // a and b, not c

        // End boundary is exclusive: a query ending exactly at a start
        // does not pick that locus up
        let query = Interval::new(140, 160).unwrap();
        assert_eq!(index.query_overlap("chr8", &query), vec![0]);
    }

    #[test]
    fn test_unknown_chromosome_is_empty() {
        let loci = sample_loci();
        let index = build(&loci);

        let query = Interval::new(0, 1_000).unwrap();
        assert!(index.query_overlap("chrX", &query).is_empty());
        assert!(index.nearest("chrX", 100, Direction::Upstream).is_none());
        assert!(index.query_window("chrX", 100, 50).is_empty());
    }

    #[test]
    fn test_nested_intervals_found() {
        // A long interval that starts early must still be found when the
        // query lands past many later-starting short intervals.
        let mut loci = vec![Locus::new("chr1", 0, 10_000).unwrap()];
        for i in 0..100 {
            loci.push(Locus::new("chr1", 100 + i * 10, 105 + i * 10).unwrap());
        }
        let index = build(&loci);

        let query = Interval::new(5_000, 5_001).unwrap();
        let hits = index.query_overlap("chr1", &query);
        assert_eq!(hits, vec![0]);
    }

    #[test]
    fn test_query_window() {
        let loci = sample_loci();
        let index = build(&loci);

        // [155, 185) touches b and c but not a
        assert_eq!(index.query_window("chr8", 170, 15), vec![1, 2]);
        // Window saturates at the origin instead of underflowing
        assert!(index.query_window("chr8", 10, 50).is_empty());
    }

    #[test]
    fn test_nearest() {
        let loci = sample_loci();
        let index = build(&loci);

        assert_eq!(index.nearest("chr8", 205, Direction::Upstream), Some(2));
        assert_eq!(index.nearest("chr8", 155, Direction::Downstream), Some(1));
        assert_eq!(index.nearest("chr8", 155, Direction::Upstream), Some(0));
        // Nothing starts at or after 300
        assert_eq!(index.nearest("chr8", 300, Direction::Downstream), None);
        // Nothing ends at or before 50
        assert_eq!(index.nearest("chr8", 50, Direction::Upstream), None);
    }

    #[test]
    fn test_nearest_n_ordering() {
        let loci = sample_loci();
        let index = build(&loci);

        assert_eq!(
            index.nearest_n("chr8", 300, Direction::Upstream, 2),
            vec![2, 1]
        );
        assert_eq!(
            index.nearest_n("chr8", 0, Direction::Downstream, 3),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_boundary_position_inclusive() {
        let loci = sample_loci();
        let index = build(&loci);

        // "at or before" / "at or after" include exact boundary matches
        assert_eq!(index.nearest("chr8", 150, Direction::Upstream), Some(0));
        assert_eq!(index.nearest("chr8", 180, Direction::Downstream), Some(2));
    }
}
