//! Named, persistent, indexed collections of loci.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use rand::seq::IteratorRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{LociError, Result};
use crate::index::{Direction, LocusId, LocusIndex};
use crate::interval::Interval;
use crate::locus::{Locus, Strand};
use crate::store::{validate_name, SnapshotStore};

/// Lifecycle state of a collection.
///
/// `Building` collections are mutable and in-memory only. `freeze`
/// commits a durable snapshot and makes the in-memory copy read-only.
/// `Loaded` collections were rehydrated from a snapshot and are
/// read-only until [`RefLoci::reopen`] transitions them back to
/// `Building`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Building,
    Frozen,
    Loaded,
}

impl CollectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionState::Building => "building",
            CollectionState::Frozen => "frozen",
            CollectionState::Loaded => "loaded",
        }
    }
}

impl fmt::Display for CollectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable schema of a collection: the id-to-locus mapping plus the id
/// counter, so a reopened collection never reuses an id.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    name: &'a str,
    next_id: LocusId,
    loci: &'a BTreeMap<LocusId, Locus>,
}

#[derive(Deserialize)]
struct Snapshot {
    #[allow(dead_code)]
    name: String,
    next_id: LocusId,
    loci: BTreeMap<LocusId, Locus>,
}

/// A named collection of loci with stable per-collection ids, an
/// indexed query surface, and snapshot persistence.
///
/// The index is rebuilt lazily: mutation invalidates it, the next query
/// (or `freeze`) materializes it. Collections in `Frozen` or `Loaded`
/// state are safe for unlimited concurrent readers; reopening for
/// mutation must be serialized by the caller.
pub struct RefLoci {
    name: String,
    loci: BTreeMap<LocusId, Locus>,
    next_id: LocusId,
    state: CollectionState,
    index: OnceLock<LocusIndex>,
}

impl RefLoci {
    /// Create a new, empty collection in `Building` state.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            loci: BTreeMap::new(),
            next_id: 1,
            state: CollectionState::Building,
            index: OnceLock::new(),
        })
    }

    /// Create a collection and bulk-insert `loci` into it.
    pub fn from_loci<I>(name: impl Into<String>, loci: I) -> Result<Self>
    where
        I: IntoIterator<Item = Locus>,
    {
        let mut collection = Self::new(name)?;
        collection.extend(loci)?;
        Ok(collection)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    pub fn is_frozen(&self) -> bool {
        self.state == CollectionState::Frozen
    }

    pub fn len(&self) -> usize {
        self.loci.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loci.is_empty()
    }

    fn ensure_mutable(&self, op: &'static str) -> Result<()> {
        if self.state != CollectionState::Building {
            return Err(LociError::InvalidState {
                name: self.name.clone(),
                state: self.state.as_str(),
                op,
            });
        }
        Ok(())
    }

    // --- mutation ---

    /// Insert a locus, assigning it the next collection-scoped id.
    /// Fails unless the collection is in `Building` state.
    pub fn insert(&mut self, locus: Locus) -> Result<LocusId> {
        self.ensure_mutable("insert")?;
        let id = self.next_id;
        self.next_id += 1;
        self.loci.insert(id, locus);
        // Index is stale until the next query
        self.index.take();
        Ok(id)
    }

    /// Bulk-insert, returning the assigned ids in input order.
    pub fn extend<I>(&mut self, loci: I) -> Result<Vec<LocusId>>
    where
        I: IntoIterator<Item = Locus>,
    {
        self.ensure_mutable("insert")?;
        let mut ids = Vec::new();
        for locus in loci {
            let id = self.next_id;
            self.next_id += 1;
            self.loci.insert(id, locus);
            ids.push(id);
        }
        if !ids.is_empty() {
            self.index.take();
        }
        Ok(ids)
    }

    /// Transition a `Frozen` or `Loaded` collection back to `Building`.
    /// The durable snapshot (if any) is considered stale until the
    /// collection is frozen again.
    pub fn reopen(&mut self) {
        self.state = CollectionState::Building;
    }

    // --- lookup and iteration ---

    /// Fetch a locus by its collection-scoped id.
    pub fn get(&self, id: LocusId) -> Option<&Locus> {
        self.loci.get(&id)
    }

    /// Iterate loci in insertion (id) order.
    pub fn iter(&self) -> impl Iterator<Item = (LocusId, &Locus)> {
        self.loci.iter().map(|(id, locus)| (*id, locus))
    }

    /// Whether an equal locus (by value equality: chromosome, interval,
    /// strand) is present in the collection.
    pub fn contains_locus(&self, locus: &Locus) -> bool {
        self.query_overlap(locus.chromosome(), locus.interval())
            .iter()
            .any(|(_, hit)| *hit == locus)
    }

    /// Chromosomes represented in the collection.
    pub fn chromosomes(&self) -> Vec<&str> {
        let mut chroms: Vec<&str> = self.index().chromosomes().collect();
        chroms.sort_unstable();
        chroms
    }

    /// Draw up to `n` loci uniformly at random.
    pub fn sample<R: Rng>(&self, rng: &mut R, n: usize) -> Vec<(LocusId, &Locus)> {
        self.iter().choose_multiple(rng, n)
    }

    // --- indexed queries ---

    fn index(&self) -> &LocusIndex {
        self.index
            .get_or_init(|| LocusIndex::build(self.loci.iter().map(|(id, l)| (*id, l))))
    }

    fn resolve(&self, ids: Vec<LocusId>) -> Vec<(LocusId, &Locus)> {
        ids.into_iter()
            .filter_map(|id| self.loci.get(&id).map(|locus| (id, locus)))
            .collect()
    }

    /// All loci overlapping the query interval on `chromosome`.
    /// An unknown chromosome yields an empty result.
    pub fn query_overlap(&self, chromosome: &str, query: &Interval) -> Vec<(LocusId, &Locus)> {
        let ids = self.index().query_overlap(chromosome, query);
        self.resolve(ids)
    }

    /// All loci within `window` bp of `position` (symmetric, half-open).
    pub fn query_window(
        &self,
        chromosome: &str,
        position: u64,
        window: u64,
    ) -> Vec<(LocusId, &Locus)> {
        let ids = self.index().query_window(chromosome, position, window);
        self.resolve(ids)
    }

    /// The nearest locus ending at or before (`Upstream`) or starting at
    /// or after (`Downstream`) the position.
    pub fn nearest(
        &self,
        chromosome: &str,
        position: u64,
        direction: Direction,
    ) -> Option<(LocusId, &Locus)> {
        let id = self.index().nearest(chromosome, position, direction)?;
        self.loci.get(&id).map(|locus| (id, locus))
    }

    /// All loci fully contained within the query interval.
    pub fn loci_within(&self, chromosome: &str, query: &Interval) -> Vec<(LocusId, &Locus)> {
        let mut hits = self.query_overlap(chromosome, query);
        hits.retain(|(_, locus)| query.contains(locus.interval()));
        hits
    }

    /// All loci spanning a single point position.
    pub fn encompassing(&self, chromosome: &str, position: u64) -> Vec<(LocusId, &Locus)> {
        let query = Interval::from_bounds(position, position.saturating_add(1));
        let mut hits = self.query_overlap(chromosome, &query);
        hits.retain(|(_, locus)| locus.interval().contains_point(position));
        hits
    }

    /// Up to `n` loci 5' of `locus` (strand-aware: upstream of a
    /// reverse-strand locus lies at higher coordinates), closest first.
    /// Overlapping loci are excluded.
    pub fn upstream_of(&self, locus: &Locus, n: usize) -> Vec<(LocusId, &Locus)> {
        let ids = match locus.strand() {
            Strand::Reverse => {
                self.index()
                    .nearest_n(locus.chromosome(), locus.end(), Direction::Downstream, n)
            }
            _ => self
                .index()
                .nearest_n(locus.chromosome(), locus.start(), Direction::Upstream, n),
        };
        self.resolve(ids)
    }

    /// Up to `n` loci 3' of `locus`, closest first.
    pub fn downstream_of(&self, locus: &Locus, n: usize) -> Vec<(LocusId, &Locus)> {
        let ids = match locus.strand() {
            Strand::Reverse => {
                self.index()
                    .nearest_n(locus.chromosome(), locus.start(), Direction::Upstream, n)
            }
            _ => self
                .index()
                .nearest_n(locus.chromosome(), locus.end(), Direction::Downstream, n),
        };
        self.resolve(ids)
    }

    /// Up to `n` flanking loci on each side of `locus`.
    pub fn flanking(
        &self,
        locus: &Locus,
        n: usize,
    ) -> (Vec<(LocusId, &Locus)>, Vec<(LocusId, &Locus)>) {
        (self.upstream_of(locus, n), self.downstream_of(locus, n))
    }

    // --- persistence ---

    /// Serialize the collection and commit it durably under its name.
    ///
    /// Fails before any storage effect when the collection is empty,
    /// not in `Building` state, or the name already exists and
    /// `overwrite` was not requested. On success the collection
    /// transitions to `Frozen`.
    pub fn freeze<S: SnapshotStore + ?Sized>(&mut self, store: &S, overwrite: bool) -> Result<()> {
        self.ensure_mutable("freeze")?;
        if self.loci.is_empty() {
            return Err(LociError::EmptyFreeze(self.name.clone()));
        }
        if !overwrite && store.contains(&self.name)? {
            return Err(LociError::SnapshotExists(self.name.clone()));
        }

        let snapshot = SnapshotRef {
            name: &self.name,
            next_id: self.next_id,
            loci: &self.loci,
        };
        let blob = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(|e| LociError::Encode(e.to_string()))?;

        store.put(&self.name, &blob)?;
        self.state = CollectionState::Frozen;
        // Readers of the frozen collection never pay for the build
        self.index();

        log::info!(
            "froze collection '{}' ({} loci, {} bytes)",
            self.name,
            self.loci.len(),
            blob.len()
        );
        Ok(())
    }

    /// Rehydrate a collection from the snapshot stored under `name`.
    /// Ids are preserved exactly as frozen.
    pub fn load<S: SnapshotStore + ?Sized>(store: &S, name: &str) -> Result<Self> {
        let blob = store.get(name)?;
        let (snapshot, _): (Snapshot, usize) =
            bincode::serde::decode_from_slice(&blob, bincode::config::standard())
                .map_err(|e| LociError::Decode(e.to_string()))?;

        log::info!("loaded collection '{}' ({} loci)", name, snapshot.loci.len());
        Ok(Self {
            name: name.to_string(),
            loci: snapshot.loci,
            next_id: snapshot.next_id,
            state: CollectionState::Loaded,
            index: OnceLock::new(),
        })
    }

    /// Names of all snapshots in a store.
    pub fn list_names<S: SnapshotStore + ?Sized>(store: &S) -> Result<Vec<String>> {
        store.list()
    }

    /// Delete the snapshot under `name`. Collections already loaded
    /// from it remain valid.
    pub fn delete<S: SnapshotStore + ?Sized>(store: &S, name: &str) -> Result<bool> {
        store.delete(name)
    }
}

impl fmt::Debug for RefLoci {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefLoci")
            .field("name", &self.name)
            .field("len", &self.loci.len())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn locus(chrom: &str, start: u64, end: u64) -> Locus {
        Locus::new(chrom, start, end).unwrap()
    }

    fn chr8_trio() -> RefLoci {
        RefLoci::from_loci(
            "trio",
            vec![
                locus("chr8", 100, 150),
                locus("chr8", 160, 175),
                locus("chr8", 180, 200),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let mut collection = RefLoci::new("test").unwrap();
        let a = collection.insert(locus("chr1", 0, 10)).unwrap();
        let b = collection.insert(locus("chr1", 20, 30)).unwrap();

        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(a).unwrap().start(), 0);
    }

    #[test]
    fn test_iteration_is_insertion_ordered() {
        let mut collection = RefLoci::new("test").unwrap();
        collection.insert(locus("chr9", 0, 10)).unwrap();
        collection.insert(locus("chr1", 0, 10)).unwrap();
        collection.insert(locus("chr5", 0, 10)).unwrap();

        let chroms: Vec<&str> = collection.iter().map(|(_, l)| l.chromosome()).collect();
        assert_eq!(chroms, vec!["chr9", "chr1", "chr5"]);
    }

    #[test]
    fn test_query_after_mutation_sees_new_loci() {
        let mut collection = RefLoci::new("test").unwrap();
        collection.insert(locus("chr1", 100, 200)).unwrap();

        let query = Interval::new(0, 1_000).unwrap();
        assert_eq!(collection.query_overlap("chr1", &query).len(), 1);

        // Mutation invalidates the cached index
        collection.insert(locus("chr1", 300, 400)).unwrap();
        assert_eq!(collection.query_overlap("chr1", &query).len(), 2);
    }

    #[test]
    fn test_trio_queries() {
        let collection = chr8_trio();

        let query = Interval::new(140, 170).unwrap();
        let hits = collection.query_overlap("chr8", &query);
        let starts: Vec<u64> = hits.iter().map(|(_, l)| l.start()).collect();
        assert_eq!(starts, vec![100, 160]);

        let (_, nearest) = collection.nearest("chr8", 205, Direction::Upstream).unwrap();
        assert_eq!(nearest.start(), 180);
        assert!(collection.nearest("chr9", 0, Direction::Upstream).is_none());
    }

    #[test]
    fn test_within_and_encompassing() {
        let collection = chr8_trio();

        let within = collection.loci_within("chr8", &Interval::new(150, 210).unwrap());
        let starts: Vec<u64> = within.iter().map(|(_, l)| l.start()).collect();
        assert_eq!(starts, vec![160, 180]);

        let spanning = collection.encompassing("chr8", 165);
        assert_eq!(spanning.len(), 1);
        assert_eq!(spanning[0].1.start(), 160);
        assert!(collection.encompassing("chr8", 155).is_empty());
    }

    #[test]
    fn test_flanking_strand_aware() {
        let collection = chr8_trio();

        let probe = locus("chr8", 160, 175).with_strand(Strand::Forward);
        let up = collection.upstream_of(&probe, 2);
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].1.start(), 100);

        // Same coordinates on the reverse strand flip the directions
        let probe = probe.with_strand(Strand::Reverse);
        let up = collection.upstream_of(&probe, 2);
        assert_eq!(up[0].1.start(), 180);
        let down = collection.downstream_of(&probe, 2);
        assert_eq!(down[0].1.start(), 100);
    }

    #[test]
    fn test_frozen_rejects_mutation() {
        let store = MemoryStore::new();
        let mut collection = chr8_trio();
        collection.freeze(&store, false).unwrap();

        assert!(collection.is_frozen());
        let err = collection.insert(locus("chr8", 0, 10)).unwrap_err();
        assert!(matches!(err, LociError::InvalidState { .. }));

        collection.reopen();
        assert!(collection.insert(locus("chr8", 0, 10)).is_ok());
    }

    #[test]
    fn test_freeze_empty_fails() {
        let store = MemoryStore::new();
        let mut collection = RefLoci::new("empty").unwrap();

        assert!(matches!(
            collection.freeze(&store, false),
            Err(LociError::EmptyFreeze(_))
        ));
        // Nothing was persisted
        assert!(RefLoci::load(&store, "empty").unwrap_err().is_not_found());
    }

    #[test]
    fn test_freeze_existing_requires_overwrite() {
        let store = MemoryStore::new();
        let mut first = chr8_trio();
        first.freeze(&store, false).unwrap();

        let mut second = RefLoci::from_loci("trio", vec![locus("chr1", 0, 10)]).unwrap();
        assert!(matches!(
            second.freeze(&store, false),
            Err(LociError::SnapshotExists(_))
        ));
        second.freeze(&store, true).unwrap();

        let loaded = RefLoci::load(&store, "trio").unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_roundtrip_preserves_everything() {
        let store = MemoryStore::new();
        let mut collection = RefLoci::new("rich").unwrap();

        let composite = locus("chr2", 10, 20)
            .merge(&locus("chr2", 30, 40).with_strand(Strand::Forward))
            .unwrap();
        collection.insert(composite).unwrap();
        collection
            .insert(
                locus("chr3", 5, 6)
                    .with_strand(Strand::Reverse)
                    .with_name("rs99")
                    .with_attr("maf", "0.02"),
            )
            .unwrap();
        collection.freeze(&store, false).unwrap();

        let loaded = RefLoci::load(&store, "rich").unwrap();
        assert_eq!(loaded.state(), CollectionState::Loaded);
        assert_eq!(loaded.len(), 2);

        let composite = loaded.get(1).unwrap();
        assert_eq!(composite.subloci().len(), 2);
        assert_eq!(composite.subloci()[1].strand(), Strand::Forward);

        let snp = loaded.get(2).unwrap();
        assert_eq!(snp.name(), Some("rs99"));
        assert_eq!(snp.attr("maf"), Some("0.02"));

        // Reopened collections continue the id sequence
        let mut loaded = loaded;
        loaded.reopen();
        let next = loaded.insert(locus("chr1", 0, 1)).unwrap();
        assert_eq!(next, 3);
    }

    #[test]
    fn test_contains_locus_is_value_equality() {
        let collection = chr8_trio();

        assert!(collection.contains_locus(&locus("chr8", 160, 175).with_name("renamed")));
        assert!(!collection.contains_locus(&locus("chr8", 160, 176)));
        assert!(!collection.contains_locus(&locus("chr9", 160, 175)));
    }

    #[test]
    fn test_sample() {
        let collection = chr8_trio();
        let mut rng = SmallRng::seed_from_u64(42);

        assert_eq!(collection.sample(&mut rng, 2).len(), 2);
        // Asking for more than exists returns everything
        assert_eq!(collection.sample(&mut rng, 10).len(), 3);
    }

    #[test]
    fn test_chromosomes() {
        let mut collection = chr8_trio();
        collection.reopen();
        collection.insert(locus("chr2", 0, 10)).unwrap();
        assert_eq!(collection.chromosomes(), vec!["chr2", "chr8"]);
    }
}
