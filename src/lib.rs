//! refloci: genomic locus algebra and persistent reference collections.
//!
//! This library models genomic coordinates ("loci") on chromosomes and
//! provides algebraic operations over them (overlap, containment,
//! distance, merging), plus [`RefLoci`]: a named, freezable, indexed
//! collection of loci supporting fast overlap and proximity queries
//! across process restarts.
//!
//! # Features
//!
//! - **Half-open interval algebra**: unambiguous adjacency and length
//!   arithmetic, strand-aware when asked
//! - **Sub-linear queries**: per-chromosome sorted indexes with bounded
//!   scans, built in parallel for large collections
//! - **Durable snapshots**: atomic freeze/load through a pluggable
//!   [`SnapshotStore`]
//!
//! # Example
//!
//! ```rust
//! use refloci::prelude::*;
//!
//! let store = MemoryStore::new();
//!
//! let mut genes = RefLoci::new("demo_genes").unwrap();
//! genes.insert(Locus::new("chr8", 100, 150).unwrap()).unwrap();
//! genes.insert(Locus::new("chr8", 160, 175).unwrap()).unwrap();
//! genes.freeze(&store, false).unwrap();
//!
//! // Later (or in another process): rehydrate and query
//! let genes = RefLoci::load(&store, "demo_genes").unwrap();
//! let query = Interval::new(140, 170).unwrap();
//! assert_eq!(genes.query_overlap("chr8", &query).len(), 2);
//! ```

pub mod error;
pub mod index;
pub mod interval;
pub mod locus;
pub mod refloci;
pub mod store;

// Re-export commonly used types
pub use error::{LociError, Result};
pub use index::{Direction, LocusId, LocusIndex};
pub use interval::Interval;
pub use locus::{Distance, FeatureKind, Locus, Strand, StrandPolicy};
pub use refloci::{CollectionState, RefLoci};
pub use store::{FsStore, MemoryStore, SnapshotStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{LociError, Result};
    pub use crate::index::{Direction, LocusId, LocusIndex};
    pub use crate::interval::Interval;
    pub use crate::locus::{Distance, FeatureKind, Locus, Strand, StrandPolicy};
    pub use crate::refloci::{CollectionState, RefLoci};
    pub use crate::store::{FsStore, MemoryStore, SnapshotStore};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_basic_workflow() {
        use crate::locus::Locus;
        use crate::refloci::RefLoci;
        use crate::store::MemoryStore;

        let store = MemoryStore::new();
        let loci = vec![
            Locus::new("chr1", 100, 200).unwrap(),
            Locus::new("chr1", 150, 250).unwrap(),
            Locus::new("chr2", 300, 400).unwrap(),
        ];

        let mut collection = RefLoci::from_loci("workflow", loci).unwrap();
        collection.freeze(&store, false).unwrap();

        let loaded = RefLoci::load(&store, "workflow").unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(RefLoci::list_names(&store).unwrap(), vec!["workflow"]);
    }
}
