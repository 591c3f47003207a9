//! Named, typed genomic coordinates and their relational algebra.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{LociError, Result};
use crate::interval::Interval;

/// Strand orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Strand {
    Forward,
    Reverse,
    #[default]
    Unknown,
}

impl Strand {
    pub fn from_char(c: char) -> Self {
        match c {
            '+' => Strand::Forward,
            '-' => Strand::Reverse,
            _ => Strand::Unknown,
        }
    }

    /// The strand shared by both inputs, or `Unknown` when they disagree.
    pub fn common(self, other: Strand) -> Strand {
        if self == other {
            self
        } else {
            Strand::Unknown
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
            Strand::Unknown => write!(f, "."),
        }
    }
}

/// Closed set of feature kinds a locus can be tagged with.
///
/// Callers branch on the kind where feature-specific behavior is needed;
/// feature-specific data goes in the locus attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FeatureKind {
    #[default]
    Region,
    Gene,
    Snp,
    Window,
}

/// Distance between two loci. Loci on different chromosomes are
/// infinitely far apart rather than incomparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distance {
    Bp(u64),
    Infinite,
}

impl Distance {
    pub fn is_infinite(&self) -> bool {
        matches!(self, Distance::Infinite)
    }

    /// The finite base-pair distance, if any.
    pub fn bp(&self) -> Option<u64> {
        match self {
            Distance::Bp(d) => Some(*d),
            Distance::Infinite => None,
        }
    }
}

impl Ord for Distance {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Distance::Bp(a), Distance::Bp(b)) => a.cmp(b),
            (Distance::Bp(_), Distance::Infinite) => Ordering::Less,
            (Distance::Infinite, Distance::Bp(_)) => Ordering::Greater,
            (Distance::Infinite, Distance::Infinite) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Bp(d) => write!(f, "{}", d),
            Distance::Infinite => write!(f, "inf"),
        }
    }
}

/// Controls strand sensitivity of the relational operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrandPolicy {
    /// When set, loci on strictly opposite strands never overlap or
    /// contain each other. `Unknown` is compatible with anything.
    pub strand_specific: bool,
}

impl StrandPolicy {
    pub fn strand_specific() -> Self {
        Self {
            strand_specific: true,
        }
    }

    fn compatible(&self, a: Strand, b: Strand) -> bool {
        if !self.strand_specific {
            return true;
        }
        !matches!(
            (a, b),
            (Strand::Forward, Strand::Reverse) | (Strand::Reverse, Strand::Forward)
        )
    }
}

/// A genomic coordinate: a chromosome, a half-open interval, and
/// optionally a strand, a name, a feature kind, key/value attributes,
/// and component subloci (for composites produced by [`Locus::merge`]).
///
/// Equality and ordering consider only chromosome, interval bounds, and
/// strand, so the same feature loaded twice compares equal regardless of
/// provenance (names, attributes, kind and subloci are excluded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locus {
    chromosome: String,
    interval: Interval,
    strand: Strand,
    kind: FeatureKind,
    name: Option<String>,
    attrs: BTreeMap<String, String>,
    subloci: Vec<Locus>,
}

impl Locus {
    /// Create a new locus on `chromosome` spanning `[start, end)`.
    pub fn new(chromosome: impl Into<String>, start: u64, end: u64) -> Result<Self> {
        let chromosome = chromosome.into();
        if chromosome.is_empty() {
            return Err(LociError::InvalidLocus(
                "chromosome must be non-empty".to_string(),
            ));
        }
        Ok(Self {
            chromosome,
            interval: Interval::new(start, end)?,
            strand: Strand::Unknown,
            kind: FeatureKind::Region,
            name: None,
            attrs: BTreeMap::new(),
            subloci: Vec::new(),
        })
    }

    pub fn with_strand(mut self, strand: Strand) -> Self {
        self.strand = strand;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_kind(mut self, kind: FeatureKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn with_sublocus(mut self, sublocus: Locus) -> Self {
        self.subloci.push(sublocus);
        self
    }

    // --- accessors ---

    #[inline]
    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    #[inline]
    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.interval.start()
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.interval.end()
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.interval.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.interval.is_empty()
    }

    #[inline]
    pub fn strand(&self) -> Strand {
        self.strand
    }

    #[inline]
    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    /// Look up an attribute value by key.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    /// Component loci of a composite; empty for simple loci.
    pub fn subloci(&self) -> &[Locus] {
        &self.subloci
    }

    pub fn is_composite(&self) -> bool {
        !self.subloci.is_empty()
    }

    pub fn add_sublocus(&mut self, sublocus: Locus) {
        self.subloci.push(sublocus);
    }

    // --- relational algebra ---

    /// Check overlap, strand-insensitive. Loci on different chromosomes
    /// never overlap.
    #[inline]
    pub fn overlaps(&self, other: &Locus) -> bool {
        self.overlaps_with(other, StrandPolicy::default())
    }

    /// Check overlap under an explicit strand policy.
    pub fn overlaps_with(&self, other: &Locus, policy: StrandPolicy) -> bool {
        self.chromosome == other.chromosome
            && policy.compatible(self.strand, other.strand)
            && self.interval.overlaps(&other.interval)
    }

    /// Check containment, strand-insensitive. Always false across
    /// chromosomes.
    #[inline]
    pub fn contains(&self, other: &Locus) -> bool {
        self.contains_with(other, StrandPolicy::default())
    }

    /// Check containment under an explicit strand policy.
    pub fn contains_with(&self, other: &Locus, policy: StrandPolicy) -> bool {
        self.chromosome == other.chromosome
            && policy.compatible(self.strand, other.strand)
            && self.interval.contains(&other.interval)
    }

    /// Gap between two loci: zero when overlapping, [`Distance::Infinite`]
    /// across chromosomes.
    pub fn distance(&self, other: &Locus) -> Distance {
        if self.chromosome != other.chromosome {
            return Distance::Infinite;
        }
        Distance::Bp(self.interval.distance(&other.interval))
    }

    /// Midpoint of the locus.
    pub fn center(&self) -> f64 {
        (self.start() as f64 + self.end() as f64) / 2.0
    }

    /// Distance between locus midpoints, rounded down.
    pub fn center_distance(&self, other: &Locus) -> Distance {
        if self.chromosome != other.chromosome {
            return Distance::Infinite;
        }
        Distance::Bp((self.center() - other.center()).abs().floor() as u64)
    }

    /// A position `distance` bp 5' of the locus, saturating at the
    /// chromosome origin. `Unknown` strand is treated as forward.
    pub fn upstream(&self, distance: u64) -> u64 {
        match self.strand {
            Strand::Reverse => self.end().saturating_add(distance),
            _ => self.start().saturating_sub(distance),
        }
    }

    /// A position `distance` bp 3' of the locus.
    pub fn downstream(&self, distance: u64) -> u64 {
        match self.strand {
            Strand::Reverse => self.start().saturating_sub(distance),
            _ => self.end().saturating_add(distance),
        }
    }

    // --- composition ---

    /// Merge with another locus into a composite spanning both.
    ///
    /// The result's interval is the minimal bounding interval, its strand
    /// is the common strand (or `Unknown` on disagreement), and its
    /// subloci are the inputs themselves. A composite input contributes
    /// its subloci instead of itself, so repeated merges stay one level
    /// deep. Fails when chromosomes differ.
    pub fn merge(&self, other: &Locus) -> Result<Locus> {
        Locus::merge_all([self, other])
    }

    /// Merge any number of loci into one composite. Fails on an empty
    /// input or mismatched chromosomes.
    pub fn merge_all<'a, I>(loci: I) -> Result<Locus>
    where
        I: IntoIterator<Item = &'a Locus>,
    {
        let mut iter = loci.into_iter();
        let first = iter.next().ok_or_else(|| {
            LociError::InvalidLocus("merge requires at least one locus".to_string())
        })?;

        let mut span = first.interval;
        let mut strand = first.strand;
        let mut subloci = Vec::new();
        Self::flatten_into(first, &mut subloci);

        for locus in iter {
            if locus.chromosome != first.chromosome {
                return Err(LociError::ChromosomeMismatch {
                    a: first.chromosome.clone(),
                    b: locus.chromosome.clone(),
                });
            }
            span = span.span(&locus.interval);
            strand = strand.common(locus.strand);
            Self::flatten_into(locus, &mut subloci);
        }

        Ok(Locus {
            chromosome: first.chromosome.clone(),
            interval: span,
            strand,
            kind: FeatureKind::Region,
            name: None,
            attrs: BTreeMap::new(),
            subloci,
        })
    }

    fn flatten_into(locus: &Locus, out: &mut Vec<Locus>) {
        if locus.is_composite() {
            out.extend(locus.subloci.iter().cloned());
        } else {
            out.push(locus.clone());
        }
    }
}

impl PartialEq for Locus {
    fn eq(&self, other: &Self) -> bool {
        self.chromosome == other.chromosome
            && self.interval == other.interval
            && self.strand == other.strand
    }
}

impl Eq for Locus {}

impl Hash for Locus {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chromosome.hash(state);
        self.interval.hash(state);
        self.strand.hash(state);
    }
}

impl Ord for Locus {
    /// Total order: chromosome (lexicographic), then start, then end,
    /// then strand.
    fn cmp(&self, other: &Self) -> Ordering {
        self.chromosome
            .cmp(&other.chromosome)
            .then_with(|| self.interval.cmp(&other.interval))
            .then_with(|| self.strand.cmp(&other.strand))
    }
}

impl PartialOrd for Locus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} ({})",
            self.chromosome, self.interval, self.strand
        )
    }
}
