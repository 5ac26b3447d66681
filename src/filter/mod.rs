//! Relation filters: which indexed shapes stand in a relation to a query shape.
//!
//! A filter covers the query with cells, indexes them in a [`RelationTrie`] and then
//! makes one pass over the cell terms of the index. Each term is collected wholesale,
//! refined document by document against the stored shape, or skipped, following the
//! tables in [`rules`]. A document is refined at most once per evaluation.
//!
//! | relation | documents returned |
//! |---|---|
//! | `Within` | shapes inside the query |
//! | `Intersects` | shapes sharing at least one point with the query |
//! | `Contains` | shapes enclosing the query |
//! | `Disjoint` | shapes with no point in common with the query |

pub mod memo;
pub mod rules;

use crate::config::{Config, FieldConfig};
use crate::coverage::CellCoverage;
use crate::error::{GeoCellError, Result};
use crate::geometry::{read_wkt, satisfies};
use crate::index::{DocId, SpatialIndexReader};
use crate::trie::RelationTrie;
use crate::cell::split_term;
use bytes::Bytes;
use geo::Geometry;
use geocell_types::relation::SpatialRelation;
use memo::{RefinementMemo, Verdict};
use roaring::RoaringBitmap;
use rules::TermAction;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters describing one filter evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FilterStats {
    pub terms_visited: usize,
    pub terms_collected: usize,
    pub terms_refined: usize,
    pub terms_skipped: usize,
    pub terms_rejected: usize,
    /// Exact shape checks performed
    pub refinements: usize,
    pub documents_matched: u64,
}

#[derive(Debug, Default)]
struct Counters {
    visited: AtomicUsize,
    collected: AtomicUsize,
    refined: AtomicUsize,
    skipped: AtomicUsize,
    rejected: AtomicUsize,
}

impl Counters {
    fn record(&self, action: TermAction) {
        let counter = match action {
            TermAction::Collect => &self.collected,
            TermAction::Refine => &self.refined,
            TermAction::Skip => &self.skipped,
            TermAction::Reject => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, memo: &RefinementMemo, matched: &RoaringBitmap) -> FilterStats {
        FilterStats {
            terms_visited: self.visited.load(Ordering::Relaxed),
            terms_collected: self.collected.load(Ordering::Relaxed),
            terms_refined: self.refined.load(Ordering::Relaxed),
            terms_skipped: self.skipped.load(Ordering::Relaxed),
            terms_rejected: self.rejected.load(Ordering::Relaxed),
            refinements: memo.checks(),
            documents_matched: matched.len(),
        }
    }
}

/// Documents gathered from a subset of terms.
#[derive(Debug, Default)]
struct Partial {
    /// Proven matches
    matched: RoaringBitmap,
    /// Documents with a cell inside the query (within only)
    inside: RoaringBitmap,
    /// Documents with an undecided cell (within only)
    ambiguous: RoaringBitmap,
    /// Documents with a cell outside the query (within only)
    rejected: RoaringBitmap,
}

impl Partial {
    fn merge(mut self, other: Partial) -> Partial {
        self.matched |= other.matched;
        self.inside |= other.inside;
        self.ambiguous |= other.ambiguous;
        self.rejected |= other.rejected;
        self
    }
}

/// A query shape and the relation indexed shapes must have to it.
///
/// ```rust
/// use geocell::{Config, GeohashTreeStrategy, MemoryIndex, SpatialFilter, SpatialRelation};
/// use geocell::geometry::{make_point, make_rectangle};
///
/// let strategy = GeohashTreeStrategy::new(Config::default())?;
/// let mut index = MemoryIndex::new();
/// let doc = index.add_document(strategy.create_indexable_fields(&make_rectangle(0.0, 0.0, 1.0, 1.0))?)?;
///
/// let filter = SpatialFilter::new(make_point(0.5, 0.5), SpatialRelation::Contains, strategy.config())?;
/// assert!(filter.evaluate(&index)?.contains(doc));
/// # Ok::<(), geocell::GeoCellError>(())
/// ```
pub struct SpatialFilter {
    query: Geometry,
    relation: SpatialRelation,
    trie: RelationTrie,
    fields: FieldConfig,
    deadline: Option<Instant>,
}

impl SpatialFilter {
    /// Cover `query` and build its trie.
    pub fn new(query: Geometry, relation: SpatialRelation, config: &Config) -> Result<Self> {
        config.validate()?;
        let trie = RelationTrie::from_coverage(CellCoverage::new(&query, &config.coverage)?)?;
        Ok(Self {
            query,
            relation,
            trie,
            fields: config.fields.clone(),
            deadline: None,
        })
    }

    /// Fail evaluations still running at `deadline`. Checked between terms.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn query(&self) -> &Geometry {
        &self.query
    }

    pub fn relation(&self) -> SpatialRelation {
        self.relation
    }

    pub fn trie(&self) -> &RelationTrie {
        &self.trie
    }

    pub fn fields(&self) -> &FieldConfig {
        &self.fields
    }

    /// Matching live documents.
    pub fn evaluate<R>(&self, reader: &R) -> Result<RoaringBitmap>
    where
        R: SpatialIndexReader + ?Sized,
    {
        self.evaluate_with_stats(reader).map(|(docs, _)| docs)
    }

    pub fn evaluate_with_stats<R>(&self, reader: &R) -> Result<(RoaringBitmap, FilterStats)>
    where
        R: SpatialIndexReader + ?Sized,
    {
        let memo = RefinementMemo::new();
        let counters = Counters::default();
        let terms: Vec<Bytes> = reader.terms(&self.fields.cell_field)?.collect();

        let partial = self.scan_terms(reader, &terms, &memo, &counters)?;

        let matched = match self.relation {
            SpatialRelation::Within => self.resolve_within(reader, partial, &memo)?,
            SpatialRelation::Intersects | SpatialRelation::Contains => partial.matched,
            SpatialRelation::Disjoint => {
                let mut docs = reader.docs_with_field(&self.fields.shape_field)?;
                docs -= &partial.matched;
                docs -= &memo.unreadable();
                docs
            }
        };

        let stats = counters.snapshot(&memo, &matched);
        log::debug!(
            "{} filter: {} terms ({} collected, {} refined, {} skipped, {} rejected), {} refinements, {} matches",
            self.relation,
            stats.terms_visited,
            stats.terms_collected,
            stats.terms_refined,
            stats.terms_skipped,
            stats.terms_rejected,
            stats.refinements,
            stats.documents_matched
        );
        Ok((matched, stats))
    }

    #[cfg(not(feature = "parallel"))]
    fn scan_terms<R>(
        &self,
        reader: &R,
        terms: &[Bytes],
        memo: &RefinementMemo,
        counters: &Counters,
    ) -> Result<Partial>
    where
        R: SpatialIndexReader + ?Sized,
    {
        terms.iter().try_fold(Partial::default(), |acc, term| {
            self.check_deadline()?;
            Ok(acc.merge(self.process_term(reader, term, memo, counters)?))
        })
    }

    #[cfg(feature = "parallel")]
    fn scan_terms<R>(
        &self,
        reader: &R,
        terms: &[Bytes],
        memo: &RefinementMemo,
        counters: &Counters,
    ) -> Result<Partial>
    where
        R: SpatialIndexReader + ?Sized,
    {
        use rayon::prelude::*;

        terms
            .par_iter()
            .map(|term| {
                self.check_deadline()?;
                self.process_term(reader, term, memo, counters)
            })
            .try_reduce(Partial::default, |a, b| Ok(a.merge(b)))
    }

    fn check_deadline(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(GeoCellError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    fn process_term<R>(
        &self,
        reader: &R,
        term: &[u8],
        memo: &RefinementMemo,
        counters: &Counters,
    ) -> Result<Partial>
    where
        R: SpatialIndexReader + ?Sized,
    {
        counters.visited.fetch_add(1, Ordering::Relaxed);
        let mut partial = Partial::default();

        let signals = split_term(term).and_then(|(token, cell)| {
            rules::query_relation(&self.trie, &self.query, token).map(|query| (cell, query))
        });
        let (cell, query) = match signals {
            Ok(signals) => signals,
            Err(e) => {
                log::warn!(
                    "Skipping malformed cell term {:?}: {}",
                    String::from_utf8_lossy(term),
                    e
                );
                counters.record(TermAction::Skip);
                return Ok(partial);
            }
        };

        let action = rules::action(self.relation, cell, query);
        log::trace!(
            "term {}: cell {}, query {}, {:?}",
            String::from_utf8_lossy(term),
            cell,
            query,
            action
        );
        counters.record(action);

        if action == TermAction::Skip {
            return Ok(partial);
        }
        let docs = reader.postings(&self.fields.cell_field, term)?;

        match (self.relation, action) {
            (SpatialRelation::Within, TermAction::Collect) => partial.inside = docs,
            (SpatialRelation::Within, TermAction::Refine) => partial.ambiguous = docs,
            (SpatialRelation::Within, TermAction::Reject) => partial.rejected = docs,
            (_, TermAction::Collect) => partial.matched = docs,
            (_, TermAction::Refine) => {
                let target = self.refinement_target();
                for doc in &docs {
                    if memo.resolve(doc, || self.refine(reader, doc, target)) == Verdict::Match {
                        partial.matched.insert(doc);
                    }
                }
            }
            (_, TermAction::Reject) | (_, TermAction::Skip) => {}
        }
        Ok(partial)
    }

    /// Documents with every cell proven inside are accepted, documents with any cell
    /// outside are dropped, the rest are checked once.
    fn resolve_within<R>(
        &self,
        reader: &R,
        partial: Partial,
        memo: &RefinementMemo,
    ) -> Result<RoaringBitmap>
    where
        R: SpatialIndexReader + ?Sized,
    {
        let mut matched = &partial.inside - &partial.ambiguous;
        matched -= &partial.rejected;

        let undecided = &partial.ambiguous - &partial.rejected;
        self.check_deadline()?;
        for doc in &undecided {
            if memo.resolve(doc, || self.refine(reader, doc, SpatialRelation::Within))
                == Verdict::Match
            {
                matched.insert(doc);
            }
        }
        Ok(matched)
    }

    fn refinement_target(&self) -> SpatialRelation {
        match self.relation {
            SpatialRelation::Disjoint => SpatialRelation::Intersects,
            relation => relation,
        }
    }

    /// Exact check of the stored shape of `doc`.
    fn refine<R>(&self, reader: &R, doc: DocId, target: SpatialRelation) -> Verdict
    where
        R: SpatialIndexReader + ?Sized,
    {
        let text = match reader.stored_value(doc, &self.fields.shape_field) {
            Ok(Some(text)) => text,
            Ok(None) => {
                log::warn!(
                    "Document {} has no stored value in {}; excluded",
                    doc,
                    self.fields.shape_field
                );
                return Verdict::Unreadable;
            }
            Err(e) => {
                log::warn!("Failed to load shape of document {}: {}; excluded", doc, e);
                return Verdict::Unreadable;
            }
        };
        match read_wkt(&text) {
            Ok(shape) if satisfies(&shape, target, &self.query) => Verdict::Match,
            Ok(_) => Verdict::NoMatch,
            Err(e) => {
                log::warn!("Failed to parse shape of document {}: {}; excluded", doc, e);
                Verdict::Unreadable
            }
        }
    }
}

/// Filters are equal when they select by the same relation to the same shape.
impl PartialEq for SpatialFilter {
    fn eq(&self, other: &Self) -> bool {
        self.relation == other.relation && self.query == other.query
    }
}

impl fmt::Debug for SpatialFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialFilter")
            .field("relation", &self.relation)
            .field("query", &self.query)
            .field("cells", &self.trie.len())
            .field("fields", &self.fields)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl fmt::Display for SpatialFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.relation, crate::geometry::to_wkt(&self.query))
    }
}
