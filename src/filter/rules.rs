//! Per-term decisions.
//!
//! Every index term carries two signals: the relation of the indexed shape to the cell
//! (stored in the term) and the relation of the query to the same cell (looked up in the
//! query's trie). Each target relation maps the pair to an action.

use crate::error::{GeoCellError, Result};
use crate::geocode::GeoCode;
use crate::geometry::relate_cell;
use crate::trie::{Probe, RelationTrie};
use geo::Geometry;
use geocell_types::relation::SpatialRelation;

/// What to do with the documents posted under one term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermAction {
    /// The cell signals alone prove the target relation.
    Collect,
    /// Check each document's stored shape.
    Refine,
    /// The term cannot contribute.
    Skip,
    /// The cell signals alone disprove the target relation for every posted document.
    Reject,
}

/// `doc intersects query`.
pub fn intersects_action(cell: SpatialRelation, query: SpatialRelation) -> TermAction {
    match query {
        SpatialRelation::Contains => TermAction::Collect,
        SpatialRelation::Intersects | SpatialRelation::Within => {
            if cell == SpatialRelation::Contains {
                TermAction::Collect
            } else {
                TermAction::Refine
            }
        }
        SpatialRelation::Disjoint => TermAction::Skip,
    }
}

/// `doc contains query`: collected only when the query lies in a cell the document covers.
pub fn contains_action(cell: SpatialRelation, query: SpatialRelation) -> TermAction {
    match (cell, query) {
        (_, SpatialRelation::Disjoint) => TermAction::Skip,
        (SpatialRelation::Contains, SpatialRelation::Within) => TermAction::Collect,
        _ => TermAction::Refine,
    }
}

/// `doc within query`, decided per cell and aggregated per document by the caller.
pub fn within_action(_cell: SpatialRelation, query: SpatialRelation) -> TermAction {
    match query {
        SpatialRelation::Contains => TermAction::Collect,
        SpatialRelation::Disjoint => TermAction::Reject,
        SpatialRelation::Intersects | SpatialRelation::Within => TermAction::Refine,
    }
}

/// Action table for `target`; `Disjoint` is evaluated as the complement of `Intersects`.
pub fn action(
    target: SpatialRelation,
    cell: SpatialRelation,
    query: SpatialRelation,
) -> TermAction {
    match target {
        SpatialRelation::Within => within_action(cell, query),
        SpatialRelation::Intersects | SpatialRelation::Disjoint => intersects_action(cell, query),
        SpatialRelation::Contains => contains_action(cell, query),
    }
}

/// Relation of the query to the cell named by `token`.
///
/// A trie node at the token's own depth, or a `Contains` ancestor, answers directly. A
/// coarser `Intersects` or `Within` ancestor says nothing about this finer cell, so the
/// cell rectangle is tested against the query. A token above the query's cells is
/// `Within` when every query cell lies beneath it and `Intersects` otherwise.
pub fn query_relation(
    trie: &RelationTrie,
    query: &Geometry,
    token: &[u8],
) -> Result<SpatialRelation> {
    Ok(match trie.probe(token) {
        Probe::Matched { relation, depth }
            if depth == token.len() || relation == SpatialRelation::Contains =>
        {
            relation
        }
        Probe::Matched { .. } => {
            let token = std::str::from_utf8(token)
                .map_err(|e| GeoCellError::InvalidTerm(e.to_string()))?;
            let code = GeoCode::from_base32(token)?;
            relate_cell(query, code.bounding_box())
        }
        Probe::Covering { all: true } => SpatialRelation::Within,
        Probe::Covering { all: false } => SpatialRelation::Intersects,
        Probe::Missed => SpatialRelation::Disjoint,
    })
}
