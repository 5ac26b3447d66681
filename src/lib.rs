//! Geohash prefix-tree spatial indexing for inverted indexes.
//!
//! Shapes are decomposed into geohash cells, each tagged with the relation of the shape
//! to the cell, and indexed as terms. Queries cover their own shape the same way and
//! classify every indexed term against it, falling back to exact geometry only where the
//! cells cannot decide.
//!
//! ```rust
//! use geocell::{Config, GeohashTreeStrategy, MemoryIndex, SpatialRelation};
//! use geocell::geometry::{make_point, make_rectangle};
//!
//! let strategy = GeohashTreeStrategy::new(Config::default())?;
//! let mut index = MemoryIndex::new();
//! let square = index.add_document(strategy.create_indexable_fields(&make_rectangle(0.0, 0.0, 1.0, 1.0))?)?;
//! index.add_document(strategy.create_indexable_fields(&make_point(20.0, 20.0))?)?;
//!
//! let hits = strategy
//!     .make_filter(make_rectangle(0.9, 0.9, 1.9, 1.9), SpatialRelation::Intersects)?
//!     .evaluate(&index)?;
//! assert_eq!(hits.iter().collect::<Vec<_>>(), vec![square]);
//! # Ok::<(), geocell::GeoCellError>(())
//! ```

pub mod cell;
pub mod config;
pub mod coverage;
pub mod error;
pub mod filter;
pub mod geocode;
pub mod geometry;
pub mod index;
pub mod strategy;
pub mod trie;
pub mod validation;

pub use cell::Cell;
pub use config::{Config, CoverageConfig, FieldConfig};
pub use coverage::{CellCoverage, CellTokenStream};
pub use error::{GeoCellError, Result};
pub use filter::{FilterStats, SpatialFilter};
pub use geocode::GeoCode;
pub use geometry::ShapeKind;
pub use index::{DocId, IndexableField, MemoryIndex, SpatialIndexReader};
pub use strategy::{ConstantScoreQuery, GeohashTreeStrategy};
pub use trie::{Probe, RelationTrie};

pub use geocell_types::bbox::BoundingBox2D;
pub use geocell_types::relation::SpatialRelation;

pub use geo::{Geometry, Point, Polygon, Rect};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{GeoCellError, GeohashTreeStrategy, Result};

    pub use geo::{Geometry, Point, Polygon, Rect};

    pub use crate::{Config, CoverageConfig, FieldConfig};

    pub use crate::{Cell, CellCoverage, GeoCode, RelationTrie, SpatialRelation};

    pub use crate::{MemoryIndex, SpatialFilter, SpatialIndexReader};

    pub use crate::geometry::{make_point, make_rectangle, read_wkt, to_wkt};
}
