//! Cell coverage: decomposing a geometry into geocode cells tagged with their relation.
//!
//! Points produce one `Within` cell. Lines and areas scan every cell of their bounding
//! rectangle in ordinal (Z-order) order and keep the cells the geometry touches. Area
//! cells that only partially overlap the geometry are refined into their 32 children
//! while the configured maximum precision allows it; the children are emitted depth-first
//! before the outer scan resumes.
//!
//! The coverage is lazy and can be rewound with [`CellCoverage::reset`].
//!
//! ```rust
//! use geocell::{CellCoverage, CoverageConfig, SpatialRelation};
//! use geocell::geometry::make_rectangle;
//!
//! let square = make_rectangle(0.0, 0.0, 1.0, 1.0);
//! let cells: Vec<_> = CellCoverage::new(&square, &CoverageConfig::default())?.collect();
//! assert!(!cells.is_empty());
//! assert!(cells.iter().all(|c| c.precision() == 4));
//! assert!(cells.iter().any(|c| c.relation() == SpatialRelation::Contains));
//! assert!(cells.iter().any(|c| c.relation() == SpatialRelation::Intersects));
//! # Ok::<(), geocell::GeoCellError>(())
//! ```

use crate::cell::Cell;
use crate::config::CoverageConfig;
use crate::error::{GeoCellError, Result};
use crate::geocode::{BASE32_BITS, GeoCode};
use crate::geometry::{ShapeKind, relate_cell};
use crate::validation::validate_geometry;
use bytes::Bytes;
use geo::Geometry;
use geocell_types::bbox::BoundingBox2D;
use geocell_types::relation::SpatialRelation;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::iter::FusedIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoverageState {
    Start,
    ScanningBase,
    InNestedCoverage,
    Done,
}

/// One level of the scan: an inclusive ordinal range at a fixed precision.
#[derive(Debug, Clone, Copy)]
struct ScanFrame {
    characters: usize,
    next: u64,
    last: u64,
}

impl ScanFrame {
    fn bits(&self) -> u8 {
        self.characters as u8 * BASE32_BITS
    }
}

/// Lazy, restartable cell decomposition of one geometry.
#[derive(Debug)]
pub struct CellCoverage<'a> {
    geometry: &'a Geometry,
    kind: ShapeKind,
    bbox: BoundingBox2D,
    config: CoverageConfig,
    state: CoverageState,
    stack: SmallVec<[ScanFrame; 4]>,
    visited: FxHashSet<String>,
}

impl<'a> CellCoverage<'a> {
    /// Bind a coverage to `geometry`.
    ///
    /// Fails on an empty geometry, on coordinates outside the geographic range and on an
    /// invalid precision policy.
    pub fn new(geometry: &'a Geometry, config: &CoverageConfig) -> Result<Self> {
        config.validate()?;
        let bbox = BoundingBox2D::from_geometry(geometry).ok_or_else(|| {
            GeoCellError::InvalidGeometry("cannot cover an empty geometry".to_string())
        })?;
        validate_geometry(geometry)?;

        let kind = ShapeKind::of(geometry);
        log::debug!(
            "Cell coverage for {:?} geometry, precision {}..={}",
            kind,
            Self::start_precision(kind, config),
            Self::finest_precision(kind, config)
        );

        Ok(Self {
            geometry,
            kind,
            bbox,
            config: *config,
            state: CoverageState::Start,
            stack: SmallVec::new(),
            visited: FxHashSet::default(),
        })
    }

    fn start_precision(kind: ShapeKind, config: &CoverageConfig) -> usize {
        match kind {
            ShapeKind::Point => config.point_precision,
            ShapeKind::Line => config.line_precision,
            ShapeKind::Area => config.base_precision,
        }
    }

    fn finest_precision(kind: ShapeKind, config: &CoverageConfig) -> usize {
        match kind {
            ShapeKind::Point => config.point_precision,
            ShapeKind::Line => config.line_precision,
            ShapeKind::Area => config.max_precision,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    /// Precision (in characters) the coverage starts at.
    pub fn precision(&self) -> usize {
        Self::start_precision(self.kind, &self.config)
    }

    /// Finest precision any emitted cell can have.
    pub fn max_precision(&self) -> usize {
        Self::finest_precision(self.kind, &self.config)
    }

    pub fn bounding_box(&self) -> &BoundingBox2D {
        &self.bbox
    }

    pub fn geometry(&self) -> &'a Geometry {
        self.geometry
    }

    /// Rewind to the first cell, dropping nested scans and the visited set.
    pub fn reset(&mut self) {
        self.state = CoverageState::Start;
        self.stack.clear();
        self.visited.clear();
    }

    fn point_cell(&self) -> Option<Cell> {
        let Geometry::Point(point) = self.geometry else {
            return None;
        };
        let characters = self.config.point_precision;
        let code = GeoCode::encode(
            point.y(),
            point.x(),
            characters * usize::from(BASE32_BITS),
        );
        Some(Cell::from_ordinal(
            code.ordinal(),
            characters,
            SpatialRelation::Within,
        ))
    }

    fn base_frame(&self) -> ScanFrame {
        let characters = self.precision();
        let bits = characters * usize::from(BASE32_BITS);
        let bottom_left = GeoCode::encode(self.bbox.min_y(), self.bbox.min_x(), bits);
        let top_right = GeoCode::encode(self.bbox.max_y(), self.bbox.max_x(), bits);
        ScanFrame {
            characters,
            next: bottom_left.ordinal(),
            last: top_right.ordinal(),
        }
    }

    /// Next ordinal worth visiting after `ordinal`, whose cell misses the bounding box.
    ///
    /// Skips the whole subtree of the coarsest ancestor that also misses it.
    fn skip_outside(&self, ordinal: u64, bits: u8) -> u64 {
        for depth in 1..=bits {
            let shift = bits - depth;
            let prefix = ordinal >> shift;
            let ancestor = GeoCode::from_ordinal_bits(prefix, depth);
            if !ancestor.bounding_box().intersects(&self.bbox) {
                return (prefix + 1) << shift;
            }
        }
        ordinal + 1
    }

    fn is_needed(&self, relation: SpatialRelation, characters: usize) -> bool {
        match relation {
            SpatialRelation::Contains => true,
            SpatialRelation::Intersects => characters == self.max_precision(),
            _ => false,
        }
    }

    fn scan(&mut self) -> Option<Cell> {
        loop {
            let Some(frame) = self.stack.last_mut() else {
                self.state = CoverageState::Done;
                return None;
            };
            if frame.next > frame.last {
                self.stack.pop();
                self.state = match self.stack.len() {
                    0 => CoverageState::Done,
                    1 => CoverageState::ScanningBase,
                    _ => CoverageState::InNestedCoverage,
                };
                continue;
            }

            let ordinal = frame.next;
            let characters = frame.characters;
            let bits = frame.bits();
            let code = GeoCode::from_ordinal_bits(ordinal, bits);

            if !code.bounding_box().intersects(&self.bbox) {
                let next = self.skip_outside(ordinal, bits);
                if let Some(frame) = self.stack.last_mut() {
                    frame.next = next;
                }
                continue;
            }
            frame.next = ordinal + 1;

            let relation = relate_cell(self.geometry, code.bounding_box());
            log::trace!("cell {} at precision {}: {}", ordinal, characters, relation);

            if self.kind == ShapeKind::Area
                && relation == SpatialRelation::Intersects
                && characters < self.config.max_precision
            {
                let children = ordinal << BASE32_BITS;
                self.stack.push(ScanFrame {
                    characters: characters + 1,
                    next: children,
                    last: children | 0x1f,
                });
                self.state = CoverageState::InNestedCoverage;
                continue;
            }

            if self.is_needed(relation, characters) {
                let cell = Cell::from_ordinal(ordinal, characters, relation);
                if self.visited.insert(cell.token().to_string()) {
                    return Some(cell);
                }
            }
        }
    }
}

impl Iterator for CellCoverage<'_> {
    type Item = Cell;

    fn next(&mut self) -> Option<Cell> {
        match self.state {
            CoverageState::Done => None,
            CoverageState::Start => {
                if self.kind == ShapeKind::Point {
                    self.state = CoverageState::Done;
                    return self.point_cell();
                }
                let frame = self.base_frame();
                self.stack.push(frame);
                self.state = CoverageState::ScanningBase;
                self.scan()
            }
            CoverageState::ScanningBase | CoverageState::InNestedCoverage => self.scan(),
        }
    }
}

impl FusedIterator for CellCoverage<'_> {}

/// Index terms (token bytes followed by the relation byte) of a coverage.
#[derive(Debug)]
pub struct CellTokenStream<'a> {
    coverage: CellCoverage<'a>,
}

impl<'a> CellTokenStream<'a> {
    pub fn new(coverage: CellCoverage<'a>) -> Self {
        Self { coverage }
    }

    pub fn reset(&mut self) {
        self.coverage.reset();
    }

    pub fn into_inner(self) -> CellCoverage<'a> {
        self.coverage
    }
}

impl Iterator for CellTokenStream<'_> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        self.coverage.next().map(|cell| cell.to_term())
    }
}

impl FusedIterator for CellTokenStream<'_> {}
