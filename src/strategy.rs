//! Geohash prefix-tree strategy: what gets indexed for a shape and how it is queried.

use crate::config::Config;
use crate::coverage::{CellCoverage, CellTokenStream};
use crate::error::{GeoCellError, Result};
use crate::filter::SpatialFilter;
use crate::geometry::to_wkt;
use crate::index::{DocId, IndexableField, SpatialIndexReader};
use geo::{Geometry, Point};
use geocell_types::relation::SpatialRelation;

/// Indexes shapes as geohash cell terms plus a stored WKT copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeohashTreeStrategy {
    config: Config,
}

impl GeohashTreeStrategy {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Name of the cell term field.
    pub fn field_name(&self) -> &str {
        &self.config.fields.cell_field
    }

    pub fn coverage<'a>(&self, shape: &'a Geometry) -> Result<CellCoverage<'a>> {
        CellCoverage::new(shape, &self.config.coverage)
    }

    /// Lazy stream of the terms indexed for `shape`.
    pub fn cell_token_stream<'a>(&self, shape: &'a Geometry) -> Result<CellTokenStream<'a>> {
        Ok(CellTokenStream::new(self.coverage(shape)?))
    }

    /// The cell term field and the stored shape field for one document.
    pub fn create_indexable_fields(&self, shape: &Geometry) -> Result<[IndexableField; 2]> {
        let terms = self.cell_token_stream(shape)?.collect();
        Ok([
            IndexableField::CellTerms {
                field: self.config.fields.cell_field.clone(),
                terms,
            },
            IndexableField::StoredShape {
                field: self.config.fields.shape_field.clone(),
                wkt: to_wkt(shape),
            },
        ])
    }

    pub fn make_filter(&self, query: Geometry, relation: SpatialRelation) -> Result<SpatialFilter> {
        SpatialFilter::new(query, relation, &self.config)
    }

    pub fn make_query(
        &self,
        query: Geometry,
        relation: SpatialRelation,
    ) -> Result<ConstantScoreQuery> {
        Ok(ConstantScoreQuery::new(self.make_filter(query, relation)?))
    }

    /// Distance ranking is not provided by this strategy.
    pub fn make_distance_value_source(&self, _origin: &Point) -> Result<()> {
        Err(GeoCellError::Unsupported(
            "distance value sources are not supported by the geohash tree strategy".to_string(),
        ))
    }
}

/// Scores every document matched by a filter with the same boost.
#[derive(Debug, PartialEq)]
pub struct ConstantScoreQuery {
    filter: SpatialFilter,
    boost: f32,
}

impl ConstantScoreQuery {
    pub fn new(filter: SpatialFilter) -> Self {
        Self { filter, boost: 1.0 }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn filter(&self) -> &SpatialFilter {
        &self.filter
    }

    pub fn boost(&self) -> f32 {
        self.boost
    }

    /// Matching documents in id order, each scored with the boost.
    pub fn execute<R>(&self, reader: &R) -> Result<Vec<(DocId, f32)>>
    where
        R: SpatialIndexReader + ?Sized,
    {
        Ok(self
            .filter
            .evaluate(reader)?
            .iter()
            .map(|doc| (doc, self.boost))
            .collect())
    }
}
