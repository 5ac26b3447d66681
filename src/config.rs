//! Configuration for coverage precision and index field names.
//!
//! Precisions are expressed in geocode characters (5 bits each, at most 12).
use crate::error::{GeoCellError, Result};
use serde::de::Error;

/// Largest precision a base-32 token can express within 64 bits.
pub const MAX_CHARACTER_PRECISION: usize = 12;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub coverage: CoverageConfig,

    #[serde(default)]
    pub fields: FieldConfig,
}

/// Precision policy used when a geometry is decomposed into cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoverageConfig {
    /// Precision of the single cell emitted for a point
    #[serde(default = "CoverageConfig::default_point_precision")]
    pub point_precision: usize,

    /// Fixed precision used to cover lines
    #[serde(default = "CoverageConfig::default_line_precision")]
    pub line_precision: usize,

    /// Precision at which area coverage starts scanning
    #[serde(default = "CoverageConfig::default_base_precision")]
    pub base_precision: usize,

    /// Finest precision ambiguous area cells are refined to
    #[serde(default = "CoverageConfig::default_max_precision")]
    pub max_precision: usize,
}

impl CoverageConfig {
    const fn default_point_precision() -> usize {
        12
    }

    const fn default_line_precision() -> usize {
        4
    }

    const fn default_base_precision() -> usize {
        4
    }

    const fn default_max_precision() -> usize {
        4
    }

    pub fn with_point_precision(mut self, precision: usize) -> Self {
        self.point_precision = precision;
        self
    }

    pub fn with_line_precision(mut self, precision: usize) -> Self {
        self.line_precision = precision;
        self
    }

    /// Enable adaptive refinement of area cells from `base` down to `max` characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use geocell::CoverageConfig;
    ///
    /// let config = CoverageConfig::default().multi_resolution(3, 5);
    /// assert!(config.validate().is_ok());
    /// assert!(config.is_multi_resolution());
    /// ```
    pub fn multi_resolution(mut self, base: usize, max: usize) -> Self {
        if max > 8 {
            log::warn!(
                "Area precision of {} characters produces very fine coverages; \
                a single polygon may expand to millions of cells",
                max
            );
        }
        self.base_precision = base;
        self.max_precision = max;
        self
    }

    pub fn is_multi_resolution(&self) -> bool {
        self.base_precision < self.max_precision
    }

    pub fn validate(&self) -> Result<()> {
        let check = |name: &str, value: usize| {
            if (1..=MAX_CHARACTER_PRECISION).contains(&value) {
                Ok(())
            } else {
                Err(GeoCellError::Config(format!(
                    "{} must be between 1 and {}, got {}",
                    name, MAX_CHARACTER_PRECISION, value
                )))
            }
        };
        check("point_precision", self.point_precision)?;
        check("line_precision", self.line_precision)?;
        check("base_precision", self.base_precision)?;
        check("max_precision", self.max_precision)?;

        if self.base_precision > self.max_precision {
            return Err(GeoCellError::Config(format!(
                "base_precision ({}) must not exceed max_precision ({})",
                self.base_precision, self.max_precision
            )));
        }
        if self.point_precision < self.max_precision {
            return Err(GeoCellError::Config(format!(
                "point_precision ({}) must be at least max_precision ({})",
                self.point_precision, self.max_precision
            )));
        }
        Ok(())
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            point_precision: Self::default_point_precision(),
            line_precision: Self::default_line_precision(),
            base_precision: Self::default_base_precision(),
            max_precision: Self::default_max_precision(),
        }
    }
}

/// Names of the two cooperating index fields.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    /// Tokenized field holding one term per cell
    #[serde(default = "FieldConfig::default_cell_field")]
    pub cell_field: String,

    /// Stored field holding the WKT serialization of the shape
    #[serde(default = "FieldConfig::default_shape_field")]
    pub shape_field: String,
}

impl FieldConfig {
    pub const FIELD_PREFIX: &'static str = "_______SHAPE";

    fn default_cell_field() -> String {
        format!("{}___CELL___", Self::FIELD_PREFIX)
    }

    fn default_shape_field() -> String {
        format!("{}___WKT___", Self::FIELD_PREFIX)
    }

    /// Derive both field names from a user-facing field name.
    pub fn for_field(name: &str) -> Self {
        Self {
            cell_field: format!("{}___CELL___", name),
            shape_field: format!("{}___WKT___", name),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cell_field.is_empty() || self.shape_field.is_empty() {
            return Err(GeoCellError::Config(
                "Field names cannot be empty".to_string(),
            ));
        }
        if self.cell_field == self.shape_field {
            return Err(GeoCellError::Config(format!(
                "Cell and shape fields must differ, both are '{}'",
                self.cell_field
            )));
        }
        Ok(())
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            cell_field: Self::default_cell_field(),
            shape_field: Self::default_shape_field(),
        }
    }
}

impl Config {
    pub fn with_coverage(mut self, coverage: CoverageConfig) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn with_fields(mut self, fields: FieldConfig) -> Self {
        self.fields = fields;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.coverage.validate()?;
        self.fields.validate()
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_fixed_resolution() {
        let config = Config::default();
        assert_eq!(config.coverage.point_precision, 12);
        assert_eq!(config.coverage.base_precision, 4);
        assert_eq!(config.coverage.max_precision, 4);
        assert!(!config.coverage.is_multi_resolution());
        assert_eq!(config.fields.cell_field, "_______SHAPE___CELL___");
        assert_eq!(config.fields.shape_field, "_______SHAPE___WKT___");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_precisions() {
        let inverted = CoverageConfig::default().multi_resolution(6, 4);
        assert!(inverted.validate().is_err());

        let too_fine = CoverageConfig::default().with_point_precision(13);
        assert!(too_fine.validate().is_err());

        let coarse_point = CoverageConfig::default()
            .multi_resolution(2, 6)
            .with_point_precision(5);
        assert!(coarse_point.validate().is_err());

        let zero_line = CoverageConfig::default().with_line_precision(0);
        assert!(zero_line.validate().is_err());
    }

    #[test]
    fn test_field_validation() {
        let same = FieldConfig {
            cell_field: "geo".into(),
            shape_field: "geo".into(),
        };
        assert!(same.validate().is_err());
        assert!(FieldConfig::for_field("location").validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip_with_partial_input() {
        let config = Config::from_json(r#"{"coverage": {"max_precision": 6}}"#).unwrap();
        assert_eq!(config.coverage.max_precision, 6);
        assert_eq!(config.coverage.base_precision, 4);

        let json = config.to_json().unwrap();
        let back = Config::from_json(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_json_rejects_invalid_and_unknown() {
        assert!(Config::from_json(r#"{"coverage": {"base_precision": 9}}"#).is_err());
        assert!(Config::from_json(r#"{"precision": 4}"#).is_err());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default().with_fields(FieldConfig::for_field("shape"));
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }
}
