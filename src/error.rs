//! Error types for the geocell spatial index.

use thiserror::Error;

/// Errors raised by geocode arithmetic, coverage construction and filter evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoCellError {
    /// Malformed geocode input: bad base-32 symbol, bad binary digit, token too long.
    #[error("Invalid geocode: {0}")]
    InvalidGeocode(String),

    /// Precision misuse: token or character precision on a bit count not divisible by 5,
    /// mismatched precisions, ordinal stepping out of range.
    #[error("Precision error: {0}")]
    Precision(String),

    /// The requested operation or relation is not implemented.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Invalid input value (coordinates, precisions).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Geometry cannot be covered (for example, it has no extent).
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("WKT parse error: {0}")]
    WktParse(String),

    #[error("GeoJSON parse error: {0}")]
    GeoJsonParse(String),

    /// An index term that does not decode as token + relation byte.
    #[error("Invalid index term: {0}")]
    InvalidTerm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller-supplied evaluation deadline passed.
    #[error("Filter evaluation exceeded its deadline")]
    DeadlineExceeded,

    /// Error reported by the host index.
    #[error("Index error: {0}")]
    Index(String),
}

/// Result type for geocell operations.
pub type Result<T> = std::result::Result<T, GeoCellError>;
