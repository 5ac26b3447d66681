use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Topological relation between a subject geometry and a reference geometry.
///
/// When a relation tags a cell, it reads "geometry REL cell": `Contains` means the
/// geometry fully covers the cell, `Within` means the geometry lies inside the cell.
/// When it names a filter, it reads "document REL query".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialRelation {
    Within,
    Intersects,
    Contains,
    Disjoint,
}

impl SpatialRelation {
    /// All relations in byte order.
    pub const ALL: [SpatialRelation; 4] = [
        SpatialRelation::Within,
        SpatialRelation::Intersects,
        SpatialRelation::Contains,
        SpatialRelation::Disjoint,
    ];

    /// The byte appended to a cell token when it is written as an index term.
    ///
    /// # Examples
    ///
    /// ```
    /// use geocell_types::relation::SpatialRelation;
    ///
    /// assert_eq!(SpatialRelation::Within.as_byte(), b'0');
    /// assert_eq!(SpatialRelation::Disjoint.as_byte(), b'3');
    /// ```
    pub const fn as_byte(self) -> u8 {
        match self {
            SpatialRelation::Within => b'0',
            SpatialRelation::Intersects => b'1',
            SpatialRelation::Contains => b'2',
            SpatialRelation::Disjoint => b'3',
        }
    }

    /// Decode a relation byte, `None` for anything outside `'0'..='3'`.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'0' => Some(SpatialRelation::Within),
            b'1' => Some(SpatialRelation::Intersects),
            b'2' => Some(SpatialRelation::Contains),
            b'3' => Some(SpatialRelation::Disjoint),
            _ => None,
        }
    }

    /// The relation seen from the other side: A CONTAINS B iff B WITHIN A.
    pub const fn inverse(self) -> Self {
        match self {
            SpatialRelation::Within => SpatialRelation::Contains,
            SpatialRelation::Contains => SpatialRelation::Within,
            other => other,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SpatialRelation::Within => "within",
            SpatialRelation::Intersects => "intersects",
            SpatialRelation::Contains => "contains",
            SpatialRelation::Disjoint => "disjoint",
        }
    }
}

impl fmt::Display for SpatialRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpatialRelation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "within" => Ok(SpatialRelation::Within),
            "intersects" => Ok(SpatialRelation::Intersects),
            "contains" => Ok(SpatialRelation::Contains),
            "disjoint" => Ok(SpatialRelation::Disjoint),
            other => Err(format!("Unknown spatial relation: {}", other)),
        }
    }
}
