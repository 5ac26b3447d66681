//! Cells: geocode tokens tagged with their relation to a geometry.
//!
//! A cell becomes an index term by appending its relation byte to the token, so the
//! term carries both the cell identity and the indexing-time relation.

use crate::error::{GeoCellError, Result};
use crate::geocode::{BASE32_ALPHABET, BASE32_BITS, GeoCode, symbol_value};
use bytes::{BufMut, Bytes, BytesMut};
use geocell_types::relation::SpatialRelation;
use std::fmt;

/// A geocode token and the relation of the covered geometry to that cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cell {
    token: String,
    relation: SpatialRelation,
}

impl Cell {
    pub fn new(token: impl Into<String>, relation: SpatialRelation) -> Self {
        Self {
            token: token.into(),
            relation,
        }
    }

    /// Build a cell from a geocode whose precision is a whole number of symbols.
    pub fn from_geocode(code: &GeoCode, relation: SpatialRelation) -> Result<Self> {
        Ok(Self::new(code.to_base32()?, relation))
    }

    /// Render the cell at `ordinal` with `characters` symbols of precision.
    pub(crate) fn from_ordinal(ordinal: u64, characters: usize, relation: SpatialRelation) -> Self {
        let token = (0..characters)
            .rev()
            .map(|i| {
                let value = ordinal >> (usize::from(BASE32_BITS) * i) & 0x1f;
                char::from(BASE32_ALPHABET[value as usize])
            })
            .collect();
        Self { token, relation }
    }

    /// Decode an index term (token followed by one relation byte).
    ///
    /// # Examples
    ///
    /// ```
    /// use geocell::{Cell, SpatialRelation};
    ///
    /// let cell = Cell::from_term(b"s0002")?;
    /// assert_eq!(cell.token(), "s000");
    /// assert_eq!(cell.relation(), SpatialRelation::Contains);
    /// # Ok::<(), geocell::GeoCellError>(())
    /// ```
    pub fn from_term(term: &[u8]) -> Result<Self> {
        let (token, relation) = split_term(term)?;
        if let Some(&bad) = token.iter().find(|&&b| symbol_value(b).is_none()) {
            return Err(GeoCellError::InvalidTerm(format!(
                "term token contains non-geocode byte 0x{:02x}",
                bad
            )));
        }
        // alphabet bytes are ASCII
        let token = String::from_utf8_lossy(token).into_owned();
        Ok(Self { token, relation })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn token_bytes(&self) -> &[u8] {
        self.token.as_bytes()
    }

    pub fn relation(&self) -> SpatialRelation {
        self.relation
    }

    /// Precision in geocode characters.
    pub fn precision(&self) -> usize {
        self.token.len()
    }

    pub fn geocode(&self) -> Result<GeoCode> {
        GeoCode::from_base32(&self.token)
    }

    /// Posting value written to the cell field.
    pub fn to_term(&self) -> Bytes {
        let mut term = BytesMut::with_capacity(self.token.len() + 1);
        term.put_slice(self.token.as_bytes());
        term.put_u8(self.relation.as_byte());
        term.freeze()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.token, self.relation)
    }
}

/// Split a term into its token prefix and trailing relation byte without copying.
pub fn split_term(term: &[u8]) -> Result<(&[u8], SpatialRelation)> {
    let Some((&last, token)) = term.split_last() else {
        return Err(GeoCellError::InvalidTerm("empty term".to_string()));
    };
    let relation = SpatialRelation::from_byte(last).ok_or_else(|| {
        GeoCellError::InvalidTerm(format!("unknown relation byte 0x{:02x}", last))
    })?;
    Ok((token, relation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_layout() {
        let cell = Cell::new("s00t", SpatialRelation::Intersects);
        assert_eq!(cell.to_term().as_ref(), b"s00t1");
        assert_eq!(cell.precision(), 4);
        assert_eq!(cell.to_string(), "s00t:intersects");
    }

    #[test]
    fn test_term_decode() {
        let original = Cell::new("dr5ru", SpatialRelation::Within);
        let decoded = Cell::from_term(&original.to_term()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_invalid_terms() {
        assert!(matches!(Cell::from_term(b""), Err(GeoCellError::InvalidTerm(_))));
        assert!(matches!(Cell::from_term(b"s00t9"), Err(GeoCellError::InvalidTerm(_))));
        assert!(matches!(Cell::from_term(b"sa0t1"), Err(GeoCellError::InvalidTerm(_))));
    }

    #[test]
    fn test_split_term_keeps_token_bytes() {
        let (token, relation) = split_term(b"u4pr2").unwrap();
        assert_eq!(token, b"u4pr");
        assert_eq!(relation, SpatialRelation::Contains);
    }

    #[test]
    fn test_from_ordinal_matches_geocode() {
        let code = GeoCode::with_character_precision(57.64911, 10.40744, 6).unwrap();
        let cell = Cell::from_ordinal(code.ordinal(), 6, SpatialRelation::Within);
        assert_eq!(cell.token(), code.to_base32().unwrap());
    }

    #[test]
    fn test_from_geocode_requires_whole_symbols() {
        let code = GeoCode::encode(1.0, 1.0, 12);
        assert!(Cell::from_geocode(&code, SpatialRelation::Contains).is_err());
        let code = GeoCode::encode(1.0, 1.0, 20);
        let cell = Cell::from_geocode(&code, SpatialRelation::Contains).unwrap();
        assert_eq!(cell.geocode().unwrap(), code);
    }
}
