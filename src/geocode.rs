//! Geocode codec: latitude/longitude as an interleaved bit string.
//!
//! A geocode is built by bisecting the longitude range `[-180, 180]` and the latitude
//! range `[-90, 90]` alternately, longitude first. Each bisection appends a 1-bit when the
//! value falls in the upper half, else a 0-bit. Bits are stored left-aligned in a `u64`;
//! the right-aligned integer value of the significant bits is the geocode's *ordinal*,
//! which orders cells along a Z-order curve.
//!
//! Every 5 bits form one symbol of the geohash base-32 alphabet, so the token form is
//! only defined when the bit count is a multiple of 5.
//!
//! ```rust
//! use geocell::GeoCode;
//!
//! let code = GeoCode::with_character_precision(57.64911, 10.40744, 11)?;
//! assert_eq!(code.to_base32()?, "u4pruydqqvj");
//!
//! let decoded = GeoCode::from_base32("u4pruydqqvj")?;
//! assert_eq!(decoded, code);
//! assert!(decoded.bounding_box().contains_point(&geo::Point::new(10.40744, 57.64911)));
//! # Ok::<(), geocell::GeoCellError>(())
//! ```

use crate::config::MAX_CHARACTER_PRECISION;
use crate::error::{GeoCellError, Result};
use geo::Point;
use geocell_types::bbox::BoundingBox2D;
use once_cell::sync::{Lazy, OnceCell};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Bits per base-32 symbol.
pub const BASE32_BITS: u8 = 5;

/// Maximum number of significant bits.
pub const MAX_BITS: u8 = 64;

/// Geohash base-32 alphabet (no `a`, `i`, `l`, `o`).
pub const BASE32_ALPHABET: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

const LATITUDE_RANGE: [f64; 2] = [-90.0, 90.0];
const LONGITUDE_RANGE: [f64; 2] = [-180.0, 180.0];

static DECODE_TABLE: Lazy<[Option<u8>; 256]> = Lazy::new(|| {
    let mut table = [None; 256];
    for (value, &symbol) in BASE32_ALPHABET.iter().enumerate() {
        table[symbol as usize] = Some(value as u8);
    }
    table
});

/// 5-bit value of a base-32 symbol, `None` when the byte is not in the alphabet.
#[inline]
pub fn symbol_value(symbol: u8) -> Option<u8> {
    DECODE_TABLE[symbol as usize]
}

/// Replays bisection steps, tracking the bit string and the remaining ranges.
#[derive(Debug, Clone, Copy)]
struct Bisector {
    bits: u64,
    significant_bits: u8,
    latitude: [f64; 2],
    longitude: [f64; 2],
}

impl Bisector {
    fn new() -> Self {
        Self {
            bits: 0,
            significant_bits: 0,
            latitude: LATITUDE_RANGE,
            longitude: LONGITUDE_RANGE,
        }
    }

    fn range(&mut self) -> &mut [f64; 2] {
        // even bits refine longitude, odd bits latitude
        if self.significant_bits % 2 == 0 {
            &mut self.longitude
        } else {
            &mut self.latitude
        }
    }

    fn push(&mut self, on: bool) {
        let range = self.range();
        let mid = (range[0] + range[1]) / 2.0;
        if on {
            range[0] = mid;
        } else {
            range[1] = mid;
        }
        self.bits = (self.bits << 1) | u64::from(on);
        self.significant_bits += 1;
    }

    fn push_value(&mut self, latitude: f64, longitude: f64) {
        let value = if self.significant_bits % 2 == 0 {
            longitude
        } else {
            latitude
        };
        let range = self.range();
        let mid = (range[0] + range[1]) / 2.0;
        self.push(value >= mid);
    }

    fn finish(self, point: Option<Point>) -> GeoCode {
        let bbox = BoundingBox2D::new(
            self.longitude[0],
            self.latitude[0],
            self.longitude[1],
            self.latitude[1],
        );
        GeoCode {
            bits: align_left(self.bits, self.significant_bits),
            significant_bits: self.significant_bits,
            point: point.unwrap_or_else(|| bbox.center()),
            bbox,
            token: OnceCell::new(),
        }
    }
}

#[inline]
fn align_left(bits: u64, significant_bits: u8) -> u64 {
    if significant_bits == 0 {
        0
    } else {
        bits << (u32::from(MAX_BITS) - u32::from(significant_bits))
    }
}

#[inline]
fn mask_last_n_bits(value: u64, n: u8) -> u64 {
    if n == 0 {
        0
    } else {
        value & (u64::MAX >> (u32::from(MAX_BITS) - u32::from(n)))
    }
}

/// Collect every second bit of a left-aligned bit string, starting at the top bit.
fn extract_every_second_bit(mut bits: u64, count: u8) -> u64 {
    let mut value = 0u64;
    for _ in 0..count {
        value = (value << 1) | (bits >> 63);
        bits <<= 2;
    }
    value
}

fn character_bits(characters: usize) -> Result<u8> {
    if characters > MAX_CHARACTER_PRECISION {
        return Err(GeoCellError::Precision(format!(
            "Character precision must be at most {}, got {}",
            MAX_CHARACTER_PRECISION, characters
        )));
    }
    Ok(characters as u8 * BASE32_BITS)
}

/// An immutable geocode: bit string, decoded rectangle and cached base-32 token.
#[derive(Debug, Clone)]
pub struct GeoCode {
    bits: u64,
    significant_bits: u8,
    bbox: BoundingBox2D,
    point: Point,
    token: OnceCell<String>,
}

impl GeoCode {
    /// Encode a coordinate with `precision_bits` bisections (capped at 64).
    ///
    /// Coordinates are not validated; values outside the world range land in the
    /// edge cells.
    pub fn encode(latitude: f64, longitude: f64, precision_bits: usize) -> Self {
        let precision = precision_bits.min(usize::from(MAX_BITS)) as u8;
        let mut bisector = Bisector::new();
        while bisector.significant_bits < precision {
            bisector.push_value(latitude, longitude);
        }
        bisector.finish(Some(Point::new(longitude, latitude)))
    }

    /// Encode a coordinate to `characters` base-32 symbols (at most 12).
    pub fn with_character_precision(
        latitude: f64,
        longitude: f64,
        characters: usize,
    ) -> Result<Self> {
        let bits = character_bits(characters)?;
        Ok(Self::encode(latitude, longitude, usize::from(bits)))
    }

    /// Decode a base-32 token.
    pub fn from_base32(token: &str) -> Result<Self> {
        if token.len() > MAX_CHARACTER_PRECISION {
            return Err(GeoCellError::InvalidGeocode(format!(
                "'{}' is longer than {} symbols",
                token, MAX_CHARACTER_PRECISION
            )));
        }
        let mut bisector = Bisector::new();
        for symbol in token.bytes() {
            let value = symbol_value(symbol).ok_or_else(|| {
                GeoCellError::InvalidGeocode(format!(
                    "'{}' contains invalid base-32 symbol '{}'",
                    token,
                    char::from(symbol)
                ))
            })?;
            for shift in (0..BASE32_BITS).rev() {
                bisector.push(value >> shift & 1 == 1);
            }
        }
        let code = bisector.finish(None);
        let _ = code.token.set(token.to_string());
        Ok(code)
    }

    /// Decode a string of `'0'`/`'1'` characters, most significant bit first.
    pub fn from_binary_string(binary: &str) -> Result<Self> {
        if binary.len() > usize::from(MAX_BITS) {
            return Err(GeoCellError::InvalidGeocode(format!(
                "binary geocode has {} bits, at most {} allowed",
                binary.len(),
                MAX_BITS
            )));
        }
        let mut bisector = Bisector::new();
        for digit in binary.bytes() {
            match digit {
                b'1' => bisector.push(true),
                b'0' => bisector.push(false),
                _ => {
                    return Err(GeoCellError::InvalidGeocode(format!(
                        "{} is not a valid geocode as a binary string",
                        binary
                    )));
                }
            }
        }
        Ok(bisector.finish(None))
    }

    /// Decode the top `5 * characters` bits of a left-aligned 64-bit value.
    pub fn from_long_value(value: u64, characters: usize) -> Result<Self> {
        let bits = character_bits(characters)?;
        Ok(Self::decode_left_aligned(value, bits))
    }

    /// Decode a right-aligned ordinal at `characters` symbols of precision.
    pub fn from_ordinal(ordinal: u64, characters: usize) -> Result<Self> {
        let bits = character_bits(characters)?;
        if bits < MAX_BITS && ordinal >> bits != 0 {
            return Err(GeoCellError::Precision(format!(
                "Ordinal {} does not fit in {} bits",
                ordinal, bits
            )));
        }
        Ok(Self::from_ordinal_bits(ordinal, bits))
    }

    pub(crate) fn from_ordinal_bits(ordinal: u64, significant_bits: u8) -> Self {
        Self::decode_left_aligned(align_left(ordinal, significant_bits), significant_bits)
    }

    fn decode_left_aligned(value: u64, significant_bits: u8) -> Self {
        let mut bisector = Bisector::new();
        let mut bits = value;
        for _ in 0..significant_bits {
            bisector.push(bits >> 63 == 1);
            bits <<= 1;
        }
        bisector.finish(None)
    }

    /// Left-aligned raw bits.
    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn significant_bits(&self) -> u8 {
        self.significant_bits
    }

    /// Right-aligned integer value of the significant bits.
    pub fn ordinal(&self) -> u64 {
        if self.significant_bits == 0 {
            0
        } else {
            self.bits >> (u32::from(MAX_BITS) - u32::from(self.significant_bits))
        }
    }

    /// Number of base-32 symbols; fails when the bit count is not a multiple of 5.
    pub fn character_precision(&self) -> Result<usize> {
        if self.significant_bits % BASE32_BITS != 0 {
            return Err(GeoCellError::Precision(format!(
                "precision of geocode is not divisible by 5: {}",
                self
            )));
        }
        Ok(usize::from(self.significant_bits / BASE32_BITS))
    }

    /// Base-32 token; fails when the bit count is not a multiple of 5.
    pub fn to_base32(&self) -> Result<&str> {
        let characters = self.character_precision()?;
        Ok(self.token.get_or_init(|| self.render_token(characters)))
    }

    fn render_token(&self, characters: usize) -> String {
        (0..characters)
            .map(|i| {
                let index = (self.bits << (u32::from(BASE32_BITS) * i as u32)) >> 59;
                char::from(BASE32_ALPHABET[index as usize])
            })
            .collect()
    }

    /// The significant bits as `'0'`/`'1'` characters.
    pub fn to_binary_string(&self) -> String {
        (0..self.significant_bits)
            .map(|i| {
                if self.bits << i >> 63 == 1 {
                    '1'
                } else {
                    '0'
                }
            })
            .collect()
    }

    /// Rectangle covered by this geocode.
    pub fn bounding_box(&self) -> &BoundingBox2D {
        &self.bbox
    }

    pub fn center(&self) -> Point {
        self.bbox.center()
    }

    /// The encoded coordinate, or the rectangle center for decoded geocodes.
    pub fn point(&self) -> Point {
        self.point
    }

    pub fn contains_point(&self, point: &Point) -> bool {
        self.bbox.contains_point(point)
    }

    /// True when `other` is a prefix of this geocode (this cell lies inside `other`).
    pub fn within(&self, other: &GeoCode) -> bool {
        other.significant_bits <= self.significant_bits && (self.bits & other.mask()) == other.bits
    }

    fn mask(&self) -> u64 {
        if self.significant_bits == 0 {
            0
        } else {
            u64::MAX << (u32::from(MAX_BITS) - u32::from(self.significant_bits))
        }
    }

    /// Geocode `step` positions further along the ordinal order, same precision.
    ///
    /// Fails when the result leaves the ordinal range of the current precision.
    pub fn next_by(&self, step: i64) -> Result<GeoCode> {
        let target = i128::from(self.ordinal()) + i128::from(step);
        let limit = 1i128 << self.significant_bits;
        if !(0..limit).contains(&target) {
            return Err(GeoCellError::Precision(format!(
                "Stepping {} from ordinal {} leaves the {}-bit range",
                step,
                self.ordinal(),
                self.significant_bits
            )));
        }
        Ok(Self::from_ordinal_bits(target as u64, self.significant_bits))
    }

    pub fn next(&self) -> Result<GeoCode> {
        self.next_by(1)
    }

    pub fn prev(&self) -> Result<GeoCode> {
        self.next_by(-1)
    }

    /// `two.ordinal() - one.ordinal()`; both must share a precision.
    pub fn steps_between(one: &GeoCode, two: &GeoCode) -> Result<i64> {
        if one.significant_bits != two.significant_bits {
            return Err(GeoCellError::Precision(
                "It is only valid to compare the number of steps between two geocodes \
                 if they have the same number of significant bits"
                    .to_string(),
            ));
        }
        let steps = i128::from(two.ordinal()) - i128::from(one.ordinal());
        i64::try_from(steps).map_err(|_| {
            GeoCellError::Precision(format!("{} steps do not fit in an i64", steps))
        })
    }

    /// (latitude bit count, longitude bit count); longitude gets the odd bit.
    fn lat_lon_bit_counts(&self) -> (u8, u8) {
        let latitude = self.significant_bits / 2;
        (latitude, self.significant_bits - latitude)
    }

    fn right_aligned_latitude_bits(&self) -> u64 {
        extract_every_second_bit(self.bits << 1, self.lat_lon_bit_counts().0)
    }

    fn right_aligned_longitude_bits(&self) -> u64 {
        extract_every_second_bit(self.bits, self.lat_lon_bit_counts().1)
    }

    fn recombine(latitude: u64, longitude: u64, lat_count: u8, lon_count: u8) -> GeoCode {
        let mut bisector = Bisector::new();
        let (mut lat_left, mut lon_left) = (lat_count, lon_count);
        for i in 0..(lat_count + lon_count) {
            if i % 2 == 0 {
                lon_left -= 1;
                bisector.push(longitude >> lon_left & 1 == 1);
            } else {
                lat_left -= 1;
                bisector.push(latitude >> lat_left & 1 == 1);
            }
        }
        bisector.finish(None)
    }

    /// Move by whole cells along each axis, wrapping within the current bit width.
    fn shifted(&self, lat_step: i64, lon_step: i64) -> GeoCode {
        let (lat_count, lon_count) = self.lat_lon_bit_counts();
        let latitude = mask_last_n_bits(
            self.right_aligned_latitude_bits()
                .wrapping_add_signed(lat_step),
            lat_count,
        );
        let longitude = mask_last_n_bits(
            self.right_aligned_longitude_bits()
                .wrapping_add_signed(lon_step),
            lon_count,
        );
        Self::recombine(latitude, longitude, lat_count, lon_count)
    }

    pub fn north(&self) -> GeoCode {
        self.shifted(1, 0)
    }

    pub fn south(&self) -> GeoCode {
        self.shifted(-1, 0)
    }

    pub fn east(&self) -> GeoCode {
        self.shifted(0, 1)
    }

    pub fn west(&self) -> GeoCode {
        self.shifted(0, -1)
    }

    /// The eight surrounding cells: N, NE, E, SE, S, SW, W, NW.
    ///
    /// Cells on the poles or the antimeridian wrap to the opposite edge.
    pub fn adjacent(&self) -> [GeoCode; 8] {
        [
            self.shifted(1, 0),
            self.shifted(1, 1),
            self.shifted(0, 1),
            self.shifted(-1, 1),
            self.shifted(-1, 0),
            self.shifted(-1, -1),
            self.shifted(0, -1),
            self.shifted(1, -1),
        ]
    }
}

impl PartialEq for GeoCode {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits && self.significant_bits == other.significant_bits
    }
}

impl Eq for GeoCode {}

impl Hash for GeoCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits.hash(state);
        self.significant_bits.hash(state);
    }
}

impl PartialOrd for GeoCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Raw-bit order; precision only breaks ties.
impl Ord for GeoCode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bits
            .cmp(&other.bits)
            .then(self.significant_bits.cmp(&other.significant_bits))
    }
}

impl fmt::Display for GeoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bbox = format!(
            "[{}, {}, {}, {}]",
            self.bbox.min_x(),
            self.bbox.min_y(),
            self.bbox.max_x(),
            self.bbox.max_y()
        );
        if self.significant_bits % BASE32_BITS == 0 {
            let token = self.render_token(usize::from(self.significant_bits / BASE32_BITS));
            write!(f, "{} -> {} -> {}", self.to_binary_string(), bbox, token)
        } else {
            write!(
                f,
                "{} -> {}, bits: {}",
                self.to_binary_string(),
                bbox,
                self.significant_bits
            )
        }
    }
}
