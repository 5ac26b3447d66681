//! # geocell-types
//!
//! Core value types shared by the geocell spatial index.
//!
//! - **Relations**: [`relation::SpatialRelation`], the four topological relations a cell
//!   or a document can have with a reference geometry, and their single-byte term encoding.
//! - **Bounding boxes**: [`bbox::BoundingBox2D`], the rectangle covered by a geocode.
//!
//! All types are serializable with Serde and built on top of the `geo` crate's
//! geometric primitives.
//!
//! ## Examples
//!
//! ```rust
//! use geocell_types::bbox::BoundingBox2D;
//! use geocell_types::relation::SpatialRelation;
//!
//! let cell = BoundingBox2D::new(0.0, 0.0, 0.3515625, 0.17578125);
//! assert!(cell.width() > cell.height());
//! assert_eq!(SpatialRelation::Contains.as_byte(), b'2');
//! ```

pub mod bbox;
pub mod relation;
