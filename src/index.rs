//! Host index contract and an in-memory implementation.
//!
//! The filters only need a term dictionary per field, posting lists restricted to live
//! documents and a stored-field lookup. [`MemoryIndex`] provides these for tests,
//! benchmarks and embedding without a full search engine.

use crate::error::{GeoCellError, Result};
use bytes::Bytes;
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Document identifier assigned by the host index.
pub type DocId = u32;

/// Read access to the host index used during filter evaluation.
///
/// Implementations must be safe to share between threads; the `parallel` feature
/// evaluates terms concurrently.
pub trait SpatialIndexReader: Send + Sync {
    /// Distinct terms of `field`
    fn terms(&self, field: &str) -> Result<Box<dyn Iterator<Item = Bytes> + '_>>;

    /// Live documents carrying `term` in `field`
    fn postings(&self, field: &str, term: &[u8]) -> Result<RoaringBitmap>;

    /// Stored value of `field` for a live document
    fn stored_value(&self, doc: DocId, field: &str) -> Result<Option<String>>;

    /// Live documents with a stored or indexed value for `field`
    fn docs_with_field(&self, field: &str) -> Result<RoaringBitmap>;
}

/// A field produced for indexing one shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexableField {
    /// Untokenized cell terms, indexed without positions or stored values
    CellTerms { field: String, terms: Vec<Bytes> },
    /// Serialized shape, stored but not indexed
    StoredShape { field: String, wkt: String },
}

impl IndexableField {
    pub fn name(&self) -> &str {
        match self {
            IndexableField::CellTerms { field, .. } | IndexableField::StoredShape { field, .. } => {
                field
            }
        }
    }
}

/// In-memory index statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Live documents
    pub doc_count: u64,
    /// Documents deleted since creation
    pub deleted_count: u64,
    /// Distinct terms across all fields
    pub term_count: usize,
}

/// In-memory host index with sorted term dictionaries and bitmap postings.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    postings: FxHashMap<String, BTreeMap<Bytes, RoaringBitmap>>,
    stored: FxHashMap<String, FxHashMap<DocId, String>>,
    live: RoaringBitmap,
    next_doc: DocId,
    deleted: u64,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document and return its id.
    pub fn add_document<I>(&mut self, fields: I) -> Result<DocId>
    where
        I: IntoIterator<Item = IndexableField>,
    {
        let doc = self.next_doc;
        self.next_doc = doc
            .checked_add(1)
            .ok_or_else(|| GeoCellError::Index("document id space exhausted".to_string()))?;

        for field in fields {
            match field {
                IndexableField::CellTerms { field, terms } => {
                    let dictionary = self.postings.entry(field).or_default();
                    for term in terms {
                        dictionary.entry(term).or_default().insert(doc);
                    }
                }
                IndexableField::StoredShape { field, wkt } => {
                    self.stored.entry(field).or_default().insert(doc, wkt);
                }
            }
        }
        self.live.insert(doc);
        Ok(doc)
    }

    /// Mark a document deleted. Returns false when it was not live.
    pub fn delete_document(&mut self, doc: DocId) -> bool {
        let removed = self.live.remove(doc);
        if removed {
            self.deleted += 1;
        }
        removed
    }

    pub fn is_live(&self, doc: DocId) -> bool {
        self.live.contains(doc)
    }

    pub fn num_docs(&self) -> u64 {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            doc_count: self.live.len(),
            deleted_count: self.deleted,
            term_count: self.postings.values().map(BTreeMap::len).sum(),
        }
    }
}

impl SpatialIndexReader for MemoryIndex {
    fn terms(&self, field: &str) -> Result<Box<dyn Iterator<Item = Bytes> + '_>> {
        match self.postings.get(field) {
            Some(dictionary) => Ok(Box::new(dictionary.keys().cloned())),
            None => Ok(Box::new(std::iter::empty())),
        }
    }

    fn postings(&self, field: &str, term: &[u8]) -> Result<RoaringBitmap> {
        Ok(self
            .postings
            .get(field)
            .and_then(|dictionary| dictionary.get(term))
            .map(|docs| docs & &self.live)
            .unwrap_or_default())
    }

    fn stored_value(&self, doc: DocId, field: &str) -> Result<Option<String>> {
        if !self.live.contains(doc) {
            return Ok(None);
        }
        Ok(self
            .stored
            .get(field)
            .and_then(|values| values.get(&doc))
            .cloned())
    }

    fn docs_with_field(&self, field: &str) -> Result<RoaringBitmap> {
        let mut docs = RoaringBitmap::new();
        if let Some(values) = self.stored.get(field) {
            docs.extend(values.keys().copied());
        }
        if let Some(dictionary) = self.postings.get(field) {
            for postings in dictionary.values() {
                docs |= postings;
            }
        }
        docs &= &self.live;
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(terms: &[&[u8]]) -> IndexableField {
        IndexableField::CellTerms {
            field: "cells".to_string(),
            terms: terms.iter().map(|t| Bytes::copy_from_slice(t)).collect(),
        }
    }

    fn shape(wkt: &str) -> IndexableField {
        IndexableField::StoredShape {
            field: "shape".to_string(),
            wkt: wkt.to_string(),
        }
    }

    #[test]
    fn test_add_and_read_back() {
        let mut index = MemoryIndex::new();
        let a = index
            .add_document([cells(&[b"s0002", b"s0011"]), shape("POINT(1 1)")])
            .unwrap();
        let b = index
            .add_document([cells(&[b"s0011"]), shape("POINT(2 2)")])
            .unwrap();

        let terms: Vec<Bytes> = index.terms("cells").unwrap().collect();
        assert_eq!(terms, vec![Bytes::from_static(b"s0002"), Bytes::from_static(b"s0011")]);
        assert_eq!(
            index.postings("cells", b"s0011").unwrap(),
            [a, b].into_iter().collect::<RoaringBitmap>()
        );
        assert_eq!(
            index.stored_value(b, "shape").unwrap().as_deref(),
            Some("POINT(2 2)")
        );
        assert_eq!(index.stats().term_count, 2);
    }

    #[test]
    fn test_deleted_documents_are_hidden() {
        let mut index = MemoryIndex::new();
        let a = index.add_document([cells(&[b"s0002"]), shape("POINT(1 1)")]).unwrap();
        let b = index.add_document([cells(&[b"s0002"]), shape("POINT(1 1)")]).unwrap();

        assert!(index.delete_document(a));
        assert!(!index.delete_document(a));

        let postings = index.postings("cells", b"s0002").unwrap();
        assert!(!postings.contains(a));
        assert!(postings.contains(b));
        assert_eq!(index.stored_value(a, "shape").unwrap(), None);
        assert_eq!(index.docs_with_field("shape").unwrap().len(), 1);
        assert_eq!(index.stats().deleted_count, 1);
        assert_eq!(index.num_docs(), 1);
    }

    #[test]
    fn test_unknown_field_is_empty() {
        let index = MemoryIndex::new();
        assert_eq!(index.terms("missing").unwrap().count(), 0);
        assert!(index.postings("missing", b"x").unwrap().is_empty());
        assert!(index.docs_with_field("missing").unwrap().is_empty());
    }
}
