//! Prefix tree over geocode tokens for classifying cells against a query coverage.
//!
//! Each inserted token stores its relation on its terminal node. Classification walks a
//! candidate token and returns the relation of the first (shallowest) node on the path
//! that has one, so a coarse query cell answers for every finer cell beneath it.

use crate::cell::Cell;
use crate::error::{GeoCellError, Result};
use geocell_types::relation::SpatialRelation;
use std::fmt;

/// Digits plus the 26 lowercase letters; `a`, `i`, `l` and `o` are never populated.
const SLOTS: usize = 36;

#[inline]
fn slot(symbol: u8) -> Option<usize> {
    match symbol {
        b'0'..=b'9' => Some(usize::from(symbol - b'0')),
        b'a' | b'i' | b'l' | b'o' => None,
        b'b'..=b'z' => Some(usize::from(symbol - b'a') + 10),
        _ => None,
    }
}

#[derive(Debug)]
struct Node {
    children: [Option<Box<Node>>; SLOTS],
    relation: Option<SpatialRelation>,
    /// Inserted tokens ending at or below this node
    terminals: usize,
}

impl Node {
    fn new() -> Self {
        Self {
            children: std::array::from_fn(|_| None),
            relation: None,
            terminals: 0,
        }
    }

    fn child(&self, symbol: u8) -> Option<&Node> {
        slot(symbol).and_then(|i| self.children[i].as_deref())
    }
}

/// Outcome of walking a candidate token through the trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// A node on the path carries a relation; `depth` is its token length.
    Matched {
        relation: SpatialRelation,
        depth: usize,
    },
    /// The token is a strict prefix of inserted tokens; `all` when every inserted
    /// token lies beneath it.
    Covering { all: bool },
    /// The walk fell off the trie.
    Missed,
}

/// Query coverage indexed for prefix classification.
///
/// ```rust
/// use geocell::{RelationTrie, SpatialRelation};
///
/// let mut trie = RelationTrie::new();
/// trie.insert(b"s00t", SpatialRelation::Contains)?;
/// assert_eq!(trie.classify(b"s00tb7"), SpatialRelation::Contains);
/// assert_eq!(trie.classify(b"s00u"), SpatialRelation::Disjoint);
/// # Ok::<(), geocell::GeoCellError>(())
/// ```
pub struct RelationTrie {
    root: Node,
}

impl RelationTrie {
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    /// Build a trie from the cells of a coverage.
    pub fn from_coverage<I>(cells: I) -> Result<Self>
    where
        I: IntoIterator<Item = Cell>,
    {
        let mut trie = Self::new();
        for cell in cells {
            trie.insert(cell.token_bytes(), cell.relation())?;
        }
        log::debug!("Relation trie built with {} tokens", trie.len());
        Ok(trie)
    }

    /// Store `relation` on the node of `token`, replacing any previous relation.
    pub fn insert(&mut self, token: &[u8], relation: SpatialRelation) -> Result<()> {
        if token.is_empty() {
            return Err(GeoCellError::InvalidTerm(
                "cannot insert an empty token".to_string(),
            ));
        }
        let mut slots = Vec::with_capacity(token.len());
        for &symbol in token {
            let index = slot(symbol).ok_or_else(|| {
                GeoCellError::InvalidGeocode(format!(
                    "'{}' contains invalid base-32 symbol '{}'",
                    String::from_utf8_lossy(token),
                    char::from(symbol)
                ))
            })?;
            slots.push(index);
        }

        let mut node = &mut self.root;
        for &index in &slots {
            node = node.children[index]
                .get_or_insert_with(|| Box::new(Node::new()))
                .as_mut();
        }
        let is_new = node.relation.replace(relation).is_none();

        if is_new {
            let mut node = &mut self.root;
            node.terminals += 1;
            for &index in &slots {
                let Some(child) = node.children[index].as_deref_mut() else {
                    break;
                };
                child.terminals += 1;
                node = child;
            }
        }
        Ok(())
    }

    /// Relation of the shallowest node on `token`'s path that has one, else `Disjoint`.
    pub fn classify(&self, token: &[u8]) -> SpatialRelation {
        match self.probe(token) {
            Probe::Matched { relation, .. } => relation,
            Probe::Covering { .. } | Probe::Missed => SpatialRelation::Disjoint,
        }
    }

    /// Walk `token` and report how it relates to the inserted tokens.
    pub fn probe(&self, token: &[u8]) -> Probe {
        let mut node = &self.root;
        for (depth, &symbol) in token.iter().enumerate() {
            let Some(child) = node.child(symbol) else {
                return Probe::Missed;
            };
            if let Some(relation) = child.relation {
                return Probe::Matched {
                    relation,
                    depth: depth + 1,
                };
            }
            node = child;
        }
        if node.terminals == 0 {
            Probe::Missed
        } else {
            Probe::Covering {
                all: node.terminals == self.root.terminals,
            }
        }
    }

    /// Number of distinct inserted tokens.
    pub fn len(&self) -> usize {
        self.root.terminals
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> Vec<(String, SpatialRelation)> {
        fn walk(node: &Node, prefix: &mut String, out: &mut Vec<(String, SpatialRelation)>) {
            if let Some(relation) = node.relation {
                out.push((prefix.clone(), relation));
            }
            for (index, child) in node.children.iter().enumerate() {
                if let Some(child) = child {
                    let symbol = if index < 10 {
                        b'0' + index as u8
                    } else {
                        b'a' + (index - 10) as u8
                    };
                    prefix.push(char::from(symbol));
                    walk(child, prefix, out);
                    prefix.pop();
                }
            }
        }
        let mut out = Vec::with_capacity(self.len());
        walk(&self.root, &mut String::new(), &mut out);
        out
    }
}

impl Default for RelationTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RelationTrie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

impl fmt::Display for RelationTrie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (token, relation)) in self.entries().into_iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}:{}", token, relation)?;
        }
        Ok(())
    }
}
