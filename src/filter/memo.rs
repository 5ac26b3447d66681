//! Per-evaluation memo of exact shape checks.

use crate::index::DocId;
use dashmap::DashMap;
use roaring::RoaringBitmap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Result of checking one document's stored shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    NoMatch,
    /// The stored shape is missing or cannot be parsed
    Unreadable,
}

/// Remembers the verdict for each refined document so that a document posted under many
/// terms is checked at most once, also when terms are evaluated concurrently.
#[derive(Debug, Default)]
pub struct RefinementMemo {
    verdicts: DashMap<DocId, Verdict>,
    checks: AtomicUsize,
}

impl RefinementMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verdict for `doc`, running `check` only if no verdict is recorded yet.
    ///
    /// The entry stays locked while `check` runs, so concurrent callers for the same
    /// document wait for the first verdict instead of checking again.
    pub fn resolve<F>(&self, doc: DocId, check: F) -> Verdict
    where
        F: FnOnce() -> Verdict,
    {
        if let Some(verdict) = self.verdicts.get(&doc) {
            return *verdict;
        }
        *self.verdicts.entry(doc).or_insert_with(|| {
            self.checks.fetch_add(1, Ordering::Relaxed);
            check()
        })
    }

    pub fn get(&self, doc: DocId) -> Option<Verdict> {
        self.verdicts.get(&doc).map(|v| *v)
    }

    /// Exact checks performed so far.
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    /// Documents whose stored shape could not be read.
    pub fn unreadable(&self) -> RoaringBitmap {
        self.verdicts
            .iter()
            .filter(|entry| *entry.value() == Verdict::Unreadable)
            .map(|entry| *entry.key())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_check_runs_once_per_document() {
        let memo = RefinementMemo::new();
        let calls = Cell::new(0);
        for _ in 0..3 {
            let verdict = memo.resolve(7, || {
                calls.set(calls.get() + 1);
                Verdict::Match
            });
            assert_eq!(verdict, Verdict::Match);
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(memo.checks(), 1);
        assert_eq!(memo.get(7), Some(Verdict::Match));
        assert_eq!(memo.get(8), None);
    }

    #[test]
    fn test_unreadable_documents() {
        let memo = RefinementMemo::new();
        memo.resolve(1, || Verdict::Unreadable);
        memo.resolve(2, || Verdict::NoMatch);
        memo.resolve(3, || Verdict::Unreadable);
        let unreadable: Vec<u32> = memo.unreadable().iter().collect();
        assert_eq!(unreadable, vec![1, 3]);
        assert_eq!(memo.len(), 3);
    }

    #[test]
    fn test_concurrent_resolution() {
        let memo = RefinementMemo::new();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for doc in 0..100 {
                        memo.resolve(doc, || Verdict::NoMatch);
                    }
                });
            }
        });
        assert_eq!(memo.checks(), 100);
    }
}
