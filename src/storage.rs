use crate::error::Result;
use crate::types::ListingId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};

/// Ids recorded for one term: insertion order plus a hash index for lookups.
/// Serialized as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<ListingId>")]
struct TermIds {
    order: Vec<ListingId>,
    index: HashSet<ListingId>,
}

impl From<Vec<ListingId>> for TermIds {
    fn from(ids: Vec<ListingId>) -> Self {
        let mut term_ids = TermIds::default();
        for id in ids {
            term_ids.insert(id);
        }
        term_ids
    }
}

impl Serialize for TermIds {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.order.serialize(serializer)
    }
}

impl TermIds {
    fn contains(&self, id: &ListingId) -> bool {
        self.index.contains(id)
    }

    fn insert(&mut self, id: ListingId) -> bool {
        if !self.index.insert(id.clone()) {
            return false;
        }
        self.order.push(id);
        true
    }

    fn refresh(&mut self, id: &ListingId) -> bool {
        if !self.index.contains(id) {
            return false;
        }
        if let Some(pos) = self.order.iter().position(|existing| existing == id) {
            let id = self.order.remove(pos);
            self.order.push(id);
        }
        true
    }

    fn truncate_oldest(&mut self, cap: usize) -> usize {
        if self.order.len() <= cap {
            return 0;
        }
        let excess = self.order.len() - cap;
        for id in self.order.drain(..excess) {
            self.index.remove(&id);
        }
        excess
    }
}

/// Per-term record of listing ids that have already been notified.
///
/// Ids keep their insertion order so the oldest can be evicted first when a
/// per-term cap is configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeenSet {
    terms: BTreeMap<String, TermIds>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure the term has an entry, even if nothing was found for it yet.
    pub fn ensure_term(&mut self, term: &str) {
        if !self.terms.contains_key(term) {
            self.terms.insert(term.to_string(), TermIds::default());
        }
    }

    pub fn contains(&self, term: &str, id: &ListingId) -> bool {
        self.terms
            .get(term)
            .map(|ids| ids.contains(id))
            .unwrap_or(false)
    }

    /// Record an id for a term. Returns false if it was already present.
    pub fn mark(&mut self, term: &str, id: ListingId) -> bool {
        self.terms.entry(term.to_string()).or_default().insert(id)
    }

    /// Move an already recorded id to the newest position so cap eviction
    /// never drops ids the search still returns. Returns false if unknown.
    pub fn refresh(&mut self, term: &str, id: &ListingId) -> bool {
        self.terms
            .get_mut(term)
            .map(|ids| ids.refresh(id))
            .unwrap_or(false)
    }

    pub fn ids(&self, term: &str) -> Option<&[ListingId]> {
        self.terms.get(term).map(|ids| ids.order.as_slice())
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn total_ids(&self) -> usize {
        self.terms.values().map(|ids| ids.order.len()).sum()
    }

    /// Drop the oldest ids of every term holding more than `cap`.
    /// Returns how many ids were evicted.
    pub fn enforce_cap(&mut self, cap: usize) -> usize {
        self.terms
            .values_mut()
            .map(|ids| ids.truncate_oldest(cap))
            .sum()
    }
}

#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Load the persisted seen set. Missing or corrupt state yields an empty set.
    async fn load(&self) -> SeenSet;

    /// Replace the persisted seen set with `seen` in one piece.
    async fn save(&self, seen: &SeenSet) -> Result<()>;
}
