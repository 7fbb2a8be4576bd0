//! Result deduplication across overlapping sub-queries.
//!
//! Range filters on the tokenized name field can match one record under
//! several ranges, so the union of plan results is a superset. Records are
//! merged on a category-specific identity key, first occurrence wins.

use std::collections::HashSet;

use tracing::debug;

use crate::search::{SearchHit, ELEMENT_OBJECT, ELEMENT_RELATIONSHIP};

/// Identity key of a fetched record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// Objects and other identified elements
    Identity(String),
    /// Relationships: (source identity, target identity, type)
    Relationship {
        source: String,
        target: String,
        kind: String,
    },
    /// Unidentified, non-relationship records keyed by their serialized source
    Source(String),
}

impl RecordKey {
    /// Compute the key for a record, or `None` when it carries no usable identity.
    pub fn of(hit: &SearchHit) -> Option<Self> {
        match hit.element_type() {
            Some(ELEMENT_OBJECT) => hit.identity().map(|id| Self::Identity(id.to_string())),
            Some(ELEMENT_RELATIONSHIP) => Some(Self::Relationship {
                source: hit.get_str("core.sourceIdentity").unwrap_or_default().to_string(),
                target: hit.get_str("core.targetIdentity").unwrap_or_default().to_string(),
                kind: relationship_type(hit),
            }),
            _ => match hit.identity() {
                Some(id) => Some(Self::Identity(id.to_string())),
                None => serde_json::to_string(&hit.source).ok().map(Self::Source),
            },
        }
    }
}

/// Relationship `type` may be a string or a one-element array.
fn relationship_type(hit: &SearchHit) -> String {
    hit.get_strs("type").join(",")
}

/// Counters from one deduplication pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub input: usize,
    pub kept: usize,
    pub duplicates: usize,
    pub missing_key: usize,
}

/// Order-preserving, first-wins record merge.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<RecordKey>,
    stats: DedupStats,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `hit` if its key has not been seen. Records without a key are dropped.
    pub fn admit(&mut self, hit: &SearchHit) -> bool {
        self.stats.input += 1;
        let Some(key) = RecordKey::of(hit) else {
            self.stats.missing_key += 1;
            return false;
        };
        if self.seen.insert(key) {
            self.stats.kept += 1;
            true
        } else {
            self.stats.duplicates += 1;
            false
        }
    }

    /// Deduplicate a batch, preserving first-seen order.
    pub fn dedup(&mut self, hits: Vec<SearchHit>) -> Vec<SearchHit> {
        hits.into_iter().filter(|h| self.admit(h)).collect()
    }

    pub fn stats(&self) -> DedupStats {
        self.stats
    }
}

/// Deduplicate a complete result set in one pass.
pub fn dedup_records(hits: Vec<SearchHit>) -> (Vec<SearchHit>, DedupStats) {
    let mut dedup = Deduplicator::new();
    let kept = dedup.dedup(hits);
    let stats = dedup.stats();
    if stats.duplicates > 0 || stats.missing_key > 0 {
        debug!(
            "Deduplicated {} -> {} records ({} without identity)",
            stats.input, stats.kept, stats.missing_key
        );
    }
    (kept, stats)
}
