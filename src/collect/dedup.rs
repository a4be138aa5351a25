use std::collections::HashSet;

use crate::core::types::RawItem;
use crate::core::url_norm::normalize_href;

/// Identity of an item across polls: normalized link, else `title|time`.
pub fn dedup_key(item: &RawItem, origin: &str) -> String {
    let link = normalize_href(&item.link, origin);
    if !link.is_empty() {
        return link;
    }
    format!("{}|{}", item.title.trim(), item.timestamp.trim())
}

/// Result of feeding one full snapshot to the tracker.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    /// Items not seen earlier in the session, in snapshot order.
    pub new_items: Vec<RawItem>,
    pub should_stop: bool,
    pub stagnation: u32,
    pub snapshot_len: usize,
}

/// Dedup key set plus the consecutive-unchanged-size counter.
///
/// Convergence is a heuristic: a listing that reports the same size on
/// `threshold` consecutive polls while still changing content is cut short.
#[derive(Debug)]
pub struct Deduplicator {
    origin: String,
    threshold: u32,
    seen: HashSet<String>,
    previous_count: Option<usize>,
    stagnation: u32,
}

impl Deduplicator {
    pub fn new(threshold: u32, origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            threshold: threshold.max(1),
            seen: HashSet::new(),
            previous_count: None,
            stagnation: 0,
        }
    }

    pub fn observe(&mut self, snapshot: &[RawItem]) -> Observation {
        let mut new_items = Vec::new();
        for item in snapshot {
            if self.seen.insert(dedup_key(item, &self.origin)) {
                new_items.push(item.clone());
            }
        }

        let len = snapshot.len();
        if self.previous_count == Some(len) {
            self.stagnation += 1;
        } else {
            self.stagnation = 0;
        }
        self.previous_count = Some(len);

        // A session that has never seen an item gets one more empty poll,
        // not `threshold` more.
        let never_populated = len == 0 && self.seen.is_empty();
        let should_stop =
            self.stagnation >= self.threshold || (never_populated && self.stagnation >= 1);

        Observation {
            new_items,
            should_stop,
            stagnation: self.stagnation,
            snapshot_len: len,
        }
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }
}
