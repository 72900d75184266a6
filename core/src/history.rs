//! Per-user bounded purchase history.
//!
//! Each user keeps the T most recent purchases seen so far, where
//! "recent" means largest `(timestamp, seq)`. Feeds may deliver a
//! user's purchases out of timestamp order, so the history is a
//! min-heap: the oldest retained record sits on top and is the one
//! evicted when the heap grows past T. Insert is O(log T).

use crate::types::{Seq, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub timestamp: Timestamp,
    pub amount: f64,
    /// Run-wide insertion order; the tie-breaker for equal timestamps.
    pub seq: Seq,
}

impl PurchaseRecord {
    pub fn new(timestamp: impl Into<Timestamp>, amount: f64, seq: Seq) -> Self {
        Self { timestamp: timestamp.into(), amount, seq }
    }

    /// Order by recency: later timestamp wins, then later insertion.
    pub fn recency_cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Heap entry ordered by recency only; `amount` does not take part.
#[derive(Debug, Clone)]
struct ByRecency(PurchaseRecord);

impl PartialEq for ByRecency {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ByRecency {}

impl PartialOrd for ByRecency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByRecency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.recency_cmp(&other.0)
    }
}

#[derive(Debug, Clone)]
pub struct PurchaseHistory {
    capacity: usize,
    heap: BinaryHeap<Reverse<ByRecency>>,
}

impl PurchaseHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    /// Insert a purchase. Returns the record evicted to stay within
    /// capacity, which may be the new record itself if it is older
    /// than everything retained.
    pub fn record(&mut self, purchase: PurchaseRecord) -> Option<PurchaseRecord> {
        self.heap.push(Reverse(ByRecency(purchase)));
        if self.heap.len() > self.capacity {
            return self.heap.pop().map(|Reverse(ByRecency(evicted))| evicted);
        }
        None
    }

    /// The retained records, in no particular order.
    pub fn snapshot(&self) -> Vec<PurchaseRecord> {
        self.heap.iter().map(|Reverse(ByRecency(r))| r.clone()).collect()
    }

    /// The retained records, most recent first. Feeds the
    /// neighborhood merge, which needs each run pre-sorted.
    pub fn newest_first(&self) -> Vec<&PurchaseRecord> {
        let mut records: Vec<&PurchaseRecord> =
            self.heap.iter().map(|Reverse(ByRecency(r))| r).collect();
        records.sort_by(|a, b| b.recency_cmp(a));
        records
    }

    /// The next record to be evicted.
    pub fn oldest(&self) -> Option<&PurchaseRecord> {
        self.heap.peek().map(|Reverse(ByRecency(r))| r)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Every user's history, all with the same capacity T.
#[derive(Debug, Clone)]
pub struct HistoryBook {
    window: usize,
    histories: HashMap<UserId, PurchaseHistory>,
}

impl HistoryBook {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            histories: HashMap::new(),
        }
    }

    pub fn record(&mut self, user: &str, purchase: PurchaseRecord) -> Option<PurchaseRecord> {
        let window = self.window;
        self.histories
            .entry(user.to_string())
            .or_insert_with(|| PurchaseHistory::new(window))
            .record(purchase)
    }

    pub fn get(&self, user: &str) -> Option<&PurchaseHistory> {
        self.histories.get(user)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn user_count(&self) -> usize {
        self.histories.len()
    }
}
