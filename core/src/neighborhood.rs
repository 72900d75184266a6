//! Neighborhood aggregation: the most recent T purchases across every
//! friend within D hops.
//!
//! Each friend's history is already capped at T, so the union holds at
//! most `|N| * T` records. Rather than sorting that union, every history
//! is laid out newest-first and the runs are merged through a max-heap
//! of run heads, stopping after T pops. Cost is O(|N| * T log T) to lay
//! out the runs plus O(T log |N|) to merge.

use crate::{
    graph::FriendGraph,
    history::{HistoryBook, PurchaseRecord},
};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

pub struct NeighborhoodAggregator<'a> {
    graph: &'a FriendGraph,
    histories: &'a HistoryBook,
}

impl<'a> NeighborhoodAggregator<'a> {
    pub fn new(graph: &'a FriendGraph, histories: &'a HistoryBook) -> Self {
        Self { graph, histories }
    }

    /// The `window` most recent purchases made by anyone within `depth`
    /// hops of `user` (not `user` itself), newest first. This is a
    /// global top-T over the whole neighborhood, not T per friend.
    pub fn recent_purchases(&self, user: &str, depth: usize, window: usize) -> Vec<PurchaseRecord> {
        let neighbors = self.graph.neighbors_within_depth(user, depth);
        let runs: Vec<Vec<&PurchaseRecord>> = neighbors
            .iter()
            .filter_map(|friend| self.histories.get(friend))
            .filter(|history| !history.is_empty())
            .map(|history| history.newest_first())
            .collect();

        log::trace!(
            "neighborhood: user={user} depth={depth} friends={} active={}",
            neighbors.len(),
            runs.len()
        );

        merge_newest(&runs, window).into_iter().cloned().collect()
    }

    /// Amounts of `recent_purchases`. Empty when the neighborhood is
    /// empty or nobody in it has bought anything.
    pub fn recent_amounts(&self, user: &str, depth: usize, window: usize) -> Vec<f64> {
        self.recent_purchases(user, depth, window)
            .iter()
            .map(|purchase| purchase.amount)
            .collect()
    }
}

/// Head of one newest-first run inside the merge heap.
struct RunHead<'r> {
    record: &'r PurchaseRecord,
    run: usize,
    pos: usize,
}

impl PartialEq for RunHead<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RunHead<'_> {}

impl PartialOrd for RunHead<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RunHead<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.record.recency_cmp(other.record)
    }
}

/// K-way merge of newest-first runs, keeping the first `limit` records.
pub fn merge_newest<'r>(runs: &[Vec<&'r PurchaseRecord>], limit: usize) -> Vec<&'r PurchaseRecord> {
    let mut heads: BinaryHeap<RunHead<'r>> = runs
        .iter()
        .enumerate()
        .filter_map(|(run, records)| {
            records.first().map(|&record| RunHead { record, run, pos: 0 })
        })
        .collect();

    let mut merged = Vec::with_capacity(limit.min(runs.iter().map(Vec::len).sum()));
    while merged.len() < limit {
        let Some(head) = heads.pop() else {
            break;
        };
        merged.push(head.record);

        let next = head.pos + 1;
        if let Some(&record) = runs[head.run].get(next) {
            heads.push(RunHead { record, run: head.run, pos: next });
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_takes_global_top_not_per_run() {
        let a = [
            PurchaseRecord::new(9i64, 1.0, 0),
            PurchaseRecord::new(8i64, 2.0, 1),
            PurchaseRecord::new(7i64, 3.0, 2),
        ];
        let b = [PurchaseRecord::new(1i64, 4.0, 3)];
        let runs = vec![a.iter().collect::<Vec<_>>(), b.iter().collect::<Vec<_>>()];

        let merged = merge_newest(&runs, 3);
        let amounts: Vec<f64> = merged.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn merge_breaks_timestamp_ties_by_sequence() {
        let a = [PurchaseRecord::new("t", 1.0, 4)];
        let b = [PurchaseRecord::new("t", 2.0, 9)];
        let runs = vec![a.iter().collect::<Vec<_>>(), b.iter().collect::<Vec<_>>()];

        let merged = merge_newest(&runs, 1);
        assert_eq!(merged[0].seq, 9);
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        assert!(merge_newest(&[], 5).is_empty());
        let a = [PurchaseRecord::new(1i64, 1.0, 0)];
        let runs: Vec<Vec<&PurchaseRecord>> = vec![a.iter().collect()];
        assert!(merge_newest(&runs, 0).is_empty());
    }
}
