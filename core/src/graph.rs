//! The friend graph — undirected, unweighted, mutated in place.
//!
//! INVARIANTS:
//!   - Symmetric: `b ∈ friends(a)` iff `a ∈ friends(b)`. Both
//!     directions are always inserted and removed together.
//!   - No self-loops. A user is never its own friend, which is what
//!     keeps a buyer's own purchase out of its neighborhood.
//!   - Users with no remaining friends are dropped from the map.

use crate::{
    error::{DetectorError, DetectorResult},
    types::UserId,
};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct FriendGraph {
    adjacency: HashMap<UserId, HashSet<UserId>>,
}

impl FriendGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect `a` and `b`. Returns `false` if they were already
    /// friends, or if `a == b` (refused to keep the graph loop-free).
    pub fn add_friend(&mut self, a: &str, b: &str) -> bool {
        if a == b {
            log::debug!("graph: refusing self-friendship for {a}");
            return false;
        }
        let inserted = self
            .adjacency
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        self.adjacency
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
        inserted
    }

    /// Disconnect `a` and `b`. An absent edge is reported and the
    /// graph is left untouched.
    pub fn remove_friend(&mut self, a: &str, b: &str) -> DetectorResult<()> {
        if !self.are_friends(a, b) {
            return Err(DetectorError::EdgeNotFound {
                a: a.to_string(),
                b: b.to_string(),
            });
        }
        self.unlink(a, b);
        self.unlink(b, a);
        Ok(())
    }

    fn unlink(&mut self, from: &str, to: &str) {
        if let Some(friends) = self.adjacency.get_mut(from) {
            friends.remove(to);
            if friends.is_empty() {
                self.adjacency.remove(from);
            }
        }
    }

    pub fn are_friends(&self, a: &str, b: &str) -> bool {
        self.adjacency
            .get(a)
            .is_some_and(|friends| friends.contains(b))
    }

    /// Direct friends of `user`, in no particular order.
    pub fn friends_of<'g>(&'g self, user: &str) -> impl Iterator<Item = &'g str> + 'g {
        self.adjacency
            .get(user)
            .into_iter()
            .flat_map(|friends| friends.iter().map(String::as_str))
    }

    /// Every distinct user within `depth` hops of `user`, excluding
    /// `user` itself, against the graph as it stands now.
    ///
    /// Breadth-first: the queue holds each node with its hop count, so
    /// every node at distance k is expanded before any at k + 1 and the
    /// depth cut-off is exact. A node is enqueued at most once.
    pub fn neighbors_within_depth<'g>(&'g self, user: &str, depth: usize) -> BTreeSet<&'g str> {
        let mut reached: BTreeSet<&'g str> = BTreeSet::new();
        if depth == 0 {
            return reached;
        }

        let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
        queue.push_back((user, 0));

        while let Some((current, hops)) = queue.pop_front() {
            if hops >= depth {
                continue;
            }
            for friend in self.friends_of(current) {
                if friend == user || !reached.insert(friend) {
                    continue;
                }
                queue.push_back((friend, hops + 1));
            }
        }
        reached
    }

    /// Users with at least one friend.
    pub fn user_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(HashSet::len).sum::<usize>() / 2
    }

    /// Check the symmetry and loop-free invariants. O(E); for tests
    /// and diagnostics.
    pub fn is_consistent(&self) -> bool {
        self.adjacency.iter().all(|(user, friends)| {
            !friends.is_empty()
                && !friends.contains(user)
                && friends.iter().all(|f| self.are_friends(f, user))
        })
    }

    /// All edges as ordered `(low, high)` pairs. Deterministic; used to
    /// compare graphs in tests.
    pub fn edges(&self) -> BTreeSet<(&str, &str)> {
        self.adjacency
            .iter()
            .flat_map(|(user, friends)| {
                friends.iter().filter_map(move |f| {
                    (user.as_str() < f.as_str()).then_some((user.as_str(), f.as_str()))
                })
            })
            .collect()
    }
}
