//! Per-identity, per-rank FIFO queues of pending invocations.
//!
//! Identity keys are expected to be folded already (see
//! [`crate::casemap::identity_key`]). Empty queues and identities are pruned
//! eagerly so the map only holds live entries.

use super::PendingInvocation;
use crate::rank::Rank;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

type RankQueues = BTreeMap<Rank, VecDeque<PendingInvocation>>;

#[derive(Debug, Default)]
pub struct PendingQueues {
    identities: HashMap<String, RankQueues>,
}

impl PendingQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, identity: &str, rank: Rank, pending: PendingInvocation) {
        self.identities
            .entry(identity.to_string())
            .or_default()
            .entry(rank)
            .or_default()
            .push_back(pending);
    }

    /// Pending entries for one identity across all ranks.
    pub fn len_for(&self, identity: &str) -> usize {
        self.identities
            .get(identity)
            .map(|queues| queues.values().map(VecDeque::len).sum())
            .unwrap_or(0)
    }

    pub fn queue_len(&self, identity: &str, rank: Rank) -> usize {
        self.identities
            .get(identity)
            .and_then(|queues| queues.get(&rank))
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.identities
            .values()
            .flat_map(|queues| queues.values())
            .map(VecDeque::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Identities with at least one pending entry.
    pub fn identities(&self) -> Vec<String> {
        self.identities.keys().cloned().collect()
    }

    /// Remove and return one whole queue, oldest first.
    pub fn take(&mut self, identity: &str, rank: Rank) -> VecDeque<PendingInvocation> {
        let taken = self
            .identities
            .get_mut(identity)
            .and_then(|queues| queues.remove(&rank))
            .unwrap_or_default();
        self.prune(identity);
        taken
    }

    /// Remove the entries of one queue matching `pred`, keeping the order of
    /// both the removed and the remaining entries.
    pub fn take_where<F>(&mut self, identity: &str, rank: Rank, mut pred: F) -> Vec<PendingInvocation>
    where
        F: FnMut(&PendingInvocation) -> bool,
    {
        let mut taken = Vec::new();
        if let Some(queue) = self
            .identities
            .get_mut(identity)
            .and_then(|queues| queues.get_mut(&rank))
        {
            let mut kept = VecDeque::with_capacity(queue.len());
            for pending in queue.drain(..) {
                if pred(&pending) {
                    taken.push(pending);
                } else {
                    kept.push_back(pending);
                }
            }
            *queue = kept;
        }
        self.prune(identity);
        taken
    }

    /// Remove everything pending for one identity, lowest rank first.
    pub fn drain_identity(&mut self, identity: &str) -> Vec<PendingInvocation> {
        self.identities
            .remove(identity)
            .map(|queues| queues.into_values().flatten().collect())
            .unwrap_or_default()
    }

    pub fn drain_all(&mut self) -> Vec<PendingInvocation> {
        self.identities
            .drain()
            .flat_map(|(_, queues)| queues.into_values().flatten())
            .collect()
    }

    /// Remove entries queued more than `timeout` before `now`.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Vec<PendingInvocation> {
        let mut expired = Vec::new();
        for queues in self.identities.values_mut() {
            for queue in queues.values_mut() {
                let mut kept = VecDeque::with_capacity(queue.len());
                for pending in queue.drain(..) {
                    if now.saturating_duration_since(pending.queued_at) >= timeout {
                        expired.push(pending);
                    } else {
                        kept.push_back(pending);
                    }
                }
                *queue = kept;
            }
            queues.retain(|_, queue| !queue.is_empty());
        }
        self.identities.retain(|_, queues| !queues.is_empty());
        expired
    }

    fn prune(&mut self, identity: &str) {
        if let Some(queues) = self.identities.get_mut(identity) {
            queues.retain(|_, queue| !queue.is_empty());
            if queues.is_empty() {
                self.identities.remove(identity);
            }
        }
    }
}
