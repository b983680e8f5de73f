use std::fmt;

use ahash::AHashMap;

use crate::physics::errors::{DeactivationError, Result};
use crate::physics::handles::{ConnectionHandle, MemberHandle};

/// Pair of members whose collidables are touching. The lower handle is always stored first, so a pair reported in
/// either order maps to the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollidablePair {
    pub a: MemberHandle,
    pub b: MemberHandle,
}

impl CollidablePair {
    #[inline(always)]
    pub fn new(a: MemberHandle, b: MemberHandle) -> Self {
        if a <= b {
            Self { a, b }
        } else {
            Self { a: b, b: a }
        }
    }

    #[inline(always)]
    pub fn involves(&self, member: MemberHandle) -> bool {
        self.a == member || self.b == member
    }
}

impl fmt::Display for CollidablePair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}, {}>", self.a.0, self.b.0)
    }
}

/// Cached state of a pair: the connection it produced and whether it was reported this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairCacheEntry {
    pub connection: ConnectionHandle,
    pub(crate) fresh: bool,
}

impl PairCacheEntry {
    #[inline(always)]
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }
}

/// Maps touching pairs to the island connections they produced.
#[derive(Debug, Default)]
pub struct PairCache {
    mapping: AHashMap<CollidablePair, PairCacheEntry>,
}

impl PairCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    #[inline(always)]
    pub fn contains(&self, pair: &CollidablePair) -> bool {
        self.mapping.contains_key(pair)
    }

    pub fn get(&self, pair: &CollidablePair) -> Option<PairCacheEntry> {
        self.mapping.get(pair).copied()
    }

    /// Records the connection for a new pair. The pair starts out fresh since it was just reported.
    pub(crate) fn add(&mut self, pair: CollidablePair, connection: ConnectionHandle) -> Result<()> {
        if self.mapping.contains_key(&pair) {
            return Err(DeactivationError::AlreadyManagedPair(pair.a, pair.b));
        }
        self.mapping.insert(pair, PairCacheEntry { connection, fresh: true });
        Ok(())
    }

    pub(crate) fn remove(&mut self, pair: &CollidablePair) -> Option<ConnectionHandle> {
        self.mapping.remove(pair).map(|entry| entry.connection)
    }

    /// Marks a pair as reported this frame. Returns false if the pair is not cached.
    pub(crate) fn mark_fresh(&mut self, pair: &CollidablePair) -> bool {
        match self.mapping.get_mut(pair) {
            Some(entry) => {
                entry.fresh = true;
                true
            }
            None => false,
        }
    }

    /// Resets every pair to stale ahead of the next frame's reports.
    pub(crate) fn clear_freshness(&mut self) {
        for entry in self.mapping.values_mut() {
            entry.fresh = false;
        }
    }

    /// Forgets every pair involving a member, returning what was removed in pair order.
    pub(crate) fn remove_pairs_involving(&mut self, member: MemberHandle) -> Vec<(CollidablePair, ConnectionHandle)> {
        let mut removed: Vec<_> = self
            .mapping
            .iter()
            .filter(|(pair, _)| pair.involves(member))
            .map(|(&pair, entry)| (pair, entry.connection))
            .collect();
        removed.sort_unstable_by_key(|&(pair, _)| pair);
        for (pair, _) in &removed {
            self.mapping.remove(pair);
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CollidablePair, &PairCacheEntry)> {
        self.mapping.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.mapping.clear();
    }
}
