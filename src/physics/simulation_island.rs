use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::physics::handles::{IslandHandle, MemberHandle};

/// A connected component of dynamic members that sleeps and wakes as a unit.
///
/// Islands form a union-find forest through `immediate_parent`. Merging moves the smaller island's members into the
/// larger one and points the smaller island at it, so member island references may lag behind until they are compressed.
/// Only root islands ever hold members.
#[derive(Debug)]
pub struct SimulationIsland {
    pub(crate) members: Vec<MemberHandle>,
    pub(crate) is_active: bool,
    pub(crate) immediate_parent: AtomicI32,
    /// Cleared during the candidacy pass by active kinematic neighbors.
    pub(crate) allow_deactivation: AtomicBool,
    /// False while the island sits in the pool.
    pub(crate) in_use: bool,
}

impl SimulationIsland {
    pub(crate) fn new(handle: IslandHandle) -> Self {
        Self {
            members: Vec::new(),
            is_active: true,
            immediate_parent: AtomicI32::new(handle.0),
            allow_deactivation: AtomicBool::new(true),
            in_use: false,
        }
    }

    /// Prepares a pooled island for reuse as a fresh root.
    pub(crate) fn reset(&mut self, handle: IslandHandle, is_active: bool) {
        debug_assert!(self.members.is_empty(), "Only empty islands can be reset.");
        self.members.clear();
        self.is_active = is_active;
        *self.immediate_parent.get_mut() = handle.0;
        *self.allow_deactivation.get_mut() = true;
        self.in_use = true;
    }

    #[inline(always)]
    pub fn members(&self) -> &[MemberHandle] {
        &self.members
    }

    #[inline(always)]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[inline(always)]
    pub fn allow_deactivation(&self) -> bool {
        self.allow_deactivation.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub(crate) fn parent(&self) -> IslandHandle {
        IslandHandle(self.immediate_parent.load(Ordering::Relaxed))
    }
}

/// Follows parent links to the root island, halving the path as it goes.
///
/// Safe to run concurrently: every store replaces a parent with one of its own ancestors,
/// so any interleaving still leaves each link pointing somewhere along the same chain.
pub(crate) fn find_root(islands: &[SimulationIsland], handle: IslandHandle) -> IslandHandle {
    let mut current = handle;
    loop {
        let parent = islands[current.index()].parent();
        if parent == current {
            return current;
        }
        let grandparent = islands[parent.index()].parent();
        if grandparent != parent {
            islands[current.index()]
                .immediate_parent
                .store(grandparent.0, Ordering::Relaxed);
        }
        current = grandparent;
    }
}
