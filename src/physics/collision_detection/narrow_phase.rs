use ahash::AHashSet;
use log::debug;

use crate::physics::collision_detection::freshness_checker::FreshnessChecker;
use crate::physics::collision_detection::pair_cache::{CollidablePair, PairCache};
use crate::physics::deactivation_manager::DeactivationManager;
use crate::physics::errors::Result;
use crate::physics::handles::{ConnectionHandle, MemberHandle};

/// Connection changes queued by one narrow phase flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub added: usize,
    pub removed: usize,
}

/// Turns the touching pairs reported by collision testing into island connections.
///
/// Pairs are reported every frame while they touch. A newly reported pair queues a connection addition; a cached pair
/// that goes unreported for a frame queues its removal. Changes are handed to the [`DeactivationManager`]'s queue at
/// flush and applied by it before its candidacy pass, additions first.
#[derive(Debug, Default)]
pub struct NarrowPhase {
    pair_cache: PairCache,
    freshness_checker: FreshnessChecker,
    pending_additions: Vec<CollidablePair>,
    pending_removals: Vec<CollidablePair>,
    constraints: AHashSet<ConnectionHandle>,
}

impl NarrowPhase {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn pair_cache(&self) -> &PairCache {
        &self.pair_cache
    }

    /// Gets the number of pair changes waiting for the next flush.
    pub fn pending_change_count(&self) -> usize {
        self.pending_additions.len() + self.pending_removals.len()
    }

    /// Records that two members' collidables are touching this frame.
    pub fn report_touching(&mut self, a: MemberHandle, b: MemberHandle) {
        if a == b {
            return;
        }
        let pair = CollidablePair::new(a, b);
        // The latest report wins over a separation reported earlier in the frame.
        self.pending_removals.retain(|&pending| pending != pair);
        if !self.pair_cache.mark_fresh(&pair) {
            self.pending_additions.push(pair);
        }
    }

    /// Records that two members stopped touching, removing their connection at the next flush without waiting for the
    /// pair to go stale.
    pub fn report_separated(&mut self, a: MemberHandle, b: MemberHandle) {
        self.pending_removals.push(CollidablePair::new(a, b));
    }

    /// Hands every pending pair change to the manager's connection queue and resets freshness for the next frame.
    pub fn flush(&mut self, manager: &mut DeactivationManager) -> Result<FlushSummary> {
        let mut summary = FlushSummary::default();

        let mut removals = Vec::new();
        self.freshness_checker.check(&self.pair_cache, manager, &mut removals);
        let stale_count = self.freshness_checker.stale_pair_count();

        let mut additions = std::mem::take(&mut self.pending_additions);
        additions.sort_unstable();
        additions.dedup();
        for pair in additions {
            if self.pair_cache.contains(&pair) {
                continue;
            }
            let connection = manager.enqueue_add_connection(&[pair.a, pair.b])?;
            self.pair_cache.add(pair, connection)?;
            summary.added += 1;
        }

        for pair in std::mem::take(&mut self.pending_removals) {
            if let Some(entry) = self.pair_cache.get(&pair) {
                removals.push((pair, entry.connection));
            }
        }
        removals.sort_unstable_by_key(|&(pair, _)| pair);
        removals.dedup_by_key(|&mut (pair, _)| pair);
        for (pair, connection) in removals {
            self.pair_cache.remove(&pair);
            manager.enqueue_remove_connection(connection)?;
            summary.removed += 1;
        }

        self.pair_cache.clear_freshness();
        if summary.added > 0 || summary.removed > 0 {
            debug!(
                "Narrow phase flush queued {} pair additions and {} removals ({} stale)",
                summary.added, summary.removed, stale_count
            );
        }
        Ok(summary)
    }

    /// Adds a connection for a constraint. Constraints are not subject to freshness and stay until removed.
    pub fn add_constraint(
        &mut self,
        manager: &mut DeactivationManager,
        members: &[MemberHandle],
    ) -> Result<ConnectionHandle> {
        let connection = manager.add_connection(members)?;
        self.constraints.insert(connection);
        Ok(connection)
    }

    pub fn remove_constraint(&mut self, manager: &mut DeactivationManager, connection: ConnectionHandle) -> Result<()> {
        manager.remove_connection(connection)?;
        self.constraints.remove(&connection);
        Ok(())
    }

    #[inline(always)]
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Forgets everything involving a member that is about to be removed from the manager.
    /// The manager frees the member's connections itself.
    pub fn on_member_removed(&mut self, manager: &DeactivationManager, member: MemberHandle) {
        self.pair_cache.remove_pairs_involving(member);
        self.pending_additions.retain(|pair| !pair.involves(member));
        self.pending_removals.retain(|pair| !pair.involves(member));
        self.constraints.retain(|&connection| {
            manager
                .connection(connection)
                .map_or(false, |connection| !connection.members().contains(&member))
        });
    }

    pub fn clear(&mut self) {
        self.pair_cache.clear();
        self.pending_additions.clear();
        self.pending_removals.clear();
        self.constraints.clear();
    }
}
