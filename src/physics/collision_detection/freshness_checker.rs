use crate::physics::collision_detection::pair_cache::{CollidablePair, PairCache};
use crate::physics::deactivation_manager::DeactivationManager;
use crate::physics::handles::{ConnectionHandle, MemberHandle};

/// Finds cached pairs that were not reported during the current frame so their connections can be removed.
///
/// Sleeping bodies are not collision tested, so a pair whose members are all inactive is expected to go unreported
/// and is kept until its island wakes.
#[derive(Debug, Default)]
pub(crate) struct FreshnessChecker {
    stale_pair_count: usize,
}

impl FreshnessChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every stale pair to `stale`, in pair order.
    pub fn check(
        &mut self,
        pair_cache: &PairCache,
        manager: &DeactivationManager,
        stale: &mut Vec<(CollidablePair, ConnectionHandle)>,
    ) {
        let start = stale.len();
        for (&pair, entry) in pair_cache.iter() {
            if entry.is_fresh() {
                continue;
            }
            if Self::is_sleeping(manager, pair.a) && Self::is_sleeping(manager, pair.b) {
                continue;
            }
            stale.push((pair, entry.connection));
        }
        stale[start..].sort_unstable_by_key(|&(pair, _)| pair);
        self.stale_pair_count = stale.len() - start;
    }

    /// Gets the number of stale pairs found by the last check.
    #[inline(always)]
    pub fn stale_pair_count(&self) -> usize {
        self.stale_pair_count
    }

    #[inline(always)]
    fn is_sleeping(manager: &DeactivationManager, member: MemberHandle) -> bool {
        matches!(manager.member(member), Some(member) if !member.is_active())
    }
}
