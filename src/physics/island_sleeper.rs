use log::{debug, trace};

use crate::physics::activity_events::ActivityEventKind;
use crate::physics::deactivation_manager::DeactivationManager;
use crate::physics::errors::Result;
use crate::physics::handles::{IslandHandle, MemberHandle};

/// Work done by one sleep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SleepPassSummary {
    /// Islands examined, including reclaimed orphans.
    pub examined_islands: usize,
    /// Islands that went to sleep.
    pub slept_islands: usize,
    /// Empty islands returned to the pool.
    pub reclaimed_islands: usize,
    /// Budget consumed, in members.
    pub budget_used: usize,
}

impl DeactivationManager {
    /// Puts islands to sleep, working round robin through the island list from where the last pass stopped.
    ///
    /// At most `maximum_deactivations_per_frame` members worth of islands are examined. Every examined island is
    /// charged its full member count whether or not it sleeps, and an emptied island is charged one as it is
    /// reclaimed. Each pass examines no more islands than the list held when it started.
    ///
    /// Reclaiming an island lets its slot be reused, so no member may still reach it through a stale reference.
    /// [`DeactivationManager::update`] guarantees that by running the candidacy pass immediately beforehand.
    pub(crate) fn sleep_pass(&mut self) -> SleepPassSummary {
        let budget = self.settings().maximum_deactivations_per_frame.max(1);
        let mut summary = SleepPassSummary::default();
        let mut remaining_visits = self.island_list.len();

        while remaining_visits > 0 && summary.budget_used < budget && !self.island_list.is_empty() {
            remaining_visits -= 1;
            if self.sleep_cursor >= self.island_list.len() {
                self.sleep_cursor = 0;
            }
            let island = self.island_list[self.sleep_cursor];
            summary.examined_islands += 1;

            let member_count = self.islands[island.index()].members.len();
            if member_count == 0 {
                // The cursor stays put; the island swapped into this slot is examined next.
                self.island_list.swap_remove(self.sleep_cursor);
                self.release_island(island);
                summary.reclaimed_islands += 1;
                summary.budget_used += 1;
                trace!("Reclaimed orphaned {}", island);
                continue;
            }

            summary.budget_used += member_count;
            self.sleep_cursor += 1;
            if self.can_sleep(island) {
                self.sleep_island(island);
                summary.slept_islands += 1;
            }
        }

        if summary.slept_islands > 0 || summary.reclaimed_islands > 0 {
            debug!(
                "Sleep pass examined {} islands: {} slept, {} reclaimed",
                summary.examined_islands, summary.slept_islands, summary.reclaimed_islands
            );
        }
        summary
    }

    /// Puts the island holding a member to sleep immediately, regardless of candidacy.
    /// Kinematic members have no island and are left alone.
    pub fn force_sleep(&mut self, member: MemberHandle) -> Result<()> {
        self.member_ref(member)?;
        if let Some(island) = self.root_of(member) {
            if self.islands[island.index()].is_active {
                self.sleep_island(island);
            }
        }
        Ok(())
    }

    fn can_sleep(&self, island: IslandHandle) -> bool {
        let island_ref = &self.islands[island.index()];
        island_ref.is_active
            && island_ref.allow_deactivation()
            && island_ref
                .members
                .iter()
                .all(|&member| matches!(self.member(member), Some(member) if member.is_deactivation_candidate()))
    }

    fn sleep_island(&mut self, island: IslandHandle) {
        self.islands[island.index()].is_active = false;
        for i in 0..self.islands[island.index()].members.len() {
            let member = self.islands[island.index()].members[i];
            let member_mut = self.member_mut_unchecked(member);
            let owner = member_mut.owner;
            let activity = member_mut.activity.get_mut();
            if activity.is_active {
                activity.is_active = false;
                self.events.push(member, owner, ActivityEventKind::Deactivated);
            }
        }
        trace!("{} went to sleep", island);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body_properties::BodyVelocity;
    use crate::physics::deactivation_settings::DeactivationSettings;
    use crate::physics::handles::BodyHandle;

    fn settings(budget: usize) -> DeactivationSettings {
        DeactivationSettings::default()
            .with_low_velocity_time_minimum(0.25)
            .with_maximum_deactivations_per_frame(budget)
    }

    #[test]
    fn budget_limits_islands_examined_per_pass() {
        let mut manager = DeactivationManager::new(settings(2)).unwrap();
        let members: Vec<_> = (0..6)
            .map(|i| manager.add_member(BodyHandle(i), true).unwrap())
            .collect();
        let still = |_: BodyHandle| BodyVelocity::default();
        for _ in 0..5 {
            manager.update_candidacy(0.1, &still, None);
        }
        let summary = manager.sleep_pass();
        assert_eq!(summary.examined_islands, 2);
        assert_eq!(summary.slept_islands, 2);
        assert_eq!(manager.active_island_count(), 4);

        manager.sleep_pass();
        manager.sleep_pass();
        assert_eq!(manager.active_island_count(), 0);
        for &member in &members {
            assert!(!manager.is_member_active(member).unwrap());
        }
        manager.validate();
    }

    #[test]
    fn large_islands_still_make_progress() {
        let mut manager = DeactivationManager::new(settings(1)).unwrap();
        let members: Vec<_> = (0..4)
            .map(|i| manager.add_member(BodyHandle(i), true).unwrap())
            .collect();
        for pair in members.windows(2) {
            manager.add_connection(pair).unwrap();
        }
        // A moving frame compresses the stale references left by the merges without producing candidates,
        // after which the absorbed islands can be reclaimed.
        let moving = |_: BodyHandle| BodyVelocity::from_linear(glam::Vec3::X);
        manager.update_candidacy(0.1, &moving, None);
        while manager.island_count() > 1 {
            let summary = manager.sleep_pass();
            assert_eq!(summary.slept_islands, 0);
        }

        let still = |_: BodyHandle| BodyVelocity::default();
        for _ in 0..5 {
            manager.update_candidacy(0.1, &still, None);
        }
        let summary = manager.sleep_pass();
        assert_eq!(summary.slept_islands, 1);
        assert_eq!(summary.budget_used, 4);
    }

    #[test]
    fn force_sleep_ignores_candidacy() {
        let mut manager = DeactivationManager::new(settings(10)).unwrap();
        let a = manager.add_member(BodyHandle(0), true).unwrap();
        let kinematic = manager.add_member(BodyHandle(1), false).unwrap();
        manager.force_sleep(a).unwrap();
        manager.force_sleep(kinematic).unwrap();
        assert!(!manager.is_member_active(a).unwrap());
        assert!(manager.is_member_active(kinematic).unwrap());
        assert_eq!(manager.events().count_for(a, ActivityEventKind::Deactivated), 1);
        manager.force_sleep(a).unwrap();
        assert_eq!(manager.events().count_for(a, ActivityEventKind::Deactivated), 1);
    }
}
