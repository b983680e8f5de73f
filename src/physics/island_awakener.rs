use log::trace;

use crate::physics::activity_events::ActivityEventKind;
use crate::physics::deactivation_manager::DeactivationManager;
use crate::physics::errors::{DeactivationError, Result};
use crate::physics::handles::{BodyHandle, IslandHandle, MemberHandle};
use crate::physics::simulation_island::find_root;

impl DeactivationManager {
    /// Wakes a member as if something external disturbed it. Its low velocity time is forgotten and, for a dynamic
    /// member, its whole island wakes with it.
    pub fn activate(&mut self, member: MemberHandle) -> Result<()> {
        let member_mut = self.member_mut(member)?;
        let owner = member_mut.owner;
        let is_dynamic = member_mut.is_dynamic;
        let activity = member_mut.activity.get_mut();
        let transition = activity.reset();
        let woke_kinematic = !is_dynamic && !std::mem::replace(&mut activity.is_active, true);
        if let Some(kind) = transition {
            self.events.push(member, owner, kind);
        }
        if woke_kinematic {
            self.events.push(member, owner, ActivityEventKind::Activated);
        }
        if let Some(island) = self.root_of(member) {
            self.activate_island(island);
        }
        Ok(())
    }

    /// Wakes the member tracking a body.
    pub fn activate_body(&mut self, body: BodyHandle) -> Result<()> {
        let member = self
            .member_for_body(body)
            .ok_or(DeactivationError::BodyNotManaged(body))?;
        self.activate(member)
    }

    /// Wakes an island and every member in it. Does nothing if the island is already awake.
    pub fn activate_island(&mut self, island: IslandHandle) {
        match self.islands.get(island.index()) {
            Some(candidate) if candidate.in_use => {}
            _ => return,
        }
        let root = find_root(&self.islands, island);
        if self.islands[root.index()].is_active {
            return;
        }
        self.islands[root.index()].is_active = true;
        for i in 0..self.islands[root.index()].members.len() {
            let member = self.islands[root.index()].members[i];
            self.wake_member(member);
        }
        trace!("{} woke up", root);
    }

    pub(crate) fn activate_islands(&mut self, islands: &[IslandHandle]) {
        for &island in islands {
            self.activate_island(island);
        }
    }

    /// Marks a single member active, recording the transition if it was asleep.
    pub(crate) fn wake_member(&mut self, member: MemberHandle) {
        let member_mut = self.member_mut_unchecked(member);
        let owner = member_mut.owner;
        let activity = member_mut.activity.get_mut();
        if !activity.is_active {
            activity.is_active = true;
            self.events.push(member, owner, ActivityEventKind::Activated);
        }
    }
}
