use crate::physics::activity_events::{ActivityEvent, ActivityEventKind};
use crate::physics::deactivation_settings::DeactivationSettings;
use crate::physics::handles::{BodyHandle, ConnectionHandle, IslandHandle, MemberHandle};
use crate::physics::spin_lock::SpinLock;

/// Ownership mark used while a split attempt floods the graph from both ends of a removed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchState {
    #[default]
    Unclaimed,
    OwnedByFirst,
    OwnedBySecond,
}

impl SearchState {
    #[inline(always)]
    pub(crate) fn opposite(self) -> SearchState {
        match self {
            SearchState::OwnedByFirst => SearchState::OwnedBySecond,
            SearchState::OwnedBySecond => SearchState::OwnedByFirst,
            SearchState::Unclaimed => SearchState::Unclaimed,
        }
    }
}

/// Motion history used to decide whether a member may go to sleep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MemberActivity {
    /// For dynamic members this mirrors the owning island. Kinematic members own the flag outright.
    pub is_active: bool,
    pub is_deactivation_candidate: bool,
    /// Dynamic members accumulate seconds spent below the velocity limit.
    /// Kinematic members only use it as a one frame delay flag.
    pub velocity_time_below_limit: f32,
    pub previous_velocity_squared: f32,
    pub is_slowing: bool,
}

impl Default for MemberActivity {
    fn default() -> Self {
        Self {
            is_active: true,
            is_deactivation_candidate: false,
            velocity_time_below_limit: 0.0,
            previous_velocity_squared: f32::MAX,
            is_slowing: false,
        }
    }
}

impl MemberActivity {
    /// Advances the candidacy hysteresis of a dynamic member by one frame.
    /// Returns the candidacy transition, if any.
    pub fn update_dynamic(
        &mut self,
        velocity_squared: f32,
        dt: f32,
        settings: &DeactivationSettings,
        is_always_active: bool,
    ) -> Option<ActivityEventKind> {
        let was_candidate = self.is_deactivation_candidate;

        self.is_slowing = !settings.use_stabilization || velocity_squared <= self.previous_velocity_squared;
        self.previous_velocity_squared = velocity_squared;

        if velocity_squared < settings.velocity_lower_limit_squared() {
            self.velocity_time_below_limit += dt;
        } else {
            self.velocity_time_below_limit = 0.0;
        }

        if is_always_active {
            self.is_deactivation_candidate = false;
        } else if !was_candidate {
            if self.velocity_time_below_limit > settings.low_velocity_time_minimum && self.is_slowing {
                self.is_deactivation_candidate = true;
            }
        } else if self.velocity_time_below_limit <= settings.low_velocity_time_minimum {
            self.is_deactivation_candidate = false;
        }

        self.candidacy_transition(was_candidate)
    }

    /// Advances a kinematic member by one frame. A kinematic must be motionless for a full frame before it is
    /// treated as settled, which gives everything resting on it one frame to react to its stop.
    pub fn update_kinematic(
        &mut self,
        velocity_is_zero: bool,
        dt: f32,
        member: MemberHandle,
        owner: BodyHandle,
        events: &mut Vec<ActivityEvent>,
    ) {
        let was_candidate = self.is_deactivation_candidate;
        if velocity_is_zero {
            if self.velocity_time_below_limit > 0.0 {
                self.is_deactivation_candidate = true;
            } else {
                self.velocity_time_below_limit += dt;
            }
        } else {
            self.velocity_time_below_limit = 0.0;
            self.is_deactivation_candidate = false;
        }

        if let Some(kind) = self.candidacy_transition(was_candidate) {
            events.push(ActivityEvent::new(member, owner, kind));
        }
        let should_be_active = !self.is_deactivation_candidate;
        if should_be_active != self.is_active {
            self.is_active = should_be_active;
            let kind = if should_be_active {
                ActivityEventKind::Activated
            } else {
                ActivityEventKind::Deactivated
            };
            events.push(ActivityEvent::new(member, owner, kind));
        }
    }

    /// Forgets accumulated low velocity time, as happens when something external disturbs the body.
    /// Returns the candidacy transition, if any.
    pub fn reset(&mut self) -> Option<ActivityEventKind> {
        let was_candidate = self.is_deactivation_candidate;
        self.velocity_time_below_limit = 0.0;
        self.is_deactivation_candidate = false;
        self.candidacy_transition(was_candidate)
    }

    #[inline(always)]
    fn candidacy_transition(&self, was_candidate: bool) -> Option<ActivityEventKind> {
        match (was_candidate, self.is_deactivation_candidate) {
            (false, true) => Some(ActivityEventKind::BecameCandidate),
            (true, false) => Some(ActivityEventKind::BecameNonCandidate),
            _ => None,
        }
    }
}

/// Graph node wrapping one body's activity state.
///
/// Only the island pointer and the activity block are touched by the parallel candidacy pass, and both sit
/// behind their own [`SpinLock`]. Everything else is mutated by the single threaded graph code through `&mut`.
#[derive(Debug)]
pub struct SimulationIslandMember {
    pub(crate) owner: BodyHandle,
    pub(crate) connections: Vec<ConnectionHandle>,
    /// Possibly stale island reference; follow `immediate_parent` links to get the live island.
    pub(crate) island: SpinLock<Option<IslandHandle>>,
    /// Index of the member within its island's member list.
    pub(crate) index_in_island: usize,
    pub(crate) is_dynamic: bool,
    pub(crate) is_always_active: bool,
    pub(crate) activity: SpinLock<MemberActivity>,
    pub(crate) search_state: SearchState,
}

impl SimulationIslandMember {
    pub(crate) fn new(owner: BodyHandle, is_dynamic: bool) -> Self {
        Self {
            owner,
            connections: Vec::new(),
            island: SpinLock::new(None),
            index_in_island: usize::MAX,
            is_dynamic,
            is_always_active: false,
            activity: SpinLock::new(MemberActivity::default()),
            search_state: SearchState::Unclaimed,
        }
    }

    /// Gets the body this member tracks.
    #[inline(always)]
    pub fn owner(&self) -> BodyHandle {
        self.owner
    }

    #[inline(always)]
    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    #[inline(always)]
    pub fn is_always_active(&self) -> bool {
        self.is_always_active
    }

    /// Gets the connections touching this member, in no particular order.
    #[inline(always)]
    pub fn connections(&self) -> &[ConnectionHandle] {
        &self.connections
    }

    #[inline(always)]
    pub fn search_state(&self) -> SearchState {
        self.search_state
    }

    pub fn is_active(&self) -> bool {
        self.activity.lock().is_active
    }

    pub fn is_deactivation_candidate(&self) -> bool {
        self.activity.lock().is_deactivation_candidate
    }

    pub fn velocity_time_below_limit(&self) -> f32 {
        self.activity.lock().velocity_time_below_limit
    }

    pub(crate) fn remove_connection(&mut self, connection: ConnectionHandle) {
        if let Some(index) = self.connections.iter().position(|&c| c == connection) {
            self.connections.swap_remove(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DeactivationSettings {
        DeactivationSettings::default()
            .with_velocity_lower_limit(1.0)
            .with_low_velocity_time_minimum(0.5)
    }

    #[test]
    fn slow_member_becomes_candidate_after_time_minimum() {
        let settings = settings();
        let mut activity = MemberActivity::default();
        let dt = 0.1;
        let mut transitions = Vec::new();
        for _ in 0..10 {
            if let Some(kind) = activity.update_dynamic(0.25, dt, &settings, false) {
                transitions.push(kind);
            }
        }
        assert!(activity.is_deactivation_candidate);
        assert_eq!(transitions, vec![ActivityEventKind::BecameCandidate]);
    }

    #[test]
    fn speeding_up_revokes_candidacy() {
        let settings = settings();
        let mut activity = MemberActivity::default();
        for _ in 0..10 {
            activity.update_dynamic(0.0, 0.1, &settings, false);
        }
        assert!(activity.is_deactivation_candidate);
        let transition = activity.update_dynamic(4.0, 0.1, &settings, false);
        assert_eq!(transition, Some(ActivityEventKind::BecameNonCandidate));
        assert_eq!(activity.velocity_time_below_limit, 0.0);
    }

    #[test]
    fn accelerating_member_is_held_back_by_stabilization() {
        let settings = settings();
        let mut activity = MemberActivity::default();
        // Below the limit the whole time, but always a little faster than the frame before.
        for i in 0..20 {
            activity.update_dynamic(0.01 * i as f32, 0.1, &settings, false);
        }
        assert!(!activity.is_deactivation_candidate);

        let mut unstabilized = MemberActivity::default();
        let settings = settings.with_stabilization(false);
        for i in 0..20 {
            unstabilized.update_dynamic(0.01 * i as f32, 0.1, &settings, false);
        }
        assert!(unstabilized.is_deactivation_candidate);
    }

    #[test]
    fn always_active_members_never_become_candidates() {
        let settings = settings();
        let mut activity = MemberActivity::default();
        for _ in 0..20 {
            assert_eq!(activity.update_dynamic(0.0, 0.1, &settings, true), None);
        }
        assert!(!activity.is_deactivation_candidate);
    }

    #[test]
    fn kinematic_settles_after_one_still_frame() {
        let mut activity = MemberActivity::default();
        let mut events = Vec::new();
        let member = MemberHandle(0);
        let owner = BodyHandle(7);

        activity.update_kinematic(true, 0.1, member, owner, &mut events);
        assert!(activity.is_active);
        assert!(events.is_empty());

        activity.update_kinematic(true, 0.1, member, owner, &mut events);
        assert!(!activity.is_active);
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ActivityEventKind::BecameCandidate, ActivityEventKind::Deactivated]
        );

        events.clear();
        activity.update_kinematic(false, 0.1, member, owner, &mut events);
        assert!(activity.is_active);
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ActivityEventKind::BecameNonCandidate, ActivityEventKind::Activated]
        );
    }

    #[test]
    fn opposite_sides() {
        assert_eq!(SearchState::OwnedByFirst.opposite(), SearchState::OwnedBySecond);
        assert_eq!(SearchState::OwnedBySecond.opposite(), SearchState::OwnedByFirst);
    }
}
