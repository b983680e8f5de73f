use std::fmt;

use crate::physics::handles::{BodyHandle, MemberHandle};

/// Kind of activity transition a member went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityEventKind {
    /// The member went from sleeping (or a settled kinematic) to active.
    Activated,
    /// The member's motion now qualifies it for sleep, pending the rest of its island.
    BecameCandidate,
    /// The member lost its deactivation candidacy.
    BecameNonCandidate,
    /// The member went to sleep, or a kinematic member settled.
    Deactivated,
}

/// A single activity transition. Events are only recorded for real transitions; repeating a state never emits anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityEvent {
    pub member: MemberHandle,
    pub body: BodyHandle,
    pub kind: ActivityEventKind,
}

impl ActivityEvent {
    #[inline(always)]
    pub fn new(member: MemberHandle, body: BodyHandle, kind: ActivityEventKind) -> Self {
        Self { member, body, kind }
    }
}

impl fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} ({}, {})", self.kind, self.member, self.body)
    }
}

/// Queue of activity transitions, filled during graph mutation and the per-frame passes
/// and drained once per frame by whoever owns the bodies.
///
/// Nothing is invoked re-entrantly while the island graph is being mutated; consumers only see the
/// transitions after the operation that produced them has finished.
#[derive(Debug, Default, Clone)]
pub struct ActivityEvents {
    events: Vec<ActivityEvent>,
}

impl ActivityEvents {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub(crate) fn push(&mut self, member: MemberHandle, body: BodyHandle, kind: ActivityEventKind) {
        self.events.push(ActivityEvent::new(member, body, kind));
    }

    #[inline(always)]
    pub(crate) fn append(&mut self, events: &mut Vec<ActivityEvent>) {
        self.events.append(events);
    }

    /// Gets the events recorded since the last drain.
    pub fn as_slice(&self) -> &[ActivityEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Removes and returns every recorded event in the order the transitions happened.
    pub fn drain(&mut self) -> std::vec::Drain<'_, ActivityEvent> {
        self.events.drain(..)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Counts the recorded events of a kind for a member.
    pub fn count_for(&self, member: MemberHandle, kind: ActivityEventKind) -> usize {
        self.events
            .iter()
            .filter(|event| event.member == member && event.kind == kind)
            .count()
    }
}
