use crate::physics::handles::MemberHandle;

/// Graph edge representing a live contact or constraint between two or more members.
///
/// Connections never store an island; the island of a connection is whatever island its members share.
#[derive(Debug, Clone)]
pub struct SimulationIslandConnection {
    pub(crate) members: Vec<MemberHandle>,
    /// Set while the connection is being torn down so traversals stop treating it as an edge.
    pub(crate) slated_for_removal: bool,
    /// False while the connection is queued for the next flush and not yet part of the graph.
    pub(crate) is_linked: bool,
}

impl SimulationIslandConnection {
    pub(crate) fn new(members: Vec<MemberHandle>) -> Self {
        Self {
            members,
            slated_for_removal: false,
            is_linked: false,
        }
    }

    /// Gets the members joined by the connection, in the order they were supplied.
    #[inline(always)]
    pub fn members(&self) -> &[MemberHandle] {
        &self.members
    }

    #[inline(always)]
    pub fn is_slated_for_removal(&self) -> bool {
        self.slated_for_removal
    }

    /// Gets whether the connection currently participates in the island graph.
    #[inline(always)]
    pub fn is_live(&self) -> bool {
        self.is_linked && !self.slated_for_removal
    }

    /// Gets the members of the connection without repeats, keeping first-seen order.
    pub(crate) fn distinct_members(&self) -> Vec<MemberHandle> {
        let mut distinct = Vec::with_capacity(self.members.len());
        for &member in &self.members {
            if !distinct.contains(&member) {
                distinct.push(member);
            }
        }
        distinct
    }
}
