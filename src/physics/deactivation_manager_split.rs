use std::collections::VecDeque;

use ahash::AHashSet;
use log::debug;

use crate::physics::deactivation_manager::DeactivationManager;
use crate::physics::handles::{IslandHandle, MemberHandle};
use crate::physics::simulation_island::find_root;
use crate::physics::simulation_island_member::SearchState;

/// Result of a split attempt between two members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitOutcome {
    /// The members were not in the same island (or one of them has no island), so there was nothing to test.
    Skipped,
    /// The searches from both members met; the island is still one component.
    StillConnected,
    /// One side was cut off and moved into a new island.
    Split { new_island: IslandHandle },
}

/// Frontiers and visited lists reused by every split attempt.
#[derive(Debug, Default)]
pub(crate) struct SplitScratch {
    first_frontier: VecDeque<MemberHandle>,
    second_frontier: VecDeque<MemberHandle>,
    first_visited: Vec<MemberHandle>,
    second_visited: Vec<MemberHandle>,
}

impl SplitScratch {
    #[inline(always)]
    fn frontier(&mut self, side: SearchState) -> &mut VecDeque<MemberHandle> {
        match side {
            SearchState::OwnedBySecond => &mut self.second_frontier,
            _ => &mut self.first_frontier,
        }
    }

    #[inline(always)]
    fn visited(&mut self, side: SearchState) -> &mut Vec<MemberHandle> {
        match side {
            SearchState::OwnedBySecond => &mut self.second_visited,
            _ => &mut self.first_visited,
        }
    }
}

impl DeactivationManager {
    /// Tests whether two members of the same island are still connected once slated connections are ignored,
    /// splitting the island if they are not.
    ///
    /// Both members flood the graph breadth first, one node at a time in alternation. If either flood reaches a
    /// member claimed by the other, they are still connected. If one side runs out of members to expand first, that
    /// side is cut off and moves into a new island, leaving the rest behind. Members without an island are dead ends.
    pub fn try_split(&mut self, a: MemberHandle, b: MemberHandle) -> SplitOutcome {
        if a == b {
            return SplitOutcome::Skipped;
        }
        let (Some(root_a), Some(root_b)) = (self.root_of(a), self.root_of(b)) else {
            return SplitOutcome::Skipped;
        };
        if root_a != root_b {
            return SplitOutcome::Skipped;
        }

        let mut scratch = std::mem::take(&mut self.split_scratch);
        self.claim(&mut scratch, a, SearchState::OwnedByFirst);
        self.claim(&mut scratch, b, SearchState::OwnedBySecond);

        let isolated = 'search: loop {
            for side in [SearchState::OwnedByFirst, SearchState::OwnedBySecond] {
                let Some(node) = scratch.frontier(side).pop_front() else {
                    break 'search Some(side);
                };
                if self.expand(&mut scratch, node, side) {
                    break 'search None;
                }
            }
        };

        let outcome = match isolated {
            Some(side) => {
                let island = &self.islands[root_a.index()];
                let (is_active, allow_deactivation) = (island.is_active, island.allow_deactivation());
                let new_island = self.allocate_island(is_active);
                *self.islands[new_island.index()].allow_deactivation.get_mut() = allow_deactivation;
                let isolated_members = std::mem::take(scratch.visited(side));
                for &member in &isolated_members {
                    self.remove_from_island(member, root_a);
                    self.attach_to_island(member, new_island);
                }
                *scratch.visited(side) = isolated_members;
                debug!(
                    "Split {} members of {} into {}",
                    self.islands[new_island.index()].members.len(),
                    root_a,
                    new_island
                );
                SplitOutcome::Split { new_island }
            }
            None => SplitOutcome::StillConnected,
        };

        // Every exit path above lands here, so claimed members always go back to unclaimed.
        for &member in scratch.first_visited.iter().chain(scratch.second_visited.iter()) {
            self.member_mut_unchecked(member).search_state = SearchState::Unclaimed;
        }
        scratch.first_frontier.clear();
        scratch.second_frontier.clear();
        scratch.first_visited.clear();
        scratch.second_visited.clear();
        self.split_scratch = scratch;
        outcome
    }

    #[inline(always)]
    fn claim(&mut self, scratch: &mut SplitScratch, member: MemberHandle, side: SearchState) {
        self.member_mut_unchecked(member).search_state = side;
        scratch.frontier(side).push_back(member);
        scratch.visited(side).push(member);
    }

    /// Claims the unclaimed neighbors of `node` for `side`. Returns true if a neighbor owned by the other side was found.
    fn expand(&mut self, scratch: &mut SplitScratch, node: MemberHandle, side: SearchState) -> bool {
        let opposite = side.opposite();
        let connection_count = self.member_mut_unchecked(node).connections.len();
        for i in 0..connection_count {
            let connection = self.member_mut_unchecked(node).connections[i];
            let Some(Some(connection)) = self.connections.get(connection.index()) else {
                continue;
            };
            if connection.slated_for_removal {
                continue;
            }
            for &neighbor in &connection.members {
                if neighbor == node {
                    continue;
                }
                let Some(neighbor_member) = self.members[neighbor.index()].as_mut() else {
                    continue;
                };
                if neighbor_member.island.get_mut().is_none() {
                    continue;
                }
                let state = neighbor_member.search_state;
                if state == opposite {
                    return true;
                }
                if state == SearchState::Unclaimed {
                    neighbor_member.search_state = side;
                    scratch.frontier(side).push_back(neighbor);
                    scratch.visited(side).push(neighbor);
                }
            }
        }
        false
    }

    /// Checks an island against the connectivity of its members and splits it into one island per connected
    /// component. The first component keeps the island. Returns the newly created islands.
    ///
    /// Split attempts after a member removal only test one representative per removed connection, which can leave
    /// an island holding more than one component. This is the exhaustive check for when that matters.
    pub fn revalidate_island(&mut self, island: IslandHandle) -> Vec<IslandHandle> {
        let mut created = Vec::new();
        match self.islands.get(island.index()) {
            Some(candidate) if candidate.in_use => {}
            _ => return created,
        }
        let root = find_root(&self.islands, island);
        let members = self.islands[root.index()].members.clone();
        if members.len() < 2 {
            return created;
        }

        let mut visited: AHashSet<MemberHandle> = AHashSet::with_capacity(members.len());
        let mut stack = Vec::new();
        let mut components: Vec<Vec<MemberHandle>> = Vec::new();
        for &start in &members {
            if !visited.insert(start) {
                continue;
            }
            let mut component = vec![start];
            stack.push(start);
            while let Some(node) = stack.pop() {
                let Some(member) = self.member(node) else {
                    continue;
                };
                for &connection in &member.connections {
                    let Some(connection) = self.connection(connection) else {
                        continue;
                    };
                    if connection.slated_for_removal {
                        continue;
                    }
                    for &neighbor in &connection.members {
                        if self.root_of(neighbor).is_some() && visited.insert(neighbor) {
                            component.push(neighbor);
                            stack.push(neighbor);
                        }
                    }
                }
            }
            components.push(component);
        }

        let is_active = self.islands[root.index()].is_active;
        for component in components.into_iter().skip(1) {
            let new_island = self.allocate_island(is_active);
            for &member in &component {
                self.remove_from_island(member, root);
                self.attach_to_island(member, new_island);
            }
            created.push(new_island);
        }
        if !created.is_empty() {
            debug!("Revalidation split {} into {} extra islands", root, created.len());
        }
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::deactivation_settings::DeactivationSettings;
    use crate::physics::handles::BodyHandle;

    fn manager_with(count: i32) -> (DeactivationManager, Vec<MemberHandle>) {
        let mut manager = DeactivationManager::new(DeactivationSettings::default()).unwrap();
        let members = (0..count)
            .map(|i| manager.add_member(BodyHandle(i), true).unwrap())
            .collect();
        (manager, members)
    }

    #[test]
    fn members_in_different_islands_are_skipped() {
        let (mut manager, members) = manager_with(2);
        assert_eq!(manager.try_split(members[0], members[1]), SplitOutcome::Skipped);
        assert_eq!(manager.try_split(members[0], members[0]), SplitOutcome::Skipped);
    }

    #[test]
    fn cycle_stays_connected_when_one_edge_is_slated() {
        let (mut manager, m) = manager_with(4);
        let ring: Vec<_> = (0..4)
            .map(|i| manager.add_connection(&[m[i], m[(i + 1) % 4]]).unwrap())
            .collect();
        manager.connections[ring[0].index()].as_mut().unwrap().slated_for_removal = true;
        assert_eq!(manager.try_split(m[0], m[1]), SplitOutcome::StillConnected);
        manager.connections[ring[0].index()].as_mut().unwrap().slated_for_removal = false;
        for &member in &m {
            assert_eq!(manager.search_state(member).unwrap(), SearchState::Unclaimed);
        }
        manager.validate();
    }

    #[test]
    fn revalidation_finds_every_component() {
        let (mut manager, m) = manager_with(5);
        // A star through m[0] holding three arms together.
        manager.add_connection(&[m[0], m[1]]).unwrap();
        manager.add_connection(&[m[0], m[2]]).unwrap();
        manager.add_connection(&[m[0], m[3]]).unwrap();
        manager.add_connection(&[m[3], m[4]]).unwrap();
        let island = manager.island_of(m[1]).unwrap().unwrap();
        assert!(manager.revalidate_island(island).is_empty());

        // Turning the hub kinematic without split attempts would leave one island holding three components.
        let root = manager.island_of(m[0]).unwrap().unwrap();
        manager.remove_from_island(m[0], root);
        manager.member_mut_unchecked(m[0]).is_dynamic = false;
        let created = manager.revalidate_island(root);
        assert_eq!(created.len(), 2);
        assert_eq!(manager.island_of(m[3]).unwrap(), manager.island_of(m[4]).unwrap());
        assert_ne!(manager.island_of(m[1]).unwrap(), manager.island_of(m[2]).unwrap());
        assert_ne!(manager.island_of(m[1]).unwrap(), manager.island_of(m[3]).unwrap());
        manager.validate();
    }
}
