use std::ops::Range;
use std::sync::atomic::Ordering;

use log::trace;

use crate::physics::activity_events::ActivityEvent;
use crate::physics::body_properties::IBodyActivitySource;
use crate::physics::deactivation_manager::DeactivationManager;
use crate::physics::deactivation_settings::DeactivationSettings;
use crate::physics::handles::MemberHandle;
use crate::physics::simulation_island::{find_root, SimulationIsland};
use crate::physics::simulation_island_connection::SimulationIslandConnection;
use crate::physics::simulation_island_member::SimulationIslandMember;
use crate::physics::spin_lock::SpinLock;
use crate::utilities::thread_dispatcher::{IThreadDispatcher, JobCounter};

/// Read-only view of the graph shared by every worker of the candidacy pass.
struct CandidacyContext<'a, B: ?Sized> {
    members: &'a [Option<SimulationIslandMember>],
    connections: &'a [Option<SimulationIslandConnection>],
    islands: &'a [SimulationIsland],
    settings: &'a DeactivationSettings,
    bodies: &'a B,
    dt: f32,
}

impl<B: IBodyActivitySource + ?Sized> CandidacyContext<'_, B> {
    fn update_range(&self, range: Range<usize>, events: &mut Vec<ActivityEvent>) {
        for index in range {
            if let Some(member) = &self.members[index] {
                self.update_member(MemberHandle(index as i32), member, events);
            }
        }
    }

    fn update_member(&self, handle: MemberHandle, member: &SimulationIslandMember, events: &mut Vec<ActivityEvent>) {
        let root = {
            let mut island = member.island.lock();
            let root = island.map(|island_handle| find_root(self.islands, island_handle));
            if root.is_some() {
                *island = root;
            }
            root
        };

        let velocity = self.bodies.velocity(member.owner);
        if member.is_dynamic {
            let Some(root) = root else {
                debug_assert!(false, "Dynamic members always belong to an island.");
                return;
            };
            // Sleeping members are not simulated, so their motion history is frozen until they wake.
            if !self.islands[root.index()].is_active {
                return;
            }
            let mut activity = member.activity.lock();
            if let Some(kind) =
                activity.update_dynamic(velocity.speed_squared(), self.dt, self.settings, member.is_always_active)
            {
                events.push(ActivityEvent::new(handle, member.owner, kind));
            }
        } else {
            let is_active = {
                let mut activity = member.activity.lock();
                let is_still = velocity.is_zero() && !member.is_always_active;
                activity.update_kinematic(is_still, self.dt, handle, member.owner, events);
                activity.is_active
            };
            if is_active {
                self.veto_neighbor_islands(handle, member);
            }
        }
    }

    /// Kinematics never get an island of their own, so a moving kinematic keeps everything it touches awake by
    /// clearing the deactivation permission of each neighbor's island.
    fn veto_neighbor_islands(&self, handle: MemberHandle, member: &SimulationIslandMember) {
        for &connection in &member.connections {
            let Some(Some(connection)) = self.connections.get(connection.index()) else {
                continue;
            };
            if !connection.is_live() {
                continue;
            }
            for &neighbor in &connection.members {
                if neighbor == handle {
                    continue;
                }
                let Some(Some(neighbor_member)) = self.members.get(neighbor.index()) else {
                    continue;
                };
                if let Some(island) = neighbor_member.island.load() {
                    let root = find_root(self.islands, island);
                    self.islands[root.index()]
                        .allow_deactivation
                        .store(false, Ordering::Relaxed);
                }
            }
        }
    }
}

impl DeactivationManager {
    /// Reevaluates the candidacy of every member and compresses every member's island reference to its root.
    ///
    /// With a dispatcher the members are split into jobs across its workers. The recorded events are ordered by
    /// member regardless of how the work was distributed.
    pub fn update_candidacy<B: IBodyActivitySource + ?Sized>(
        &mut self,
        dt: f32,
        bodies: &B,
        thread_dispatcher: Option<&dyn IThreadDispatcher>,
    ) {
        for &island in &self.island_list {
            *self.islands[island.index()].allow_deactivation.get_mut() = true;
        }

        let context = CandidacyContext {
            members: &self.members,
            connections: &self.connections,
            islands: &self.islands,
            settings: self.settings(),
            bodies,
            dt,
        };
        let member_slot_count = self.members.len();
        let mut events = Vec::new();
        match thread_dispatcher {
            Some(dispatcher) if dispatcher.thread_count() > 1 && member_slot_count > 1 => {
                let thread_count = dispatcher.thread_count();
                let job_counter = JobCounter::new(member_slot_count, thread_count, 4);
                let worker_events: Vec<SpinLock<Vec<ActivityEvent>>> =
                    (0..thread_count).map(|_| SpinLock::new(Vec::new())).collect();
                dispatcher.dispatch_workers(
                    &|worker_index| {
                        let mut local = Vec::new();
                        while let Some(range) = job_counter.try_get_job() {
                            context.update_range(range, &mut local);
                        }
                        worker_events[worker_index].lock().append(&mut local);
                    },
                    thread_count,
                );
                for buffer in worker_events {
                    events.append(&mut buffer.into_inner());
                }
                // Stable, so each member's own transitions keep the order they happened in.
                events.sort_by_key(|event: &ActivityEvent| event.member);
            }
            _ => context.update_range(0..member_slot_count, &mut events),
        }

        if !events.is_empty() {
            trace!("Candidacy pass recorded {} activity events", events.len());
        }
        self.events.append(&mut events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::activity_events::ActivityEventKind;
    use crate::physics::body_properties::BodyVelocity;
    use crate::physics::handles::BodyHandle;
    use glam::Vec3;

    #[test]
    fn candidacy_compresses_island_references() {
        let mut manager = DeactivationManager::new(DeactivationSettings::default()).unwrap();
        let members: Vec<_> = (0..6)
            .map(|i| manager.add_member(BodyHandle(i), true).unwrap())
            .collect();
        for pair in members.windows(2) {
            manager.add_connection(pair).unwrap();
        }
        let still = |_: BodyHandle| BodyVelocity::default();
        manager.update_candidacy(0.1, &still, None);
        let root = manager.island_of(members[0]).unwrap().unwrap();
        for &member in &members {
            assert_eq!(manager.member(member).unwrap().island.load(), Some(root));
        }
    }

    #[test]
    fn moving_kinematic_vetoes_its_neighbors() {
        let mut manager = DeactivationManager::new(DeactivationSettings::default()).unwrap();
        let kinematic = manager.add_member(BodyHandle(0), false).unwrap();
        let resting = manager.add_member(BodyHandle(1), true).unwrap();
        let lonely = manager.add_member(BodyHandle(2), true).unwrap();
        manager.add_connection(&[kinematic, resting]).unwrap();

        let velocities = |body: BodyHandle| {
            if body == BodyHandle(0) {
                BodyVelocity::from_linear(Vec3::X)
            } else {
                BodyVelocity::default()
            }
        };
        manager.update_candidacy(0.1, &velocities, None);
        let resting_island = manager.island_of(resting).unwrap().unwrap();
        let lonely_island = manager.island_of(lonely).unwrap().unwrap();
        assert!(!manager.allow_deactivation(resting_island));
        assert!(manager.allow_deactivation(lonely_island));
    }

    #[test]
    fn kinematic_events_are_recorded() {
        let mut manager = DeactivationManager::new(DeactivationSettings::default()).unwrap();
        let kinematic = manager.add_member(BodyHandle(0), false).unwrap();
        let still = |_: BodyHandle| BodyVelocity::default();
        manager.update_candidacy(0.1, &still, None);
        assert!(manager.events().is_empty());
        manager.update_candidacy(0.1, &still, None);
        assert_eq!(manager.events().count_for(kinematic, ActivityEventKind::Deactivated), 1);
        assert!(!manager.is_member_active(kinematic).unwrap());
    }
}
