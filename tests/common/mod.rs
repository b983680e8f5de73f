//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::io::Write;

use ahash::{AHashMap, AHashSet};
use env_logger::WriteStyle;
use glam::Vec3;
use log::LevelFilter;
use rust_simulation_islands::physics::IBodyActivitySource;
use rust_simulation_islands::{BodyHandle, BodyVelocity, DeactivationManager, IslandHandle, MemberHandle};

pub const DT: f32 = 1.0 / 60.0;

/// Installs a logger once per test binary. Later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .format(|buf, record| writeln!(buf, "[ISLANDS | {}] {}", record.level(), record.args()))
        .write_style(WriteStyle::Always)
        .filter(None, LevelFilter::Debug)
        .try_init();
}

/// Body velocities keyed by handle. Bodies without an entry are at rest.
#[derive(Debug, Default, Clone)]
pub struct Velocities {
    velocities: AHashMap<BodyHandle, BodyVelocity>,
}

impl Velocities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, body: BodyHandle, linear: Vec3) {
        self.velocities.insert(body, BodyVelocity::from_linear(linear));
    }

    pub fn stop(&mut self, body: BodyHandle) {
        self.velocities.remove(&body);
    }
}

impl IBodyActivitySource for Velocities {
    fn velocity(&self, body: BodyHandle) -> BodyVelocity {
        self.velocities.get(&body).copied().unwrap_or_default()
    }
}

pub fn at_rest(_: BodyHandle) -> BodyVelocity {
    BodyVelocity::default()
}

pub fn add_dynamic(manager: &mut DeactivationManager, count: i32) -> Vec<MemberHandle> {
    let first = manager.member_count() as i32;
    (first..first + count)
        .map(|i| manager.add_member(BodyHandle(i), true).unwrap())
        .collect()
}

pub fn island(manager: &DeactivationManager, member: MemberHandle) -> IslandHandle {
    manager.island_of(member).unwrap().expect("dynamic members always have an island")
}

/// Computes connected components of the dynamic members by brute force, ignoring kinematic members.
pub fn components(manager: &DeactivationManager, members: &[MemberHandle]) -> Vec<Vec<MemberHandle>> {
    let dynamic: Vec<_> = members
        .iter()
        .copied()
        .filter(|&m| manager.member(m).map_or(false, |member| member.is_dynamic()))
        .collect();
    let mut visited = AHashSet::new();
    let mut result = Vec::new();
    for &start in &dynamic {
        if !visited.insert(start) {
            continue;
        }
        let mut component = vec![start];
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for &connection in manager.connections_of(node).unwrap() {
                for &neighbor in manager.connection_members(connection).unwrap() {
                    let is_dynamic = manager.member(neighbor).map_or(false, |member| member.is_dynamic());
                    if is_dynamic && visited.insert(neighbor) {
                        component.push(neighbor);
                        stack.push(neighbor);
                    }
                }
            }
        }
        component.sort();
        result.push(component);
    }
    result.sort();
    result
}

/// Gets the member sets of every occupied island, sorted for comparison against [`components`].
pub fn island_partition(manager: &DeactivationManager) -> Vec<Vec<MemberHandle>> {
    let mut result: Vec<Vec<MemberHandle>> = manager
        .occupied_islands()
        .into_iter()
        .map(|island| {
            let mut members = manager.island_members(island).to_vec();
            members.sort();
            members
        })
        .collect();
    result.sort();
    result
}

/// Asserts that islands are exactly the connected components of the graph.
pub fn assert_islands_match_components(manager: &DeactivationManager, members: &[MemberHandle]) {
    manager.validate();
    assert_eq!(island_partition(manager), components(manager, members));
}
