mod common;

use common::{add_dynamic, assert_islands_match_components, at_rest, init_logging, island, DT};
use rust_simulation_islands::{BodyHandle, DeactivationManager, DeactivationSettings, SearchState, SplitOutcome};

fn manager() -> DeactivationManager {
    init_logging();
    DeactivationManager::new(DeactivationSettings::default()).unwrap()
}

#[test]
fn lone_dynamic_member_gets_a_singleton_island() {
    let mut manager = manager();
    let member = manager.add_member(BodyHandle(0), true).unwrap();
    let island = island(&manager, member);
    assert_eq!(manager.island_members(island), &[member]);
    assert!(manager.island_is_active(island));
    assert_eq!(manager.island_count(), 1);
    manager.validate();
}

#[test]
fn removing_the_only_connection_splits_a_pair() {
    let mut manager = manager();
    let m = add_dynamic(&mut manager, 2);
    let connection = manager.add_connection(&[m[0], m[1]]).unwrap();
    assert_eq!(island(&manager, m[0]), island(&manager, m[1]));

    manager.remove_connection(connection).unwrap();
    let first = island(&manager, m[0]);
    let second = island(&manager, m[1]);
    assert_ne!(first, second);
    assert_eq!(manager.island_members(first), &[m[0]]);
    assert_eq!(manager.island_members(second), &[m[1]]);
    assert_eq!(manager.member_count(), 2);
    assert_islands_match_components(&manager, &m);
}

#[test]
fn cutting_the_end_of_a_line_isolates_it() {
    let mut manager = manager();
    let m = add_dynamic(&mut manager, 3);
    let (a, b, c) = (m[0], m[1], m[2]);
    let ab = manager.add_connection(&[a, b]).unwrap();
    manager.add_connection(&[b, c]).unwrap();
    let original = island(&manager, b);

    manager.remove_connection(ab).unwrap();
    assert_eq!(island(&manager, b), original);
    assert_eq!(island(&manager, c), original);
    assert_ne!(island(&manager, a), original);
    assert_eq!(manager.island_members(island(&manager, a)), &[a]);
    assert_islands_match_components(&manager, &m);
}

#[test]
fn removing_the_middle_of_a_line_splits_it() {
    let mut manager = manager();
    let m = add_dynamic(&mut manager, 5);
    for pair in m.windows(2) {
        manager.add_connection(pair).unwrap();
    }
    manager.remove_member(m[2]).unwrap();
    assert_ne!(island(&manager, m[1]), island(&manager, m[3]));
    assert_eq!(island(&manager, m[0]), island(&manager, m[1]));
    assert_eq!(island(&manager, m[3]), island(&manager, m[4]));
    assert_islands_match_components(&manager, &m);
}

#[test]
fn emptied_island_is_reclaimed_by_the_sleep_pass() {
    init_logging();
    let settings = DeactivationSettings::default().with_maximum_deactivations_per_frame(4);
    let mut manager = DeactivationManager::new(settings).unwrap();
    let m = add_dynamic(&mut manager, 3);
    let doomed = manager.add_member(BodyHandle(100), true).unwrap();
    assert_eq!(manager.island_count(), 4);

    manager.remove_member(doomed).unwrap();
    // The emptied island lingers as an orphan until a sleep pass reaches it.
    assert_eq!(manager.island_count(), 4);
    assert_eq!(manager.occupied_islands().len(), 3);

    let mut passes = 0;
    while manager.island_count() == 4 {
        manager.update(DT, &at_rest, None).unwrap();
        passes += 1;
        assert!(passes <= settings.maximum_deactivations_per_frame, "orphan was never reclaimed");
    }
    assert_eq!(manager.island_count(), 3);
    assert_islands_match_components(&manager, &m);
}

#[test]
fn kinematic_members_do_not_carry_connectivity() {
    let mut manager = manager();
    let ground = manager.add_member(BodyHandle(0), false).unwrap();
    let m = add_dynamic(&mut manager, 2);
    manager.add_connection(&[ground, m[0]]).unwrap();
    manager.add_connection(&[m[1], ground]).unwrap();
    assert_eq!(manager.island_of(ground).unwrap(), None);
    assert_ne!(island(&manager, m[0]), island(&manager, m[1]));
    assert_eq!(manager.try_split(ground, m[0]), SplitOutcome::Skipped);

    // A body bridging the two boxes joins them even though both also touch the ground.
    let bridge = manager.add_member(BodyHandle(10), true).unwrap();
    manager.add_connection(&[m[0], bridge]).unwrap();
    manager.add_connection(&[bridge, m[1]]).unwrap();
    assert_eq!(island(&manager, m[0]), island(&manager, m[1]));
    let everyone = [ground, m[0], m[1], bridge];
    assert_islands_match_components(&manager, &everyone);

    manager.remove_member(bridge).unwrap();
    assert_ne!(island(&manager, m[0]), island(&manager, m[1]));
    assert_islands_match_components(&manager, &everyone);
}

#[test]
fn connections_with_many_members_merge_and_split_together() {
    let mut manager = manager();
    let m = add_dynamic(&mut manager, 4);
    let constraint = manager.add_connection(&[m[0], m[1], m[2]]).unwrap();
    assert_eq!(island(&manager, m[0]), island(&manager, m[2]));
    assert_ne!(island(&manager, m[0]), island(&manager, m[3]));

    manager.remove_connection(constraint).unwrap();
    let islands: Vec<_> = m[..3].iter().map(|&member| island(&manager, member)).collect();
    assert_ne!(islands[0], islands[1]);
    assert_ne!(islands[1], islands[2]);
    assert_ne!(islands[0], islands[2]);
    assert_islands_match_components(&manager, &m);
}

#[test]
fn new_members_merge_every_neighboring_island() {
    let mut manager = manager();
    let m = add_dynamic(&mut manager, 3);
    // Queue connections to a member that does not have an island yet by registering it as kinematic first.
    let hub = manager.add_member(BodyHandle(50), false).unwrap();
    for &member in &m {
        manager.add_connection(&[hub, member]).unwrap();
    }
    assert_eq!(manager.occupied_islands().len(), 3);

    manager.set_member_dynamic(hub, true).unwrap();
    let merged = island(&manager, hub);
    for &member in &m {
        assert_eq!(island(&manager, member), merged);
    }
    assert_eq!(manager.island_members(merged).len(), 4);
    assert_eq!(manager.occupied_islands().len(), 1);
    for &member in &m {
        assert_eq!(manager.search_state(member).unwrap(), SearchState::Unclaimed);
    }
    let mut everyone = m.clone();
    everyone.push(hub);
    assert_islands_match_components(&manager, &everyone);
}
