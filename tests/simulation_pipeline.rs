mod common;

use common::{init_logging, Velocities, DT};
use glam::Vec3;
use rust_simulation_islands::physics::simulation_profiler::{CANDIDACY_STAGE, PAIR_FLUSH_STAGE, SLEEPER_STAGE};
use rust_simulation_islands::{
    ActivityEventKind, BodyHandle, DeactivationError, DeactivationSettings, Simulation, SimpleThreadDispatcher,
};

fn simulation() -> Simulation {
    init_logging();
    let settings = DeactivationSettings::default().with_low_velocity_time_minimum(0.25);
    Simulation::new(settings).unwrap()
}

/// A stack of boxes resting on static ground, reporting every contact each frame like collision testing would.
struct Stack {
    ground: BodyHandle,
    boxes: Vec<BodyHandle>,
}

impl Stack {
    fn build(simulation: &mut Simulation, height: i32) -> Self {
        let ground = BodyHandle(0);
        simulation.add_body(ground, false).unwrap();
        let boxes = (1..=height).map(BodyHandle).collect::<Vec<_>>();
        for &body in &boxes {
            simulation.add_body(body, true).unwrap();
        }
        Self { ground, boxes }
    }

    fn report_contacts(&self, simulation: &mut Simulation) {
        simulation.report_touching(self.ground, self.boxes[0]).unwrap();
        for pair in self.boxes.windows(2) {
            simulation.report_touching(pair[0], pair[1]).unwrap();
        }
    }

    fn is_awake(&self, simulation: &Simulation, body: BodyHandle) -> bool {
        let manager = &simulation.deactivation_manager;
        let member = manager.member_for_body(body).unwrap();
        manager.is_member_active(member).unwrap()
    }
}

#[test]
fn resting_stack_falls_asleep_and_keeps_its_pairs() {
    let mut simulation = simulation();
    let stack = Stack::build(&mut simulation, 4);
    let velocities = Velocities::new();

    let mut events = Vec::new();
    for _ in 0..60 {
        // Sleeping bodies are not collision tested.
        if stack.is_awake(&simulation, stack.boxes[0]) {
            stack.report_contacts(&mut simulation);
        }
        simulation.timestep(DT, &velocities, None).unwrap();
        events.extend(simulation.drain_events());
    }
    for &body in &stack.boxes {
        assert!(!stack.is_awake(&simulation, body));
    }
    assert_eq!(simulation.narrow_phase.pair_cache().len(), 4);
    assert_eq!(simulation.deactivation_manager.connection_count(), 4);
    assert_eq!(simulation.deactivation_manager.occupied_islands().len(), 1);

    let slept = events.iter().filter(|e| e.kind == ActivityEventKind::Deactivated).count();
    // Four boxes plus the settled ground.
    assert_eq!(slept, 5);
    simulation.deactivation_manager.validate();
}

#[test]
fn separated_pairs_go_stale_and_split_islands() {
    let mut simulation = simulation();
    let stack = Stack::build(&mut simulation, 3);
    let mut velocities = Velocities::new();
    stack.report_contacts(&mut simulation);
    simulation.timestep(DT, &velocities, None).unwrap();
    let manager = &simulation.deactivation_manager;
    let top = manager.member_for_body(stack.boxes[2]).unwrap();
    let bottom = manager.member_for_body(stack.boxes[0]).unwrap();
    assert_eq!(manager.island_of(top).unwrap(), manager.island_of(bottom).unwrap());

    // The top box gets knocked off: its contact with the middle box is no longer reported.
    velocities.set(stack.boxes[2], Vec3::new(5.0, 0.0, 0.0));
    simulation.report_touching(stack.ground, stack.boxes[0]).unwrap();
    simulation.report_touching(stack.boxes[0], stack.boxes[1]).unwrap();
    simulation.timestep(DT, &velocities, None).unwrap();

    let manager = &simulation.deactivation_manager;
    assert_ne!(manager.island_of(top).unwrap(), manager.island_of(bottom).unwrap());
    assert_eq!(simulation.narrow_phase.pair_cache().len(), 2);
    assert_eq!(manager.connection_count(), 2);
    manager.validate();
}

#[test]
fn removing_a_body_cleans_up_pairs_and_islands() {
    let mut simulation = simulation();
    let stack = Stack::build(&mut simulation, 3);
    let velocities = Velocities::new();
    stack.report_contacts(&mut simulation);
    simulation.timestep(DT, &velocities, None).unwrap();

    simulation.remove_body(stack.boxes[1]).unwrap();
    assert_eq!(simulation.narrow_phase.pair_cache().len(), 1);
    let manager = &simulation.deactivation_manager;
    let top = manager.member_for_body(stack.boxes[2]).unwrap();
    let bottom = manager.member_for_body(stack.boxes[0]).unwrap();
    assert_ne!(manager.island_of(top).unwrap(), manager.island_of(bottom).unwrap());

    assert_eq!(
        simulation.remove_body(stack.boxes[1]).unwrap_err(),
        DeactivationError::BodyNotManaged(stack.boxes[1])
    );
    simulation.report_touching(stack.ground, stack.boxes[0]).unwrap();
    simulation.timestep(DT, &velocities, None).unwrap();
    simulation.deactivation_manager.validate();
}

#[test]
fn timestep_runs_every_stage_with_a_dispatcher() {
    let mut simulation = simulation();
    let stack = Stack::build(&mut simulation, 8);
    let velocities = Velocities::new();
    let dispatcher = SimpleThreadDispatcher::new(3);
    for _ in 0..5 {
        stack.report_contacts(&mut simulation);
        simulation.timestep(DT, &velocities, Some(&dispatcher)).unwrap();
    }
    assert_eq!(simulation.timestep_index(), 5);
    assert!(simulation.last_sleep_pass().examined_islands > 0);
    for stage in [PAIR_FLUSH_STAGE, CANDIDACY_STAGE, SLEEPER_STAGE] {
        assert_eq!(simulation.profiler().get(stage).is_some(), cfg!(feature = "profile"));
    }

    assert_eq!(
        simulation.timestep(0.0, &velocities, None).unwrap_err(),
        DeactivationError::InvalidTimestep(0.0)
    );
    simulation.clear();
    assert_eq!(simulation.deactivation_manager.member_count(), 0);
    assert!(simulation.narrow_phase.pair_cache().is_empty());
}

#[test]
fn touching_an_unknown_body_is_reported() {
    let mut simulation = simulation();
    simulation.add_body(BodyHandle(0), true).unwrap();
    assert_eq!(
        simulation.report_touching(BodyHandle(0), BodyHandle(9)).unwrap_err(),
        DeactivationError::BodyNotManaged(BodyHandle(9))
    );
    assert!(simulation.add_body(BodyHandle(0), true).unwrap_err().is_already_managed());
}

#[test]
fn undrained_events_last_one_timestep() {
    let mut simulation = simulation();
    let member = simulation.add_body(BodyHandle(0), true).unwrap();
    let velocities = Velocities::new();

    simulation.deactivation_manager.force_sleep(member).unwrap();
    assert_eq!(simulation.deactivation_manager.events().len(), 1);
    simulation.timestep(DT, &velocities, None).unwrap();
    assert!(simulation.deactivation_manager.events().is_empty());

    simulation.deactivation_manager.activate(member).unwrap();
    let mut frames = 0;
    while simulation.deactivation_manager.is_member_active(member).unwrap() {
        simulation.timestep(DT, &velocities, None).unwrap();
        frames += 1;
        assert!(frames < 60, "a resting body must fall asleep");
    }
    // Only the frame that put the body to sleep is left; the earlier wake was discarded.
    let kinds: Vec<_> = simulation.drain_events().iter().map(|event| event.kind).collect();
    assert_eq!(kinds, [ActivityEventKind::BecameCandidate, ActivityEventKind::Deactivated]);
}
