pub mod activity_events;
pub mod body_properties;
pub mod collision_detection;
pub mod deactivation_manager;
pub mod deactivation_manager_candidacy;
pub mod deactivation_manager_split;
pub mod deactivation_settings;
pub mod errors;
pub mod handles;
pub mod island_awakener;
pub mod island_sleeper;
pub(crate) mod local_spin_wait;
pub mod simulation;
pub mod simulation_island;
pub mod simulation_island_connection;
pub mod simulation_island_member;
pub mod simulation_profiler;
pub mod spin_lock;

pub use activity_events::{ActivityEvent, ActivityEventKind, ActivityEvents};
pub use body_properties::{BodyVelocity, IBodyActivitySource};
pub use deactivation_manager::DeactivationManager;
pub use deactivation_manager_split::SplitOutcome;
pub use deactivation_settings::DeactivationSettings;
pub use errors::{DeactivationError, Result};
pub use handles::{BodyHandle, ConnectionHandle, IslandHandle, MemberHandle};
pub use island_sleeper::SleepPassSummary;
pub use simulation::Simulation;
pub use simulation_island::SimulationIsland;
pub use simulation_island_connection::SimulationIslandConnection;
pub use simulation_island_member::{SearchState, SimulationIslandMember};
pub use simulation_profiler::SimulationProfiler;
