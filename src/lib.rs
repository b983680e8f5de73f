pub mod physics;
pub mod utilities;

pub use physics::{
    ActivityEvent, ActivityEventKind, BodyHandle, BodyVelocity, ConnectionHandle, DeactivationError,
    DeactivationManager, DeactivationSettings, IBodyActivitySource, IslandHandle, MemberHandle, SearchState,
    Simulation, SplitOutcome,
};
pub use utilities::{IThreadDispatcher, SimpleThreadDispatcher};
