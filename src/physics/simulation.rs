use log::{debug, info};

use crate::physics::activity_events::ActivityEvent;
use crate::physics::body_properties::IBodyActivitySource;
use crate::physics::collision_detection::narrow_phase::NarrowPhase;
use crate::physics::deactivation_manager::DeactivationManager;
use crate::physics::deactivation_settings::DeactivationSettings;
use crate::physics::errors::{DeactivationError, Result};
use crate::physics::handles::{BodyHandle, MemberHandle};
use crate::physics::island_sleeper::SleepPassSummary;
use crate::physics::simulation_profiler::{SimulationProfiler, CANDIDACY_STAGE, PAIR_FLUSH_STAGE, SLEEPER_STAGE};
use crate::utilities::thread_dispatcher::IThreadDispatcher;

/// Orchestrates the activity management stages of a timestep.
///
/// Pair changes from collision testing are applied to the island graph before candidacy is evaluated, and candidacy
/// is complete before any island is put to sleep.
///
/// Activity events are kept for one timestep. Drain them with [`Simulation::drain_events`] after each call to
/// [`Simulation::timestep`]; whatever is left undrained is discarded when the next timestep starts.
pub struct Simulation {
    pub deactivation_manager: DeactivationManager,
    pub narrow_phase: NarrowPhase,
    profiler: SimulationProfiler,
    timestep_index: u64,
    last_sleep_pass: SleepPassSummary,
}

impl Simulation {
    pub fn new(settings: DeactivationSettings) -> Result<Self> {
        let simulation = Self {
            deactivation_manager: DeactivationManager::new(settings)?,
            narrow_phase: NarrowPhase::new(),
            profiler: SimulationProfiler::new(3),
            timestep_index: 0,
            last_sleep_pass: SleepPassSummary::default(),
        };
        info!(
            "Created simulation (velocity lower limit {}, low velocity time minimum {}s)",
            settings.velocity_lower_limit(),
            settings.low_velocity_time_minimum
        );
        Ok(simulation)
    }

    /// Registers a body with the activity system.
    pub fn add_body(&mut self, body: BodyHandle, is_dynamic: bool) -> Result<MemberHandle> {
        self.deactivation_manager.add_member(body, is_dynamic)
    }

    /// Removes a body along with every pair and constraint it takes part in.
    pub fn remove_body(&mut self, body: BodyHandle) -> Result<()> {
        let member = self
            .deactivation_manager
            .member_for_body(body)
            .ok_or(DeactivationError::BodyNotManaged(body))?;
        self.narrow_phase.on_member_removed(&self.deactivation_manager, member);
        self.deactivation_manager.remove_member(member)?;
        Ok(())
    }

    /// Records that two bodies are touching this frame.
    pub fn report_touching(&mut self, a: BodyHandle, b: BodyHandle) -> Result<()> {
        let a = self.member_for(a)?;
        let b = self.member_for(b)?;
        self.narrow_phase.report_touching(a, b);
        Ok(())
    }

    /// Runs the activity stages of one timestep.
    pub fn timestep<B: IBodyActivitySource + ?Sized>(
        &mut self,
        dt: f32,
        bodies: &B,
        thread_dispatcher: Option<&dyn IThreadDispatcher>,
    ) -> Result<()> {
        if !(dt > 0.0) {
            return Err(DeactivationError::InvalidTimestep(dt));
        }
        self.profiler.clear();
        let discarded = self.deactivation_manager.events.len();
        if discarded > 0 {
            debug!("Discarding {} undrained activity events", discarded);
            self.deactivation_manager.events.clear();
        }

        self.profiler.start(PAIR_FLUSH_STAGE);
        let flushed = self.narrow_phase.flush(&mut self.deactivation_manager);
        self.deactivation_manager.flush_pending_connections();
        self.profiler.end(PAIR_FLUSH_STAGE);
        flushed?;

        self.profiler.start(CANDIDACY_STAGE);
        self.deactivation_manager.update_candidacy(dt, bodies, thread_dispatcher);
        self.profiler.end(CANDIDACY_STAGE);

        self.profiler.start(SLEEPER_STAGE);
        self.last_sleep_pass = self.deactivation_manager.sleep_pass();
        self.profiler.end(SLEEPER_STAGE);

        self.timestep_index += 1;
        Ok(())
    }

    /// Takes every activity transition recorded since the last drain, at most one timestep's worth.
    pub fn drain_events(&mut self) -> Vec<ActivityEvent> {
        self.deactivation_manager.drain_events()
    }

    #[inline(always)]
    pub fn profiler(&self) -> &SimulationProfiler {
        &self.profiler
    }

    /// Gets the number of completed timesteps.
    #[inline(always)]
    pub fn timestep_index(&self) -> u64 {
        self.timestep_index
    }

    /// Gets what the sleep pass did during the last timestep.
    #[inline(always)]
    pub fn last_sleep_pass(&self) -> SleepPassSummary {
        self.last_sleep_pass
    }

    /// Removes every body, pair and island.
    pub fn clear(&mut self) {
        self.deactivation_manager.clear();
        self.narrow_phase.clear();
        self.profiler.clear();
        self.timestep_index = 0;
        self.last_sleep_pass = SleepPassSummary::default();
    }

    fn member_for(&self, body: BodyHandle) -> Result<MemberHandle> {
        self.deactivation_manager
            .member_for_body(body)
            .ok_or(DeactivationError::BodyNotManaged(body))
    }
}
