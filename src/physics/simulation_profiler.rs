#[cfg(feature = "profile")]
use std::collections::HashMap;
#[cfg(feature = "profile")]
use std::time::Instant;

/// Stage timed while handing pair changes to the deactivation manager and applying them.
pub const PAIR_FLUSH_STAGE: &str = "pair_flush";
/// Stage timed while members are reevaluated for deactivation candidacy.
pub const CANDIDACY_STAGE: &str = "candidacy";
/// Stage timed while islands are considered for sleep.
pub const SLEEPER_STAGE: &str = "sleeper";

/// Stores profiling information for the previous timestep.
///
/// Profiling is only active when the `profile` feature is enabled.
/// When inactive, all methods are no-ops and every stage reads as not having run.
#[derive(Debug, Default)]
pub struct SimulationProfiler {
    #[cfg(feature = "profile")]
    stages: HashMap<&'static str, f64>,
    #[cfg(feature = "profile")]
    start_timestamps: HashMap<&'static str, Instant>,
}

impl SimulationProfiler {
    pub fn new(_initial_stage_count: usize) -> Self {
        Self {
            #[cfg(feature = "profile")]
            stages: HashMap::with_capacity(_initial_stage_count),
            #[cfg(feature = "profile")]
            start_timestamps: HashMap::with_capacity(_initial_stage_count),
        }
    }

    /// Gets the seconds spent in the last execution of the given stage, or `None` if it did not run.
    pub fn get(&self, _stage: &'static str) -> Option<f64> {
        #[cfg(feature = "profile")]
        {
            return self.stages.get(_stage).copied();
        }
        #[cfg(not(feature = "profile"))]
        None
    }

    /// Starts timing a stage.
    pub fn start(&mut self, _stage: &'static str) {
        #[cfg(feature = "profile")]
        {
            debug_assert!(
                !self.start_timestamps.contains_key(_stage),
                "Cannot start a stage that has already been started."
            );
            self.start_timestamps.insert(_stage, Instant::now());
        }
    }

    /// Ends timing a stage and accumulates the elapsed time.
    pub fn end(&mut self, _stage: &'static str) {
        #[cfg(feature = "profile")]
        {
            let end_time = Instant::now();
            let Some(start_time) = self.start_timestamps.remove(_stage) else {
                debug_assert!(false, "To end a stage, it must currently be active (started and not already stopped).");
                return;
            };
            *self.stages.entry(_stage).or_insert(0.0) += end_time.duration_since(start_time).as_secs_f64();
        }
    }

    /// Clears all accumulated stage times.
    pub fn clear(&mut self) {
        #[cfg(feature = "profile")]
        {
            debug_assert!(
                self.start_timestamps.is_empty(),
                "It's likely that some stage was left unended from the previous frame."
            );
            self.stages.clear();
        }
    }
}
