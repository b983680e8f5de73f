use log::warn;

use crate::physics::errors::{DeactivationError, Result};

/// Describes the thresholds that govern when members become deactivation candidates and how much
/// sleeping work is done per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeactivationSettings {
    velocity_lower_limit: f32,
    velocity_lower_limit_squared: f32,
    /// Seconds a member's velocity must stay below the lower limit before it becomes a candidate.
    /// Must be positive.
    pub low_velocity_time_minimum: f32,
    /// Number of members worth of islands the sleep pass may examine each frame.
    pub maximum_deactivations_per_frame: usize,
    /// Whether a member must also be slowing down (non-increasing speed) to become a candidate.
    pub use_stabilization: bool,
}

impl Default for DeactivationSettings {
    fn default() -> Self {
        Self {
            velocity_lower_limit: 0.26,
            velocity_lower_limit_squared: 0.26 * 0.26,
            low_velocity_time_minimum: 1.0,
            maximum_deactivations_per_frame: 100,
            use_stabilization: true,
        }
    }
}

impl DeactivationSettings {
    /// Creates validated settings.
    pub fn new(
        velocity_lower_limit: f32,
        low_velocity_time_minimum: f32,
        maximum_deactivations_per_frame: usize,
        use_stabilization: bool,
    ) -> Result<Self> {
        let settings = Self {
            low_velocity_time_minimum,
            maximum_deactivations_per_frame,
            use_stabilization,
            ..Self::default()
        }
        .with_velocity_lower_limit(velocity_lower_limit);
        settings.validate()?;
        Ok(settings)
    }

    /// Gets the velocity below which members start accumulating low velocity time.
    #[inline(always)]
    pub fn velocity_lower_limit(&self) -> f32 {
        self.velocity_lower_limit
    }

    /// Gets the squared velocity lower limit, which is what candidacy actually compares against.
    #[inline(always)]
    pub fn velocity_lower_limit_squared(&self) -> f32 {
        self.velocity_lower_limit_squared
    }

    /// Sets the velocity lower limit. Negative values are clamped to zero.
    pub fn set_velocity_lower_limit(&mut self, value: f32) {
        self.velocity_lower_limit = value.max(0.0);
        self.velocity_lower_limit_squared = self.velocity_lower_limit * self.velocity_lower_limit;
    }

    pub fn with_velocity_lower_limit(mut self, value: f32) -> Self {
        self.set_velocity_lower_limit(value);
        self
    }

    pub fn with_low_velocity_time_minimum(mut self, value: f32) -> Self {
        self.low_velocity_time_minimum = value;
        self
    }

    pub fn with_maximum_deactivations_per_frame(mut self, value: usize) -> Self {
        self.maximum_deactivations_per_frame = value;
        self
    }

    pub fn with_stabilization(mut self, value: bool) -> Self {
        self.use_stabilization = value;
        self
    }

    /// Checks that the settings describe a usable configuration.
    pub fn validate(&self) -> Result<()> {
        // Written so that NaN is rejected too.
        if !(self.low_velocity_time_minimum > 0.0) {
            warn!(
                "Rejecting deactivation settings with low velocity time minimum {}",
                self.low_velocity_time_minimum
            );
            return Err(DeactivationError::InvalidConfiguration(format!(
                "low velocity time minimum must be positive, got {}",
                self.low_velocity_time_minimum
            )));
        }
        Ok(())
    }
}
