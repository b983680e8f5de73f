use glam::Vec3;
use std::fmt;

use crate::physics::handles::BodyHandle;

/// Linear and angular velocity of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyVelocity {
    /// Linear velocity associated with the body.
    pub linear: Vec3,
    /// Angular velocity associated with the body.
    pub angular: Vec3,
}

impl Default for BodyVelocity {
    fn default() -> Self {
        Self {
            linear: Vec3::ZERO,
            angular: Vec3::ZERO,
        }
    }
}

impl BodyVelocity {
    /// Creates a new set of body velocities. Angular velocity is set to zero.
    #[inline(always)]
    pub fn from_linear(linear: Vec3) -> Self {
        Self {
            linear,
            angular: Vec3::ZERO,
        }
    }

    /// Creates a new set of body velocities.
    #[inline(always)]
    pub fn new(linear: Vec3, angular: Vec3) -> Self {
        Self { linear, angular }
    }

    #[inline(always)]
    pub fn linear_velocity_squared(&self) -> f32 {
        self.linear.length_squared()
    }

    #[inline(always)]
    pub fn angular_velocity_squared(&self) -> f32 {
        self.angular.length_squared()
    }

    /// Gets the sleep heuristic of the velocity: dot(linear, linear) + dot(angular, angular).
    #[inline(always)]
    pub fn speed_squared(&self) -> f32 {
        self.linear_velocity_squared() + self.angular_velocity_squared()
    }

    /// Gets whether both the linear and angular components are exactly zero.
    #[inline(always)]
    pub fn is_zero(&self) -> bool {
        self.linear == Vec3::ZERO && self.angular == Vec3::ZERO
    }
}

impl From<Vec3> for BodyVelocity {
    fn from(linear: Vec3) -> Self {
        Self::from_linear(linear)
    }
}

impl fmt::Display for BodyVelocity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Linear: {}, Angular: {}", self.linear, self.angular)
    }
}

/// Provides the motion state of the bodies that own island members.
///
/// The candidacy pass reads velocities from worker threads, so implementations must be safe to share.
/// Whether a body is dynamic is not queried here; it is supplied when the body is registered
/// and whenever its mass category changes.
pub trait IBodyActivitySource: Sync {
    /// Gets the current velocity of the given body.
    fn velocity(&self, body: BodyHandle) -> BodyVelocity;
}

impl<F> IBodyActivitySource for F
where
    F: Fn(BodyHandle) -> BodyVelocity + Sync,
{
    #[inline(always)]
    fn velocity(&self, body: BodyHandle) -> BodyVelocity {
        self(body)
    }
}
