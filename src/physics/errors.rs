//! Error types for island activity management.

use thiserror::Error;

use crate::physics::handles::{BodyHandle, ConnectionHandle, MemberHandle};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeactivationError {
    #[error("body {0} already has a member in this deactivation manager")]
    AlreadyManagedBody(BodyHandle),

    #[error("pair <{0}, {1}> already has a connection in this pair cache")]
    AlreadyManagedPair(MemberHandle, MemberHandle),

    #[error("{0} does not belong to this deactivation manager")]
    MemberNotManaged(MemberHandle),

    #[error("{0} does not belong to this deactivation manager")]
    ConnectionNotManaged(ConnectionHandle),

    #[error("body {0} is not registered with this deactivation manager")]
    BodyNotManaged(BodyHandle),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("timestep duration must be positive, got {0}")]
    InvalidTimestep(f32),
}

impl DeactivationError {
    /// Gets whether the error reports an attempt to add something that already has an owner.
    pub fn is_already_managed(&self) -> bool {
        matches!(
            self,
            DeactivationError::AlreadyManagedBody(_) | DeactivationError::AlreadyManagedPair(..)
        )
    }

    /// Gets whether the error reports an attempt to use something this manager does not own.
    pub fn is_not_managed(&self) -> bool {
        matches!(
            self,
            DeactivationError::MemberNotManaged(_)
                | DeactivationError::ConnectionNotManaged(_)
                | DeactivationError::BodyNotManaged(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DeactivationError>;
