//! Error types for loading and running a simulation.

use thiserror::Error;

/// A malformed event source: bad INI syntax or a section that does not
/// describe a valid event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{context}: {reason}")]
pub struct ParseError {
    /// Section tag (or offending line for syntax errors)
    pub context: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

/// Everything that can go wrong while loading or executing events.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("failed to parse events: {0}")]
    Parse(#[from] ParseError),

    #[error("object {0} is already registered")]
    DuplicateId(String),

    #[error("junction {0} does not exist in the road map")]
    UnknownJunction(String),

    #[error("road {0} does not exist in the road map")]
    UnknownRoad(String),

    #[error("vehicle {0} not found")]
    UnknownVehicle(String),

    #[error("no road connects {from} and {to}")]
    Disconnected { from: String, to: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;
