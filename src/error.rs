use crate::model::EngineState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("index {index} is out of bounds for a list of {len} tracks")]
    InvalidIndex { index: usize, len: usize },

    #[error("couldn't set current track  ::  index: {index}    tracks: {len}")]
    InvalidQueueState { index: usize, len: usize },

    #[error("can't have two players registered to the same pattern: {0}")]
    DuplicatePattern(String),

    #[error("no player was registered for pattern: {0}")]
    UnknownPattern(String),

    #[error("pattern {pattern} is not a valid regular expression")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no player found to handle locator: {0}")]
    NoPlayerFound(String),

    #[error("no current player has been resolved")]
    NoCurrentPlayer,

    #[error("tried to {action} when player was {state}")]
    IllegalPlayerTransition {
        action: &'static str,
        state: EngineState,
    },

    #[error("the queue has been released")]
    Released,

    #[error("engine failure: {0}")]
    Engine(String),
}

impl Error {
    pub fn illegal_transition(action: &'static str, state: EngineState) -> Self {
        Error::IllegalPlayerTransition { action, state }
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Error::Engine(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ErrorPolicy {
    #[default]
    Raise,
    /// Record the error as a diagnostic and return without effect.
    Degrade,
}

/// Whether a checked command ran, or was refused and recorded under
/// [`ErrorPolicy::Degrade`]. Callers stop at the first `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped,
}

impl Outcome {
    pub fn applied(self) -> bool {
        self == Self::Applied
    }

    pub fn skipped(self) -> bool {
        self == Self::Skipped
    }
}
