use std::fmt;

/// Misuse of the set API. Contention and "already present"/"not found"
/// outcomes are never reported through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetError {
    /// The handle was registered with a different set.
    ForeignHandle,
    /// Registration refused, the configured participant limit is reached.
    TooManyParticipants { limit: usize },
}

impl fmt::Display for SetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetError::ForeignHandle => {
                write!(f, "handle was registered with a different set")
            }
            SetError::TooManyParticipants { limit } => {
                write!(f, "participant limit of {} reached", limit)
            }
        }
    }
}

impl std::error::Error for SetError {}
