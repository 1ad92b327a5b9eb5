use std::fmt;

use crate::registry::SessionId;
use crate::session::SessionPhase;
use crate::state::VoxelState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifierError {
    /// No placement/region context was supplied, or it covers nothing.
    NothingSelected,
    InvalidState {
        operation: &'static str,
        phase: SessionPhase,
    },
    UnknownSession(SessionId),
    /// A display name needed for sorting could not be resolved.
    UnresolvedStateName(VoxelState),
    /// Every block or variant id of the palette is taken.
    PaletteFull {
        name: String,
    },
    ConfigRead {
        path: String,
        message: String,
    },
    ConfigParse {
        message: String,
    },
}

impl fmt::Display for VerifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingSelected => write!(f, "no placement selected for verification"),
            Self::InvalidState { operation, phase } => {
                write!(f, "cannot {operation} while the session is {phase:?}")
            }
            Self::UnknownSession(id) => write!(f, "no active verifier session with id {}", id.0),
            Self::UnresolvedStateName(state) => {
                write!(f, "failed to resolve a name for state {state}; using id order")
            }
            Self::PaletteFull { name } => {
                write!(f, "state palette has no free id left for {name}")
            }
            Self::ConfigRead { path, message } => {
                write!(f, "failed to read verifier config {path}: {message}")
            }
            Self::ConfigParse { message } => write!(f, "invalid verifier config: {message}"),
        }
    }
}

impl std::error::Error for VerifierError {}
