//! Incremental verification of a live voxel world against a placed target structure.
//!
//! A [`session::VerifierSession`] scans the placement region by region as both
//! sides become available, indexes every mismatch by category and by
//! expected/found kind, and keeps that index current as the live world changes.

pub mod config;
pub mod diff_index;
pub mod error;
pub mod memory_world;
pub mod mismatch;
pub mod reconciler;
pub mod registry;
pub mod scanner;
pub mod selection;
pub mod session;
pub mod source;
pub mod spatial;
pub mod state;
pub mod tracker;

pub use config::VerifierConfig;
pub use diff_index::{DiffIndex, KindCount};
pub use error::VerifierError;
pub use mismatch::{CategoryFilter, MismatchCategory, MismatchKind};
pub use registry::{SessionId, SessionRegistry};
pub use selection::{Highlight, Overview, SortCriteria, SortOrder};
pub use session::{SessionBinding, SessionPhase, StepReport, VerifierSession};
pub use source::{LiveSource, Placement, TargetSource};
pub use spatial::{IntBox, Position, RegionPos};
pub use state::{StateCatalog, StatePalette, VoxelState};
