//! Error definitions for the feeder engine

use crate::controller::bus::BusError;
use thiserror::Error;

/// Failures of the engine's lifecycle operations.
///
/// Input handling never returns these; it logs and carries on.
#[derive(Debug, Error)]
pub enum FeederError {
    /// The virtual bus refused to register or release a target
    #[error("Virtual bus error: {0}")]
    Bus(#[from] BusError),

    /// A profile name that is not part of the configuration
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),
}
