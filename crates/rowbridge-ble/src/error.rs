//! Error types for sensor registration

use rowbridge_core::{ConfigurationError, HostError};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Failure while putting sensors on the air
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// The profile table is wrong; retrying cannot help
    #[error("Invalid sensor definition: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The wireless stack refused the service; a reset may help
    #[error("Wireless host error: {0}")]
    Host(#[from] HostError),
}

impl RegistrationError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Host(_))
    }
}
