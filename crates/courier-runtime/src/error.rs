//! Runtime error types.

use courier_core::RegistrationError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that abort mediator startup.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The handler registry could not be built or verified.
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
