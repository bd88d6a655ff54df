//! Error types for the Courier dispatch core.
//!
//! Errors are split by the phase in which they surface:
//!
//! - [`RegistrationError`] — raised while the registry is being built or
//!   verified at startup. These are meant to abort startup.
//! - [`ResolveError`] — raised by a [`HandlerProvider`](crate::HandlerProvider)
//!   when it cannot produce an instance.
//! - [`DispatchError`] — returned to the caller of
//!   [`Sender::send`](crate::Sender::send).

use thiserror::Error;

/// Boxed error type carried by handler and factory failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// =============================================================================
// Registration Errors
// =============================================================================

/// Errors raised while building or verifying a handler registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A second handler was registered for an already-bound request kind.
    #[error(
        "request '{request}' is already bound to '{existing}', refusing to bind it to '{rejected}'"
    )]
    DuplicateBinding {
        /// The request kind both handlers claim.
        request: &'static str,
        /// Handler that holds the binding.
        existing: &'static str,
        /// Handler whose registration was rejected.
        rejected: &'static str,
    },

    /// The instance provider has no way to construct the bound handler.
    #[error("handler '{handler}' bound to request '{request}' cannot be resolved by the provider")]
    Unresolvable {
        /// The request kind of the binding.
        request: &'static str,
        /// The handler type the provider does not know.
        handler: &'static str,
    },
}

// =============================================================================
// Resolve Errors
// =============================================================================

/// Errors raised by an instance provider.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Nothing is registered for the requested type.
    #[error("no factory registered for '{type_name}'")]
    NotRegistered {
        /// Name of the type that was requested.
        type_name: &'static str,
    },

    /// A factory was found but failed to build the instance.
    #[error("factory for '{type_name}' failed: {source}")]
    Factory {
        /// Name of the type being built.
        type_name: &'static str,
        /// The factory's own error.
        #[source]
        source: BoxError,
    },
}

impl ResolveError {
    /// Creates a [`ResolveError::NotRegistered`] for `T`.
    pub fn not_registered<T: ?Sized>() -> Self {
        Self::NotRegistered {
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// Error returned by [`Request::validate`](crate::Request::validate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(String);

impl ValidationError {
    /// Creates a validation error with the given message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the validation message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Errors returned from a dispatch call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request failed its own validation; no lookup was performed.
    #[error("invalid request '{request}': {source}")]
    InvalidArgument {
        /// The request kind.
        request: &'static str,
        /// What the request's validation reported.
        #[source]
        source: ValidationError,
    },

    /// No handler is bound for the request kind.
    #[error("no handler registered for request '{request}'")]
    HandlerNotFound {
        /// The request kind.
        request: &'static str,
    },

    /// The binding exists but the provider could not produce an instance.
    #[error("failed to resolve handler '{handler}': {source}")]
    HandlerResolution {
        /// The handler type named by the binding.
        handler: &'static str,
        /// The provider's error.
        #[source]
        source: ResolveError,
    },

    /// The provider returned an instance of a different type than the binding names.
    #[error("resolved instance type mismatch: expected '{expected}', got '{found}'")]
    TypeMismatch {
        /// Handler type named by the binding.
        expected: &'static str,
        /// What the provider claims to have produced.
        found: &'static str,
    },

    /// The handler ran and returned an error.
    #[error("handler '{handler}' failed: {source}")]
    HandlerExecution {
        /// The handler type that failed.
        handler: &'static str,
        /// The handler's original error.
        #[source]
        source: BoxError,
    },

    /// The cancellation signal fired before the handler was invoked.
    #[error("dispatch of '{request}' was cancelled")]
    Cancelled {
        /// The request kind.
        request: &'static str,
    },
}

impl DispatchError {
    /// Returns `true` for [`DispatchError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns `true` for [`DispatchError::HandlerNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HandlerNotFound { .. })
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for dispatch calls.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type for provider resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Result type for registry construction.
pub type RegistrationResult<T> = Result<T, RegistrationError>;
