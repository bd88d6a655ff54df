//! Request/response contract.
//!
//! A [`Request`] names its response type through an associated type, so the
//! pairing is fixed where the request is defined and checked by the compiler
//! everywhere else.
//!
//! ```rust,ignore
//! struct CreateAccount { username: String, password: String }
//!
//! impl Request for CreateAccount {
//!     type Response = String;
//! }
//! ```

use std::any::{TypeId, type_name};
use std::fmt;

use crate::error::ValidationError;

/// A value describing an operation, bound to the response kind it produces.
pub trait Request: Send + 'static {
    /// The one response type a handler for this request must produce.
    type Response: Send + 'static;

    /// Checks the request before any handler lookup happens.
    ///
    /// A failure is reported as [`DispatchError::InvalidArgument`] and no
    /// handler is resolved or invoked.
    ///
    /// [`DispatchError::InvalidArgument`]: crate::DispatchError::InvalidArgument
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Runtime identity of a type taking part in a binding.
///
/// Used for request kinds, response kinds, and handler types alike.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Kind {
    id: TypeId,
    name: &'static str,
}

impl Kind {
    /// Returns the kind of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Returns the [`TypeId`] of the type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the full type name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
