//! Handler discovery.
//!
//! A [`HandlerCandidate`] is a static, `Copy` description of one
//! `impl RequestHandler<R> for H`. Candidates can be listed by hand in a
//! `static` array, or contributed from anywhere in the final binary to the
//! [`HANDLER_CANDIDATES`] distributed slice, which is what the
//! `#[register_handler]` attribute from `courier-macros` does:
//!
//! ```rust,ignore
//! #[register_handler(scope = shared)]
//! #[async_trait]
//! impl RequestHandler<ListItems> for ListItemsHandler {
//!     async fn handle(&self, _: ListItems, _: CancellationToken) -> Result<Vec<Item>, BoxError> {
//!         Ok(catalog())
//!     }
//! }
//!
//! let registry = HandlerRegistry::linked()?;
//! ```
//!
//! The set of candidates is fixed at link time, so building from it twice
//! yields identical registries.

use std::fmt;

use linkme::distributed_slice;
use tracing::debug;

use crate::error::RegistrationResult;
use crate::handler::RequestHandler;
use crate::registry::{Entry, HandlerRegistry, RegistryBuilder, Scope};
use crate::request::{Kind, Request};

/// Registry of handler candidates contributed via `#[register_handler]`.
#[distributed_slice]
pub static HANDLER_CANDIDATES: [HandlerCandidate];

/// A handler implementation that a [`RegistryBuilder`] can bind.
#[derive(Clone, Copy)]
pub struct HandlerCandidate {
    scope: Option<Scope>,
    bind: fn(Option<Scope>) -> Entry,
    request: fn() -> Kind,
    handler: fn() -> Kind,
}

impl HandlerCandidate {
    /// Describes `impl RequestHandler<R> for H`.
    ///
    /// With `scope: None` the binding takes the builder's default scope.
    pub const fn new<R, H>(scope: Option<Scope>) -> Self
    where
        R: Request,
        H: RequestHandler<R>,
    {
        Self {
            scope,
            bind: Entry::provided::<R, H>,
            request: Kind::of::<R>,
            handler: Kind::of::<H>,
        }
    }

    /// The request kind this candidate serves.
    pub fn request(&self) -> Kind {
        (self.request)()
    }

    /// The handler type.
    pub fn handler(&self) -> Kind {
        (self.handler)()
    }

    /// The explicitly declared scope, if any.
    pub fn scope(&self) -> Option<Scope> {
        self.scope
    }

    pub(crate) fn bind(&self) -> Entry {
        (self.bind)(self.scope)
    }
}

impl fmt::Debug for HandlerCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerCandidate")
            .field("request", &self.request())
            .field("handler", &self.handler())
            .field("scope", &self.scope)
            .finish()
    }
}

impl RegistryBuilder {
    /// Binds every candidate contributed to [`HANDLER_CANDIDATES`].
    pub fn linked(self) -> Self {
        debug!(
            candidates = HANDLER_CANDIDATES.len(),
            "Collecting linked handler candidates"
        );
        self.candidates(&HANDLER_CANDIDATES)
    }
}

impl HandlerRegistry {
    /// Builds a registry from [`HANDLER_CANDIDATES`] with default settings.
    pub fn linked() -> RegistrationResult<Self> {
        RegistryBuilder::new().linked().build()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::error::BoxError;

    struct Hello;
    impl Request for Hello {
        type Response = String;
    }

    struct HelloHandler;

    #[async_trait]
    impl RequestHandler<Hello> for HelloHandler {
        async fn handle(&self, _: Hello, _: CancellationToken) -> Result<String, BoxError> {
            Ok("hi".into())
        }
    }

    #[test]
    fn candidate_reports_kinds() {
        let candidate = HandlerCandidate::new::<Hello, HelloHandler>(Some(Scope::Shared));
        assert_eq!(candidate.request(), Kind::of::<Hello>());
        assert_eq!(candidate.handler(), Kind::of::<HelloHandler>());
        assert_eq!(candidate.scope(), Some(Scope::Shared));
    }

    #[test]
    fn candidate_scope_survives_bind() {
        let candidate = HandlerCandidate::new::<Hello, HelloHandler>(Some(Scope::Shared));
        let registry = RegistryBuilder::new().candidate(&candidate).build().unwrap();
        assert_eq!(registry.binding::<Hello>().unwrap().scope(), Scope::Shared);
    }
}
