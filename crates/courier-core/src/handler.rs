//! Handler contract.
//!
//! A [`RequestHandler<R>`] performs the work for one request kind `R` and
//! produces exactly `R::Response`. Because the return type is taken from the
//! request's associated type, a handler whose output disagrees with its
//! request does not compile.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_core::{CancellationToken, BoxError, Request, RequestHandler};
//!
//! struct CreateAccountHandler { repository: Arc<AccountRepository> }
//!
//! #[async_trait::async_trait]
//! impl RequestHandler<CreateAccount> for CreateAccountHandler {
//!     async fn handle(
//!         &self,
//!         request: CreateAccount,
//!         _cancel: CancellationToken,
//!     ) -> Result<String, BoxError> {
//!         self.repository.save();
//!         Ok(format!("Account {} created", request.username))
//!     }
//! }
//! ```
//!
//! Closures can be used as handlers through [`handler_fn`]:
//!
//! ```rust,ignore
//! let ping = handler_fn(|_: Ping, _| async { Ok::<_, BoxError>("pong") });
//! ```

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::BoxError;
use crate::request::Request;

// ============================================================================
// RequestHandler Trait
// ============================================================================

/// The operation performing the work for one request kind.
///
/// The dispatcher calls [`handle`](Self::handle) exactly once per dispatch and
/// never retries. The cancellation token is cooperative: a handler that
/// ignores it runs to completion.
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync + 'static {
    /// Handles `request`, producing its response or an error.
    async fn handle(&self, request: R, cancel: CancellationToken) -> Result<R::Response, BoxError>;
}

// ============================================================================
// HandlerFn - closures as handlers
// ============================================================================

/// A wrapper that turns an async closure into a [`RequestHandler`].
///
/// `T` is a marker for the request and error types so that one closure type
/// can only ever implement the handler contract for one request.
pub struct HandlerFn<F, T> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

impl<F, T> HandlerFn<F, T> {
    /// Creates a new handler function wrapper.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<F: Clone, T> Clone for HandlerFn<F, T> {
    fn clone(&self) -> Self {
        Self {
            f: self.f.clone(),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<R, F, Fut, E> RequestHandler<R> for HandlerFn<F, (R, E)>
where
    R: Request,
    F: Fn(R, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R::Response, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    async fn handle(&self, request: R, cancel: CancellationToken) -> Result<R::Response, BoxError> {
        (self.f)(request, cancel).await.map_err(Into::into)
    }
}

/// Wraps an async closure into a [`HandlerFn`].
pub fn handler_fn<R, F, Fut, E>(f: F) -> HandlerFn<F, (R, E)>
where
    R: Request,
    F: Fn(R, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R::Response, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    HandlerFn::new(f)
}
