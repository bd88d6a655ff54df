//! # Courier Core
//!
//! The dispatch core of the Courier mediator.
//!
//! Callers submit a typed [`Request`] to a [`Sender`]; the sender finds the one
//! handler bound to that request kind, obtains an instance of it from a
//! [`HandlerProvider`], invokes it, and hands back the handler's response.
//! Callers never name the handler.
//!
//! ## Building Blocks
//!
//! - **Contract**: [`Request`] fixes the response type, [`RequestHandler`]
//!   produces it.
//! - **Registry**: [`HandlerRegistry`] maps request kinds to
//!   [`HandlerBinding`]s. It is built once by a [`RegistryBuilder`], from
//!   explicit registrations or from [`HandlerCandidate`]s collected in
//!   [`HANDLER_CANDIDATES`].
//! - **Instances**: a [`HandlerProvider`] builds handler instances according
//!   to each binding's [`Scope`]. [`Container`] is a small reference provider.
//! - **Dispatch**: [`Sender`] ties it together and also implements
//!   `tower::Service`.
//!
//! ```text
//! ┌────────┐  send(R)  ┌────────┐  route   ┌──────────┐
//! │ caller │──────────▶│ Sender │─────────▶│ Registry │
//! └────────┘           └────────┘          └──────────┘
//!      ▲                   │ resolve(binding)
//!      │  R::Response      ▼
//!      │              ┌──────────┐  Instance  ┌─────────────┐
//!      └──────────────│ Handler  │◀───────────│  Provider   │
//!                     └──────────┘            └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use courier_core::prelude::*;
//!
//! struct Ping;
//! impl Request for Ping {
//!     type Response = &'static str;
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = HandlerRegistry::builder()
//!         .register_fn(handler_fn(|_: Ping, _| async { Ok::<_, BoxError>("pong") }))
//!         .build()?;
//!
//!     let sender = Sender::new(Arc::new(registry), Arc::new(Container::new()));
//!     assert_eq!(sender.send(Ping).await?, "pong");
//!     Ok(())
//! }
//! ```

mod container;
mod discovery;
mod error;
mod handler;
mod provider;
mod registry;
mod request;
mod sender;

pub use container::Container;
pub use discovery::{HANDLER_CANDIDATES, HandlerCandidate};
pub use error::{
    BoxError, DispatchError, DispatchResult, RegistrationError, RegistrationResult, ResolveError,
    ResolveResult, ValidationError,
};
pub use handler::{HandlerFn, RequestHandler, handler_fn};
pub use provider::{HandlerProvider, Instance};
pub use registry::{BindingSource, HandlerBinding, HandlerRegistry, RegistryBuilder, Scope};
pub use request::{Kind, Request};
pub use sender::Sender;

// Used by code generated from `#[register_handler]`.
#[doc(hidden)]
pub use linkme;

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        BoxError, CancellationToken, Container, DispatchError, HandlerProvider, HandlerRegistry,
        Request, RequestHandler, Scope, Sender, ValidationError, async_trait, handler_fn,
    };
}
