//! # Courier
//!
//! A typed, in-process mediator.
//!
//! ## Overview
//!
//! Callers describe an operation as a [`Request`](core::Request) value and
//! submit it; Courier finds the single handler registered for that request
//! kind, obtains an instance of it, runs it, and returns its response. The
//! response type is fixed by the request, so a mismatch is a compile error.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────┐     ┌──────────────┐     ┌─────────────┐
//! │  courier.toml│────▶│  Mediator  │────▶│   Registry   │────▶│   Handler   │
//! │  + linked    │     │  Builder   │     │ (immutable)  │     │  (provider) │
//! │  handlers    │     └────────────┘     └──────────────┘     └─────────────┘
//! └──────────────┘            │                  ▲
//!                             ▼                  │ route
//!                       ┌────────────┐ send(R)   │
//!                       │   Sender   │───────────┘
//!                       └────────────┘
//! ```
//!
//! - **core**: request/handler contract, registry, provider capability, sender
//! - **runtime**: configuration, logging, and startup wiring
//! - **macros**: `#[register_handler]` for link-time discovery
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! pub struct CreateAccount { pub username: String, pub password: String }
//!
//! impl Request for CreateAccount {
//!     type Response = String;
//! }
//!
//! #[derive(Default)]
//! pub struct CreateAccountHandler;
//!
//! #[register_handler]
//! #[async_trait]
//! impl RequestHandler<CreateAccount> for CreateAccountHandler {
//!     async fn handle(&self, req: CreateAccount, _: CancellationToken) -> Result<String, BoxError> {
//!         Ok(format!("Account {} created", req.username))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut container = Container::new();
//!     container.register_default::<CreateAccountHandler>();
//!
//!     let mediator = Mediator::builder().provider(container).build()?;
//!     let message = mediator
//!         .send(CreateAccount { username: "admin".into(), password: "123123".into() })
//!         .await?;
//!     assert_eq!(message, "Account admin created");
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `macros`: `#[register_handler]` attribute (default)
//! - `toml-config`: `courier.toml` configuration files (default)
//! - `yaml-config`: `courier.yaml` configuration files
//! - `json-log`: JSON log output

pub use courier_core as core;
#[cfg(feature = "macros")]
pub use courier_macros as macros;
pub use courier_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    pub use courier_core::{
        BoxError, CancellationToken, Container, DispatchError, DispatchResult, HandlerProvider,
        HandlerRegistry, Request, RequestHandler, Scope, Sender, ValidationError, async_trait,
        handler_fn,
    };

    #[cfg(feature = "macros")]
    pub use courier_macros::register_handler;

    pub use courier_runtime::{CourierConfig, Mediator, MediatorBuilder, RuntimeError};
}
