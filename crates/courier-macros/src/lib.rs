//! Procedural macros for the Courier mediator.
//!
//! This crate provides:
//!
//! - `#[register_handler]` - Contributes a `RequestHandler` impl to the
//!   link-time handler candidate set.
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! #[register_handler]
//! #[async_trait]
//! impl RequestHandler<CreateAccount> for CreateAccountHandler {
//!     async fn handle(&self, req: CreateAccount, _: CancellationToken) -> Result<String, BoxError> {
//!         Ok(format!("Account {} created", req.username))
//!     }
//! }
//!
//! let registry = HandlerRegistry::linked()?;
//! ```

mod handler;

use proc_macro::TokenStream;

/// Registers a `RequestHandler<R>` impl for discovery.
///
/// The impl is left unchanged. A `HandlerCandidate` for it is appended to the
/// `HANDLER_CANDIDATES` distributed slice, so `HandlerRegistry::linked()`
/// binds it without any explicit registration call.
///
/// # Arguments
///
/// - `scope = shared | per_dispatch` - Scope declared for the binding. When
///   omitted, the registry builder's default applies.
/// - `crate = path` - Path to the dispatch core (default `::courier::core`).
///   Crates that depend on `courier-core` directly pass
///   `crate = ::courier_core`.
///
/// # Restrictions
///
/// Only non-generic `impl RequestHandler<R> for H` blocks are accepted: each
/// candidate must name one concrete request and one concrete handler.
///
/// # Example
///
/// ```rust,ignore
/// #[register_handler(scope = shared)]
/// #[async_trait]
/// impl RequestHandler<ListItems> for ListItemsHandler {
///     async fn handle(&self, _: ListItems, _: CancellationToken) -> Result<Vec<Item>, BoxError> {
///         Ok(catalog())
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn register_handler(attr: TokenStream, item: TokenStream) -> TokenStream {
    handler::register_handler(attr.into(), item.into()).into()
}
