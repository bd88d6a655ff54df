//! Courier Runtime - startup layer for the Courier mediator.
//!
//! This crate provides:
//! - Layered configuration loading (`config`)
//! - Logging setup from configuration (`logging`)
//! - `MediatorBuilder`, which wires configuration, linked and explicit
//!   handler registrations, and an instance provider into a ready `Mediator`
//!
//! ```ignore
//! use courier_runtime::Mediator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mediator = Mediator::builder().provider(container()).build()?;
//!     let items = mediator.send(ListItems).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod mediator;

// Re-exports
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, CourierConfig, DispatchConfig, LoggingConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use mediator::{Mediator, MediatorBuilder};

// Re-export tracing for use by other crates
pub use tracing;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use super::{Mediator, MediatorBuilder};
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
