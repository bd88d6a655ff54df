//! Startup wiring.
//!
//! [`MediatorBuilder`] turns configuration, registrations and an instance
//! provider into a ready [`Mediator`]:
//!
//! 1. Load and validate [`CourierConfig`] (unless one is supplied).
//! 2. Initialize logging from it.
//! 3. Collect linked handler candidates and explicit registrations.
//! 4. Apply the configured default scope and scope overrides, then build the
//!    registry. Duplicate bindings abort here.
//! 5. Verify that the provider can resolve every binding, if enabled.
//!
//! ```rust,ignore
//! let mut container = Container::new();
//! container.register(|c| Ok(CreateAccountHandler::new(c.get()?)));
//!
//! let mediator = Mediator::builder()
//!     .config_file("courier.toml")
//!     .provider(container)
//!     .build()?;
//!
//! let message = mediator.send(CreateAccount::new("admin", "123123")).await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use courier_core::{
    CancellationToken, Container, DispatchResult, HandlerCandidate, HandlerProvider,
    HandlerRegistry, RegistryBuilder, Request, RequestHandler, Scope, Sender,
};
use tracing::{debug, info};

use crate::config::{ConfigLoader, CourierConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// A configured dispatcher plus the configuration it was built from.
#[derive(Debug, Clone)]
pub struct Mediator {
    config: CourierConfig,
    sender: Sender,
}

impl Mediator {
    /// Starts a [`MediatorBuilder`].
    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::new()
    }

    /// The effective configuration.
    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    /// The dispatcher. Cheap to clone and hand out.
    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    /// The frozen handler registry.
    pub fn registry(&self) -> &HandlerRegistry {
        self.sender.registry()
    }

    /// Dispatches `request`. See [`Sender::send`].
    pub async fn send<R: Request>(&self, request: R) -> DispatchResult<R::Response> {
        self.sender.send(request).await
    }

    /// Dispatches `request` with a cancellation signal. See [`Sender::send_with`].
    pub async fn send_with<R: Request>(
        &self,
        request: R,
        cancel: CancellationToken,
    ) -> DispatchResult<R::Response> {
        self.sender.send_with(request, cancel).await
    }
}

/// Builder for [`Mediator`].
pub struct MediatorBuilder {
    config: Option<CourierConfig>,
    loader: ConfigLoader,
    registry: RegistryBuilder,
    provider: Option<Arc<dyn HandlerProvider>>,
    linked: bool,
    init_logging: bool,
}

impl Default for MediatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MediatorBuilder {
    /// Creates a builder that loads configuration from the default locations
    /// and collects linked handlers.
    pub fn new() -> Self {
        Self {
            config: None,
            loader: ConfigLoader::new(),
            registry: RegistryBuilder::new(),
            provider: None,
            linked: true,
            init_logging: true,
        }
    }

    /// Uses `config` as is instead of loading one.
    pub fn config(mut self, config: CourierConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the configuration loader.
    pub fn loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Loads configuration from exactly this file.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.loader = self.loader.file(path.into());
        self
    }

    /// Selects the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    /// Sets the instance provider. Defaults to an empty [`Container`].
    pub fn provider<P: HandlerProvider + 'static>(mut self, provider: P) -> Self {
        let provider: Arc<dyn HandlerProvider> = Arc::new(provider);
        self.provider = Some(provider);
        self
    }

    /// Sets an already shared instance provider.
    pub fn provider_arc(mut self, provider: Arc<dyn HandlerProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Binds `R` to `H` with an explicit scope. See [`RegistryBuilder::register`].
    pub fn register<R, H>(mut self, scope: Scope) -> Self
    where
        R: Request,
        H: RequestHandler<R>,
    {
        self.registry = self.registry.register::<R, H>(scope);
        self
    }

    /// Binds `R` to a held handler instance. See [`RegistryBuilder::register_fn`].
    pub fn register_fn<R, H>(mut self, handler: H) -> Self
    where
        R: Request,
        H: RequestHandler<R>,
    {
        self.registry = self.registry.register_fn(handler);
        self
    }

    /// Binds an explicit candidate set.
    pub fn candidates(mut self, candidates: &[HandlerCandidate]) -> Self {
        self.registry = self.registry.candidates(candidates);
        self
    }

    /// Skips handlers contributed through `#[register_handler]`.
    pub fn without_linked(mut self) -> Self {
        self.linked = false;
        self
    }

    /// Leaves the global `tracing` subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Builds the mediator.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Config`](crate::RuntimeError::Config) if configuration
    /// fails to load or validate, and
    /// [`RuntimeError::Registration`](crate::RuntimeError::Registration) for
    /// duplicate bindings or, with `verify_on_start`, unresolvable ones.
    pub fn build(self) -> RuntimeResult<Mediator> {
        let config = match self.config {
            Some(config) => config,
            None => self.loader.load()?,
        };
        validate_config(&config)?;

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let mut registry = self.registry;
        if self.linked {
            registry = registry.linked();
        }
        let registry = registry
            .default_scope(config.dispatch.default_scope)
            .scope_overrides(
                config
                    .dispatch
                    .scopes
                    .iter()
                    .map(|(handler, scope)| (handler.clone(), *scope)),
            )
            .build()?;

        let provider: Arc<dyn HandlerProvider> = match self.provider {
            Some(provider) => provider,
            None => Arc::new(Container::new()),
        };

        if config.dispatch.verify_on_start {
            registry.verify(provider.as_ref())?;
        } else {
            debug!("Skipping handler verification");
        }

        info!(
            bindings = registry.len(),
            default_scope = %config.dispatch.default_scope,
            "Mediator ready"
        );

        Ok(Mediator {
            sender: Sender::new(Arc::new(registry), provider),
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use courier_core::{BoxError, DispatchError, HandlerCandidate, RegistrationError, handler_fn};
    use tokio_test::assert_ok;

    use super::*;
    use crate::error::RuntimeError;

    struct Ping;
    impl Request for Ping {
        type Response = &'static str;
    }

    #[derive(Default)]
    struct PingHandler;

    #[async_trait]
    impl RequestHandler<Ping> for PingHandler {
        async fn handle(&self, _: Ping, _: CancellationToken) -> Result<&'static str, BoxError> {
            Ok("pong")
        }
    }

    static PING: [HandlerCandidate; 1] = [HandlerCandidate::new::<Ping, PingHandler>(None)];

    fn builder() -> MediatorBuilder {
        Mediator::builder()
            .config(CourierConfig::default())
            .without_logging()
    }

    fn container() -> Container {
        let mut container = Container::new();
        container.register_default::<PingHandler>();
        container
    }

    #[tokio::test]
    async fn builds_and_dispatches() {
        let mediator = assert_ok!(
            builder()
                .register::<Ping, PingHandler>(Scope::Shared)
                .provider(container())
                .build()
        );
        assert_eq!(mediator.send(Ping).await.unwrap(), "pong");
        assert_eq!(mediator.registry().len(), 1);
    }

    #[test]
    fn config_drives_default_scope_and_overrides() {
        let mut config = CourierConfig::default();
        config.dispatch.default_scope = Scope::Shared;

        let mediator = builder()
            .config(config.clone())
            .candidates(&PING)
            .provider(container())
            .build()
            .unwrap();
        assert_eq!(
            mediator.registry().binding::<Ping>().unwrap().scope(),
            Scope::Shared
        );

        config.dispatch.scopes.insert(
            std::any::type_name::<PingHandler>().to_string(),
            Scope::PerDispatch,
        );
        let mediator = builder()
            .config(config)
            .candidates(&PING)
            .provider(container())
            .build()
            .unwrap();
        assert_eq!(
            mediator.registry().binding::<Ping>().unwrap().scope(),
            Scope::PerDispatch
        );
    }

    #[test]
    fn unresolvable_binding_aborts_startup() {
        let err = builder()
            .register::<Ping, PingHandler>(Scope::PerDispatch)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Registration(RegistrationError::Unresolvable { .. })
        ));
    }

    #[tokio::test]
    async fn verification_can_be_skipped() {
        let mut config = CourierConfig::default();
        config.dispatch.verify_on_start = false;

        let mediator = builder()
            .config(config)
            .register::<Ping, PingHandler>(Scope::PerDispatch)
            .build()
            .unwrap();

        let err = mediator.send(Ping).await.unwrap_err();
        assert!(matches!(err, DispatchError::HandlerResolution { .. }));
    }

    #[test]
    fn duplicate_binding_aborts_startup() {
        let err = builder()
            .register::<Ping, PingHandler>(Scope::Shared)
            .register_fn(handler_fn(|_: Ping, _| async { Ok::<_, BoxError>("again") }))
            .provider(container())
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Registration(RegistrationError::DuplicateBinding { .. })
        ));
    }

    #[test]
    fn invalid_config_aborts_startup() {
        let mut config = CourierConfig::default();
        config.dispatch.scopes.insert(String::new(), Scope::Shared);

        let err = builder().config(config).build().unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }
}
