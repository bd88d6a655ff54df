//! The dispatcher.
//!
//! [`Sender`] resolves the handler bound to a request's kind and invokes it:
//!
//! 1. The request validates itself; failure ends the call.
//! 2. A cancelled token ends the call before any lookup.
//! 3. The registry is consulted for the request kind.
//! 4. The instance is taken from the binding or asked from the provider,
//!    racing the cancellation token.
//! 5. The handler is invoked exactly once through the call path fixed at
//!    registration, and its result is returned.
//!
//! ```rust,ignore
//! let sender = Sender::new(Arc::new(registry), Arc::new(container));
//! let message: String = sender.send(CreateAccount::new("admin", "123123")).await?;
//! ```
//!
//! `Sender` is cheap to clone and holds no per-request state. It also
//! implements [`tower::Service<R>`] for every request type, so it can sit
//! underneath tower middleware.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{Instrument, debug, debug_span, trace, warn};

use crate::error::{DispatchError, DispatchResult};
use crate::provider::HandlerProvider;
use crate::registry::{HandlerRegistry, InvokeError};
use crate::request::Request;

/// Resolves and invokes handlers for submitted requests.
#[derive(Clone)]
pub struct Sender {
    registry: Arc<HandlerRegistry>,
    provider: Arc<dyn HandlerProvider>,
}

impl Sender {
    /// Creates a sender over `registry`, resolving instances through `provider`.
    pub fn new(registry: Arc<HandlerRegistry>, provider: Arc<dyn HandlerProvider>) -> Self {
        Self { registry, provider }
    }

    /// The registry this sender dispatches against.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Dispatches `request` without a cancellation signal.
    pub async fn send<R: Request>(&self, request: R) -> DispatchResult<R::Response> {
        self.send_with(request, CancellationToken::new()).await
    }

    /// Dispatches `request`, forwarding `cancel` to resolution and to the handler.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::InvalidArgument`] if `request.validate()` fails.
    /// - [`DispatchError::Cancelled`] if `cancel` fires before the handler is invoked.
    /// - [`DispatchError::HandlerNotFound`] if nothing is bound for `R`.
    /// - [`DispatchError::HandlerResolution`] if the provider fails.
    /// - [`DispatchError::TypeMismatch`] if the provider returns a foreign instance.
    /// - [`DispatchError::HandlerExecution`] if the handler returns an error.
    pub async fn send_with<R: Request>(
        &self,
        request: R,
        cancel: CancellationToken,
    ) -> DispatchResult<R::Response> {
        let request_name = type_name::<R>();

        if let Err(source) = request.validate() {
            warn!(request = request_name, error = %source, "Request rejected by validation");
            return Err(DispatchError::InvalidArgument {
                request: request_name,
                source,
            });
        }

        if cancel.is_cancelled() {
            debug!(request = request_name, "Dispatch cancelled before lookup");
            return Err(DispatchError::Cancelled {
                request: request_name,
            });
        }

        let Some(route) = self.registry.route::<R>() else {
            warn!(request = request_name, "No handler registered");
            return Err(DispatchError::HandlerNotFound {
                request: request_name,
            });
        };

        let binding = route.binding;
        let handler_name = binding.handler().name();
        let span = debug_span!(
            "dispatch",
            request = request_name,
            handler = handler_name,
            scope = %binding.scope()
        );

        async move {
            let instance = match route.instance {
                Some(instance) => instance.clone(),
                None => {
                    trace!("Resolving handler instance");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!("Dispatch cancelled during resolution");
                            return Err(DispatchError::Cancelled { request: request_name });
                        }
                        resolved = self.provider.resolve(binding) => {
                            resolved.map_err(|source| {
                                warn!(error = %source, "Handler resolution failed");
                                DispatchError::HandlerResolution {
                                    handler: handler_name,
                                    source,
                                }
                            })?
                        }
                    }
                }
            };

            if cancel.is_cancelled() {
                debug!("Dispatch cancelled before invocation");
                return Err(DispatchError::Cancelled {
                    request: request_name,
                });
            }

            match (route.invoker)(instance, request, cancel).await {
                Ok(response) => {
                    trace!("Handler completed");
                    Ok(response)
                }
                Err(InvokeError::Mismatch { found }) => {
                    warn!(found = found.name(), "Provider returned a foreign instance");
                    Err(DispatchError::TypeMismatch {
                        expected: handler_name,
                        found: found.name(),
                    })
                }
                Err(InvokeError::Handler(source)) => {
                    warn!(error = %source, "Handler returned an error");
                    Err(DispatchError::HandlerExecution {
                        handler: handler_name,
                        source,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }
}

impl fmt::Debug for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("bindings", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl<R: Request> Service<R> for Sender {
    type Response = R::Response;
    type Error = DispatchError;
    type Future = BoxFuture<'static, DispatchResult<R::Response>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: R) -> Self::Future {
        let sender = self.clone();
        Box::pin(async move { sender.send(request).await })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};
    use tower::ServiceExt;

    use super::*;
    use crate::container::Container;
    use crate::error::{BoxError, ResolveError, ResolveResult, ValidationError};
    use crate::handler::{RequestHandler, handler_fn};
    use crate::provider::Instance;
    use crate::registry::{HandlerBinding, Scope};

    // ---------------------------------------------------------------------
    // Fixtures
    // ---------------------------------------------------------------------

    #[derive(Default)]
    struct AccountRepository {
        saves: AtomicUsize,
    }

    impl AccountRepository {
        fn save(&self) {
            self.saves.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CreateAccount {
        username: String,
        password: String,
    }

    impl Request for CreateAccount {
        type Response = String;

        fn validate(&self) -> Result<(), ValidationError> {
            if self.username.is_empty() {
                return Err(ValidationError::new("username must not be empty"));
            }
            Ok(())
        }
    }

    struct CreateAccountHandler {
        repository: Arc<AccountRepository>,
    }

    #[async_trait]
    impl RequestHandler<CreateAccount> for CreateAccountHandler {
        async fn handle(
            &self,
            request: CreateAccount,
            _cancel: CancellationToken,
        ) -> Result<String, BoxError> {
            assert!(!request.password.is_empty());
            self.repository.save();
            Ok(format!("Account {} created", request.username))
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item {
        id: u32,
        title: &'static str,
    }

    struct ListItems;
    impl Request for ListItems {
        type Response = Vec<Item>;
    }

    #[derive(Default)]
    struct ListItemsHandler;

    #[async_trait]
    impl RequestHandler<ListItems> for ListItemsHandler {
        async fn handle(&self, _: ListItems, _: CancellationToken) -> Result<Vec<Item>, BoxError> {
            Ok(vec![
                Item {
                    id: 1,
                    title: "Book 1",
                },
                Item {
                    id: 2,
                    title: "Book 2",
                },
            ])
        }
    }

    struct Unbound;
    impl Request for Unbound {
        type Response = ();
    }

    struct Fail;
    impl Request for Fail {
        type Response = ();
    }

    fn account_sender() -> (Sender, Arc<AccountRepository>) {
        let repository = Arc::new(AccountRepository::default());
        let mut container = Container::new();
        container
            .provide_arc(Arc::clone(&repository))
            .register(|c| {
                Ok(CreateAccountHandler {
                    repository: c.get::<AccountRepository>()?,
                })
            })
            .register_default::<ListItemsHandler>();

        let registry = HandlerRegistry::builder()
            .register::<CreateAccount, CreateAccountHandler>(Scope::PerDispatch)
            .register::<ListItems, ListItemsHandler>(Scope::Shared)
            .build()
            .unwrap();

        (
            Sender::new(Arc::new(registry), Arc::new(container)),
            repository,
        )
    }

    fn create_admin() -> CreateAccount {
        CreateAccount {
            username: "admin".into(),
            password: "123123".into(),
        }
    }

    // ---------------------------------------------------------------------
    // Scenarios
    // ---------------------------------------------------------------------

    #[tokio::test]
    async fn create_account_runs_side_effect_once() {
        let (sender, repository) = account_sender();

        let message = sender.send(create_admin()).await.unwrap();

        assert_eq!(message, "Account admin created");
        assert_eq!(repository.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn list_items_is_stable_across_dispatches() {
        let (sender, _) = account_sender();

        let first = sender.send(ListItems).await.unwrap();
        let second = sender.send(ListItems).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    // ---------------------------------------------------------------------
    // Failure paths
    // ---------------------------------------------------------------------

    #[tokio::test]
    async fn unregistered_request_is_not_found() {
        let (sender, _) = account_sender();
        let err = sender.send(Unbound).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_handler() {
        let (sender, repository) = account_sender();
        let err = sender
            .send(CreateAccount {
                username: String::new(),
                password: "x".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::InvalidArgument { .. }));
        assert_eq!(repository.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_before_resolution_skips_handler() {
        let (sender, repository) = account_sender();
        let token = CancellationToken::new();
        token.cancel();

        let err = sender.send_with(create_admin(), token).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(repository.saves.load(Ordering::SeqCst), 0);
    }

    struct SlowProvider {
        resolved: AtomicUsize,
    }

    #[async_trait]
    impl HandlerProvider for SlowProvider {
        async fn resolve(&self, _: &HandlerBinding) -> ResolveResult<Instance> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            self.resolved.fetch_add(1, Ordering::SeqCst);
            Ok(Instance::new(ListItemsHandler))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_during_resolution_skips_handler() {
        let provider = Arc::new(SlowProvider {
            resolved: AtomicUsize::new(0),
        });
        let registry = HandlerRegistry::builder()
            .register::<ListItems, ListItemsHandler>(Scope::PerDispatch)
            .build()
            .unwrap();
        let sender = Sender::new(Arc::new(registry), provider.clone());

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = sender.send_with(ListItems, token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(provider.resolved.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_failure_is_resolution_error() {
        let registry = HandlerRegistry::builder()
            .register::<ListItems, ListItemsHandler>(Scope::PerDispatch)
            .build()
            .unwrap();
        let sender = Sender::new(Arc::new(registry), Arc::new(Container::new()));

        match sender.send(ListItems).await {
            Err(DispatchError::HandlerResolution { handler, source }) => {
                assert!(handler.ends_with("ListItemsHandler"));
                assert!(matches!(source, ResolveError::NotRegistered { .. }));
            }
            other => panic!("expected resolution error, got {:?}", other.map(|_| ())),
        }
    }

    struct WrongProvider;

    #[async_trait]
    impl HandlerProvider for WrongProvider {
        async fn resolve(&self, _: &HandlerBinding) -> ResolveResult<Instance> {
            Ok(Instance::new(String::from("not a handler")))
        }
    }

    #[tokio::test]
    async fn foreign_instance_is_type_mismatch() {
        let registry = HandlerRegistry::builder()
            .register::<ListItems, ListItemsHandler>(Scope::PerDispatch)
            .build()
            .unwrap();
        let sender = Sender::new(Arc::new(registry), Arc::new(WrongProvider));

        match sender.send(ListItems).await {
            Err(DispatchError::TypeMismatch { expected, found }) => {
                assert!(expected.ends_with("ListItemsHandler"));
                assert_eq!(found, type_name::<String>());
            }
            other => panic!("expected type mismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn handler_error_is_wrapped_with_cause() {
        let registry = HandlerRegistry::builder()
            .register_fn(handler_fn(|_: Fail, _| async { Err::<(), _>("boom") }))
            .build()
            .unwrap();
        let sender = Sender::new(Arc::new(registry), Arc::new(Container::new()));

        let err = assert_err!(sender.send(Fail).await);
        match err {
            DispatchError::HandlerExecution { source, .. } => {
                assert_eq!(source.to_string(), "boom")
            }
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn function_handler_runs_once_per_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = HandlerRegistry::builder()
            .register_fn(handler_fn(move |_: Unbound, _| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, BoxError>(())
                }
            }))
            .build()
            .unwrap();
        let sender = Sender::new(Arc::new(registry), Arc::new(Container::new()));

        assert_ok!(sender.send(Unbound).await);
        assert_ok!(sender.send(Unbound).await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_dispatches_do_not_interfere() {
        let (sender, repository) = account_sender();

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let sender = sender.clone();
                tokio::spawn(async move {
                    sender
                        .send(CreateAccount {
                            username: format!("user{i}"),
                            password: "pw".into(),
                        })
                        .await
                })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap().unwrap(), format!("Account user{i} created"));
        }
        assert_eq!(repository.saves.load(Ordering::SeqCst), 16);
    }

    #[tokio::test]
    async fn sender_is_a_tower_service() {
        let (sender, _) = account_sender();
        let items = sender.clone().oneshot(ListItems).await.unwrap();
        assert_eq!(items.len(), 2);

        let err = sender.oneshot(Unbound).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
