//! Handler registry.
//!
//! The [`HandlerRegistry`] maps each request kind to exactly one
//! [`HandlerBinding`]. It is assembled once by a [`RegistryBuilder`] and is
//! immutable afterwards, so any number of senders can read it concurrently
//! without locking.
//!
//! # Building
//!
//! ```rust,ignore
//! let registry = HandlerRegistry::builder()
//!     .default_scope(Scope::PerDispatch)
//!     .register::<CreateAccount, CreateAccountHandler>(Scope::PerDispatch)
//!     .register_fn(handler_fn(|_: ListItems, _| async { Ok::<_, BoxError>(items()) }))
//!     .candidates(&MY_CANDIDATES)
//!     .build()?;
//! ```
//!
//! # Duplicates
//!
//! A second binding for an already-bound request kind is rejected with
//! [`RegistrationError::DuplicateBinding`]; the first binding is kept and
//! [`build`](RegistryBuilder::build) fails. Nothing is ever silently
//! overwritten.
//!
//! # Additive registration
//!
//! A finished registry is never mutated. [`HandlerRegistry::reopen`] hands back
//! a builder seeded with the existing bindings, from which a new registry can
//! be built.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::discovery::HandlerCandidate;
use crate::error::{BoxError, RegistrationError, RegistrationResult};
use crate::handler::RequestHandler;
use crate::provider::{HandlerProvider, Instance};
use crate::request::{Kind, Request};

// =============================================================================
// Scope / BindingSource
// =============================================================================

/// Lifetime policy for handler instances of one binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// A fresh instance is resolved for every dispatch.
    #[default]
    PerDispatch,
    /// One instance is reused by every dispatch; the handler must tolerate
    /// concurrent calls.
    Shared,
}

impl Scope {
    /// Returns the configuration name of this scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerDispatch => "per_dispatch",
            Self::Shared => "shared",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a binding's handler instance comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
    /// Asked from the [`HandlerProvider`] on every dispatch.
    Provider,
    /// Supplied at registration and held by the binding.
    Instance,
}

// =============================================================================
// HandlerBinding
// =============================================================================

/// Association of a request kind with the handler that serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerBinding {
    request: Kind,
    response: Kind,
    handler: Kind,
    scope: Scope,
    source: BindingSource,
}

impl HandlerBinding {
    /// The request kind.
    pub fn request(&self) -> Kind {
        self.request
    }

    /// The response kind, always `R::Response` of the request.
    pub fn response(&self) -> Kind {
        self.response
    }

    /// The handler type.
    pub fn handler(&self) -> Kind {
        self.handler
    }

    /// The resolution scope.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Where instances come from.
    pub fn source(&self) -> BindingSource {
        self.source
    }
}

impl fmt::Display for HandlerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} via {} ({})",
            self.request, self.response, self.handler, self.scope
        )
    }
}

// =============================================================================
// Invoker (internal)
// =============================================================================

pub(crate) enum InvokeError {
    /// The instance is not the handler type the binding was created for.
    Mismatch { found: Kind },
    /// The handler returned an error.
    Handler(BoxError),
}

/// Statically bound call path for one `(R, H)` pair, fixed at registration.
pub(crate) type Invoker<R> = fn(
    Instance,
    R,
    CancellationToken,
) -> BoxFuture<'static, Result<<R as Request>::Response, InvokeError>>;

fn invoke<R, H>(
    instance: Instance,
    request: R,
    cancel: CancellationToken,
) -> BoxFuture<'static, Result<R::Response, InvokeError>>
where
    R: Request,
    H: RequestHandler<R>,
{
    Box::pin(async move {
        let handler = instance.downcast::<H>().map_err(|other| InvokeError::Mismatch {
            found: other.kind(),
        })?;
        handler
            .handle(request, cancel)
            .await
            .map_err(InvokeError::Handler)
    })
}

// =============================================================================
// Entry (internal)
// =============================================================================

/// One registered binding plus its erased invoker.
#[derive(Clone)]
pub(crate) struct Entry {
    binding: HandlerBinding,
    /// Scope asked for at registration; `None` defers to the builder default.
    declared_scope: Option<Scope>,
    /// Holds an [`Invoker<R>`] for the binding's request type.
    invoker: Arc<dyn Any + Send + Sync>,
    instance: Option<Instance>,
}

impl Entry {
    pub(crate) fn provided<R, H>(scope: Option<Scope>) -> Self
    where
        R: Request,
        H: RequestHandler<R>,
    {
        let invoker: Invoker<R> = invoke::<R, H>;
        Self {
            binding: HandlerBinding {
                request: Kind::of::<R>(),
                response: Kind::of::<R::Response>(),
                handler: Kind::of::<H>(),
                scope: scope.unwrap_or_default(),
                source: BindingSource::Provider,
            },
            declared_scope: scope,
            invoker: Arc::new(invoker),
            instance: None,
        }
    }

    fn held<R, H>(handler: H) -> Self
    where
        R: Request,
        H: RequestHandler<R>,
    {
        let invoker: Invoker<R> = invoke::<R, H>;
        Self {
            binding: HandlerBinding {
                request: Kind::of::<R>(),
                response: Kind::of::<R::Response>(),
                handler: Kind::of::<H>(),
                scope: Scope::Shared,
                source: BindingSource::Instance,
            },
            declared_scope: Some(Scope::Shared),
            invoker: Arc::new(invoker),
            instance: Some(Instance::new(handler)),
        }
    }
}

/// Everything the sender needs to dispatch one request kind.
pub(crate) struct Route<'a, R: Request> {
    pub(crate) binding: &'a HandlerBinding,
    pub(crate) invoker: Invoker<R>,
    pub(crate) instance: Option<&'a Instance>,
}

// =============================================================================
// RegistryBuilder
// =============================================================================

/// Collects bindings and produces a [`HandlerRegistry`].
///
/// Registration methods never fail on their own; problems are recorded and
/// reported together by [`build`](Self::build).
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<Entry>,
    index: HashMap<TypeId, usize>,
    default_scope: Scope,
    overrides: HashMap<String, Scope>,
    errors: Vec<RegistrationError>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope applied to bindings registered without an explicit one.
    pub fn default_scope(mut self, scope: Scope) -> Self {
        self.default_scope = scope;
        self
    }

    /// Forces `scope` for the provider-sourced binding whose handler type name
    /// is `handler`, regardless of what the registration declared.
    ///
    /// The name is matched against [`std::any::type_name`], whose exact output
    /// is not guaranteed to stay the same across compiler versions. Check the
    /// names in [`HandlerRegistry::bindings`] after a toolchain upgrade.
    pub fn scope_override(mut self, handler: impl Into<String>, scope: Scope) -> Self {
        self.overrides.insert(handler.into(), scope);
        self
    }

    /// Applies every `(handler type name, scope)` pair as an override.
    pub fn scope_overrides<I, K>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, Scope)>,
        K: Into<String>,
    {
        self.overrides
            .extend(overrides.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Binds `R` to handler type `H`, whose instances come from the provider.
    pub fn register<R, H>(mut self, scope: Scope) -> Self
    where
        R: Request,
        H: RequestHandler<R>,
    {
        self.insert(Entry::provided::<R, H>(Some(scope)));
        self
    }

    /// Binds `R` to an already constructed handler held by the registry.
    ///
    /// Typically used with [`handler_fn`](crate::handler_fn). The binding is
    /// always [`Scope::Shared`].
    pub fn register_fn<R, H>(mut self, handler: H) -> Self
    where
        R: Request,
        H: RequestHandler<R>,
    {
        self.insert(Entry::held::<R, H>(handler));
        self
    }

    /// Binds a single discovery candidate.
    pub fn candidate(mut self, candidate: &HandlerCandidate) -> Self {
        self.insert(candidate.bind());
        self
    }

    /// Binds every candidate of `candidates`, in order.
    pub fn candidates(self, candidates: &[HandlerCandidate]) -> Self {
        candidates
            .iter()
            .fold(self, |builder, candidate| builder.candidate(candidate))
    }

    /// Number of bindings accepted so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been accepted yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, entry: Entry) {
        let request = entry.binding.request;
        if let Some(&pos) = self.index.get(&request.id()) {
            let existing = self.entries[pos].binding.handler.name();
            let rejected = entry.binding.handler.name();
            warn!(
                request = request.name(),
                existing, rejected, "Duplicate handler binding rejected"
            );
            self.errors.push(RegistrationError::DuplicateBinding {
                request: request.name(),
                existing,
                rejected,
            });
            return;
        }

        debug!(
            request = request.name(),
            handler = entry.binding.handler.name(),
            "Handler binding accepted"
        );
        self.index.insert(request.id(), self.entries.len());
        self.entries.push(entry);
    }

    /// Freezes the collected bindings into a registry.
    ///
    /// Scopes are settled here: a configured override wins, then the scope
    /// declared at registration, then the builder's default. Function
    /// handlers stay [`Scope::Shared`].
    ///
    /// # Errors
    ///
    /// Returns the first recorded [`RegistrationError`]; all of them are
    /// logged.
    pub fn build(self) -> RegistrationResult<HandlerRegistry> {
        let Self {
            mut entries,
            index,
            default_scope,
            overrides,
            errors,
        } = self;

        if let Some(first) = errors.first() {
            for err in &errors {
                error!(error = %err, "Handler registration failed");
            }
            return Err(first.clone());
        }

        for entry in &mut entries {
            if entry.binding.source == BindingSource::Instance {
                if overrides.contains_key(entry.binding.handler.name()) {
                    warn!(
                        handler = entry.binding.handler.name(),
                        "Scope override ignored for a handler held by the registry"
                    );
                }
                continue;
            }
            entry.binding.scope = overrides
                .get(entry.binding.handler.name())
                .copied()
                .or(entry.declared_scope)
                .unwrap_or(default_scope);
        }

        for name in overrides.keys() {
            if !entries.iter().any(|e| e.binding.handler.name() == name) {
                warn!(handler = %name, "Scope override names no registered handler");
            }
        }

        info!(bindings = entries.len(), "Handler registry built");
        Ok(HandlerRegistry { entries, index })
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("bindings", &self.entries.len())
            .field("default_scope", &self.default_scope)
            .field("errors", &self.errors)
            .finish()
    }
}

// =============================================================================
// HandlerRegistry
// =============================================================================

/// Immutable mapping from request kind to handler binding.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    entries: Vec<Entry>,
    index: HashMap<TypeId, usize>,
}

impl HandlerRegistry {
    /// Starts a new [`RegistryBuilder`].
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Builds a registry from a candidate set with default settings.
    pub fn from_candidates(candidates: &[HandlerCandidate]) -> RegistrationResult<Self> {
        RegistryBuilder::new().candidates(candidates).build()
    }

    /// Returns a builder holding this registry's bindings, for additive
    /// registration. `self` is left untouched.
    pub fn reopen(&self) -> RegistryBuilder {
        let mut builder = RegistryBuilder::new();
        for entry in &self.entries {
            let mut entry = entry.clone();
            entry.declared_scope = Some(entry.binding.scope);
            builder.insert(entry);
        }
        builder
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no handler is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if a handler is bound for `R`.
    pub fn contains<R: Request>(&self) -> bool {
        self.index.contains_key(&TypeId::of::<R>())
    }

    /// Returns the binding for `R`, if any.
    pub fn binding<R: Request>(&self) -> Option<&HandlerBinding> {
        self.index
            .get(&TypeId::of::<R>())
            .map(|&pos| &self.entries[pos].binding)
    }

    /// All bindings in registration order.
    pub fn bindings(&self) -> impl Iterator<Item = &HandlerBinding> {
        self.entries.iter().map(|e| &e.binding)
    }

    /// Checks that `provider` can satisfy every provider-sourced binding.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Unresolvable`] for the first binding the
    /// provider reports it cannot resolve; all such bindings are logged.
    pub fn verify(&self, provider: &dyn HandlerProvider) -> RegistrationResult<()> {
        let unresolvable: Vec<_> = self
            .bindings()
            .filter(|b| b.source == BindingSource::Provider && !provider.can_resolve(b))
            .map(|b| RegistrationError::Unresolvable {
                request: b.request.name(),
                handler: b.handler.name(),
            })
            .collect();

        for err in &unresolvable {
            error!(error = %err, "Handler binding cannot be resolved");
        }

        match unresolvable.into_iter().next() {
            Some(err) => Err(err),
            None => {
                debug!(bindings = self.len(), "All handler bindings verified");
                Ok(())
            }
        }
    }

    pub(crate) fn route<R: Request>(&self) -> Option<Route<'_, R>> {
        let entry = &self.entries[*self.index.get(&TypeId::of::<R>())?];
        let invoker = *entry.invoker.downcast_ref::<Invoker<R>>()?;
        Some(Route {
            binding: &entry.binding,
            invoker,
            instance: entry.instance.as_ref(),
        })
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.bindings()).finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::handler::handler_fn;

    struct Ping;
    impl Request for Ping {
        type Response = &'static str;
    }

    struct Echo(String);
    impl Request for Echo {
        type Response = String;
    }

    #[derive(Default)]
    struct PingHandler;

    #[async_trait]
    impl RequestHandler<Ping> for PingHandler {
        async fn handle(&self, _: Ping, _: CancellationToken) -> Result<&'static str, BoxError> {
            Ok("pong")
        }
    }

    #[derive(Default)]
    struct LoudPingHandler;

    #[async_trait]
    impl RequestHandler<Ping> for LoudPingHandler {
        async fn handle(&self, _: Ping, _: CancellationToken) -> Result<&'static str, BoxError> {
            Ok("PONG")
        }
    }

    #[derive(Default)]
    struct EchoHandler;

    #[async_trait]
    impl RequestHandler<Echo> for EchoHandler {
        async fn handle(&self, req: Echo, _: CancellationToken) -> Result<String, BoxError> {
            Ok(req.0)
        }
    }

    static CANDIDATES: [HandlerCandidate; 2] = [
        HandlerCandidate::new::<Ping, PingHandler>(None),
        HandlerCandidate::new::<Echo, EchoHandler>(Some(Scope::Shared)),
    ];

    #[test]
    fn binding_records_all_kinds() {
        let registry = HandlerRegistry::builder()
            .register::<Ping, PingHandler>(Scope::Shared)
            .build()
            .unwrap();

        let binding = registry.binding::<Ping>().unwrap();
        assert_eq!(binding.request(), Kind::of::<Ping>());
        assert_eq!(binding.response(), Kind::of::<&'static str>());
        assert_eq!(binding.handler(), Kind::of::<PingHandler>());
        assert_eq!(binding.scope(), Scope::Shared);
        assert_eq!(binding.source(), BindingSource::Provider);
        assert!(registry.contains::<Ping>());
        assert!(!registry.contains::<Echo>());
    }

    #[test]
    fn duplicate_binding_is_rejected() {
        let result = HandlerRegistry::builder()
            .register::<Ping, PingHandler>(Scope::PerDispatch)
            .register::<Ping, LoudPingHandler>(Scope::PerDispatch)
            .build();

        match result {
            Err(RegistrationError::DuplicateBinding {
                existing, rejected, ..
            }) => {
                assert!(existing.ends_with("PingHandler"));
                assert!(rejected.ends_with("LoudPingHandler"));
            }
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_rejection_is_deterministic() {
        let build = || {
            HandlerRegistry::builder()
                .register::<Ping, PingHandler>(Scope::PerDispatch)
                .register::<Ping, LoudPingHandler>(Scope::PerDispatch)
                .build()
                .unwrap_err()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn candidates_rebuild_identically() {
        let first = HandlerRegistry::from_candidates(&CANDIDATES).unwrap();
        let second = HandlerRegistry::from_candidates(&CANDIDATES).unwrap();

        let a: Vec<_> = first.bindings().cloned().collect();
        let b: Vec<_> = second.bindings().cloned().collect();
        assert_eq!(a.len(), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn candidate_without_scope_takes_default() {
        let registry = HandlerRegistry::builder()
            .default_scope(Scope::Shared)
            .candidates(&CANDIDATES)
            .build()
            .unwrap();
        assert_eq!(registry.binding::<Ping>().unwrap().scope(), Scope::Shared);

        let registry = HandlerRegistry::from_candidates(&CANDIDATES).unwrap();
        assert_eq!(
            registry.binding::<Ping>().unwrap().scope(),
            Scope::PerDispatch
        );
        assert_eq!(registry.binding::<Echo>().unwrap().scope(), Scope::Shared);
    }

    #[test]
    fn override_beats_declared_scope() {
        let registry = HandlerRegistry::builder()
            .register::<Echo, EchoHandler>(Scope::Shared)
            .scope_override(std::any::type_name::<EchoHandler>(), Scope::PerDispatch)
            .build()
            .unwrap();
        assert_eq!(
            registry.binding::<Echo>().unwrap().scope(),
            Scope::PerDispatch
        );
    }

    #[test]
    fn override_matches_binding_handler_name_only() {
        let registry = HandlerRegistry::builder()
            .register::<Echo, EchoHandler>(Scope::Shared)
            .scope_override("EchoHandler", Scope::PerDispatch)
            .build()
            .unwrap();
        let binding = registry.binding::<Echo>().unwrap();
        assert_eq!(binding.handler().name(), std::any::type_name::<EchoHandler>());
        assert_eq!(binding.scope(), Scope::Shared);
    }

    #[test]
    fn function_handler_is_held_and_shared() {
        let registry = HandlerRegistry::builder()
            .register_fn(handler_fn(|_: Ping, _| async { Ok::<_, BoxError>("fn") }))
            .build()
            .unwrap();

        let binding = registry.binding::<Ping>().unwrap();
        assert_eq!(binding.source(), BindingSource::Instance);
        assert_eq!(binding.scope(), Scope::Shared);
        assert!(registry.route::<Ping>().unwrap().instance.is_some());
    }

    #[test]
    fn reopen_is_additive_and_leaves_original_alone() {
        let base = HandlerRegistry::builder()
            .register::<Ping, PingHandler>(Scope::Shared)
            .build()
            .unwrap();

        let extended = base
            .reopen()
            .register::<Echo, EchoHandler>(Scope::PerDispatch)
            .build()
            .unwrap();

        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
        assert_eq!(extended.binding::<Ping>(), base.binding::<Ping>());

        let clash = base
            .reopen()
            .register::<Ping, LoudPingHandler>(Scope::Shared)
            .build();
        assert!(matches!(
            clash,
            Err(RegistrationError::DuplicateBinding { .. })
        ));
    }

    struct NothingProvider;

    #[async_trait]
    impl HandlerProvider for NothingProvider {
        async fn resolve(&self, binding: &HandlerBinding) -> crate::ResolveResult<Instance> {
            Err(crate::ResolveError::NotRegistered {
                type_name: binding.handler().name(),
            })
        }

        fn can_resolve(&self, _: &HandlerBinding) -> bool {
            false
        }
    }

    #[test]
    fn verify_reports_unresolvable_bindings() {
        let registry = HandlerRegistry::builder()
            .register::<Ping, PingHandler>(Scope::Shared)
            .build()
            .unwrap();
        assert!(matches!(
            registry.verify(&NothingProvider),
            Err(RegistrationError::Unresolvable { .. })
        ));

        let held_only = HandlerRegistry::builder()
            .register_fn(handler_fn(|_: Ping, _| async { Ok::<_, BoxError>("fn") }))
            .build()
            .unwrap();
        assert!(held_only.verify(&NothingProvider).is_ok());
    }
}
