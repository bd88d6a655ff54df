//! Reference [`HandlerProvider`]: a small type-keyed container.
//!
//! The container maps a type to either a shared value ([`provide`]) or a
//! factory ([`register`]). Factories receive the container so they can pull
//! their own dependencies:
//!
//! ```rust,ignore
//! let mut container = Container::new();
//! container
//!     .provide(AccountRepository::default())
//!     .register(|c| Ok(CreateAccountHandler::new(c.get::<AccountRepository>()?)));
//! ```
//!
//! When a handler is resolved for a binding, the binding's [`Scope`] decides
//! whether the factory runs on every dispatch or once, with the result
//! cached for later dispatches. A provided value can only back a
//! [`Scope::Shared`] binding; per-dispatch bindings need a factory.
//!
//! [`provide`]: Container::provide
//! [`register`]: Container::register

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use crate::error::{BoxError, ResolveError, ResolveResult};
use crate::provider::{HandlerProvider, Instance};
use crate::registry::{HandlerBinding, Scope};
use crate::request::Kind;

type Factory = Arc<dyn Fn(&Container) -> Result<Instance, BoxError> + Send + Sync>;

struct FactoryEntry {
    kind: Kind,
    factory: Factory,
}

/// Type-keyed instance container.
#[derive(Default)]
pub struct Container {
    factories: HashMap<TypeId, FactoryEntry>,
    values: HashMap<TypeId, Instance>,
    /// Instances built for [`Scope::Shared`] bindings.
    shared: RwLock<HashMap<TypeId, Instance>>,
}

impl Container {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` as the single instance of `T`.
    ///
    /// Every lookup of `T` returns the same allocation. A value takes
    /// precedence over a factory registered for the same type.
    pub fn provide<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.values.insert(TypeId::of::<T>(), Instance::new(value));
        self
    }

    /// Stores an already shared `value` as the single instance of `T`.
    pub fn provide_arc<T: Send + Sync + 'static>(&mut self, value: Arc<T>) -> &mut Self {
        self.values.insert(TypeId::of::<T>(), Instance::from_arc(value));
        self
    }

    /// Registers a factory for `T`.
    ///
    /// Plain lookups through [`get`](Self::get) run the factory every time.
    /// Handler resolution follows the binding's scope.
    pub fn register<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.factories.insert(
            TypeId::of::<T>(),
            FactoryEntry {
                kind: Kind::of::<T>(),
                factory: Arc::new(move |c| factory(c).map(Instance::new)),
            },
        );
        self
    }

    /// Registers `T::default` as the factory for `T`.
    pub fn register_default<T>(&mut self) -> &mut Self
    where
        T: Default + Send + Sync + 'static,
    {
        self.register(|_| Ok(T::default()))
    }

    /// Returns `true` if a value or factory exists for `T`.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.contains_id(TypeId::of::<T>())
    }

    fn contains_id(&self, id: TypeId) -> bool {
        self.values.contains_key(&id) || self.factories.contains_key(&id)
    }

    /// Looks up `T`, building it if only a factory is known.
    ///
    /// # Errors
    ///
    /// [`ResolveError::NotRegistered`] if nothing is known for `T`, or
    /// [`ResolveError::Factory`] if the factory fails.
    pub fn get<T: Send + Sync + 'static>(&self) -> ResolveResult<Arc<T>> {
        let instance = self.build(Kind::of::<T>())?;
        instance
            .downcast::<T>()
            .map_err(|_| ResolveError::not_registered::<T>())
    }

    fn build(&self, kind: Kind) -> ResolveResult<Instance> {
        if let Some(value) = self.values.get(&kind.id()) {
            return Ok(value.clone());
        }
        self.build_fresh(kind)
    }

    fn build_fresh(&self, kind: Kind) -> ResolveResult<Instance> {
        let entry = self
            .factories
            .get(&kind.id())
            .ok_or(ResolveError::NotRegistered {
                type_name: kind.name(),
            })?;
        trace!(type_name = entry.kind.name(), "Running factory");
        (entry.factory)(self).map_err(|source| ResolveError::Factory {
            type_name: entry.kind.name(),
            source,
        })
    }

    fn build_shared(&self, kind: Kind) -> ResolveResult<Instance> {
        if let Some(instance) = self.shared.read().get(&kind.id()) {
            return Ok(instance.clone());
        }
        let mut cache = self.shared.write();
        // Another dispatch may have filled the slot between the two locks.
        if let Some(instance) = cache.get(&kind.id()) {
            return Ok(instance.clone());
        }
        let instance = self.build(kind)?;
        cache.insert(kind.id(), instance.clone());
        Ok(instance)
    }
}

#[async_trait]
impl HandlerProvider for Container {
    async fn resolve(&self, binding: &HandlerBinding) -> ResolveResult<Instance> {
        let handler = binding.handler();
        match binding.scope() {
            Scope::PerDispatch => self.build_fresh(handler),
            Scope::Shared => self.build_shared(handler),
        }
    }

    fn can_resolve(&self, binding: &HandlerBinding) -> bool {
        let id = binding.handler().id();
        match binding.scope() {
            Scope::PerDispatch => self.factories.contains_key(&id),
            Scope::Shared => self.contains_id(id),
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("factories", &self.factories.len())
            .field("values", &self.values.len())
            .field("shared", &self.shared.read().len())
            .finish()
    }
}
