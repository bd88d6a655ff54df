//! Instance provider capability.
//!
//! The dispatch core never constructs handlers itself. It asks a
//! [`HandlerProvider`] for a live instance of the handler type named by a
//! [`HandlerBinding`], and the provider decides how to build it, honouring the
//! binding's [`Scope`](crate::Scope).
//!
//! [`Container`](crate::Container) is the reference implementation; any DI
//! framework can be plugged in by implementing the trait.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ResolveResult;
use crate::registry::HandlerBinding;
use crate::request::Kind;

/// A type-erased, shareable handler or service instance.
///
/// Carries the [`Kind`] of the value it was created from so that mismatches
/// can be reported by name.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    kind: Kind,
}

impl Instance {
    /// Wraps `value`.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps an already shared value.
    pub fn from_arc<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value,
            kind: Kind::of::<T>(),
        }
    }

    /// The kind of the wrapped value.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Returns `true` if the wrapped value is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Recovers the concrete value, or gives the instance back on mismatch.
    pub fn downcast<T: Send + Sync + 'static>(self) -> Result<Arc<T>, Self> {
        let kind = self.kind;
        self.value
            .downcast::<T>()
            .map_err(|value| Self { value, kind })
    }

    /// Returns `true` if both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Capability that produces live handler instances for bindings.
#[async_trait]
pub trait HandlerProvider: Send + Sync {
    /// Produces an instance of `binding.handler()`.
    ///
    /// Implementations decide whether to build a fresh value or reuse one
    /// according to `binding.scope()`.
    async fn resolve(&self, binding: &HandlerBinding) -> ResolveResult<Instance>;

    /// Reports whether [`resolve`](Self::resolve) could ever succeed for
    /// `binding`. Checked once for every binding at startup.
    fn can_resolve(&self, binding: &HandlerBinding) -> bool {
        let _ = binding;
        true
    }
}

#[async_trait]
impl<P: HandlerProvider + ?Sized> HandlerProvider for Arc<P> {
    async fn resolve(&self, binding: &HandlerBinding) -> ResolveResult<Instance> {
        (**self).resolve(binding).await
    }

    fn can_resolve(&self, binding: &HandlerBinding) -> bool {
        (**self).can_resolve(binding)
    }
}
