//! `Cached<T>` (spec §4.D): "the only supported handle for use inside
//! another service, so that dependencies are resolved at first access, not
//! at construction time." A service holds a `Cached<T>` instead of a
//! direct instance pointer acquired before first use (spec §3 "Ownership":
//! "a service can hold a *weak* lazy handle to another service... but
//! never a direct instance pointer acquired before first use").

use crate::service::ServiceRegistry;
use lokstra_core::LokstraError;

/// A lazy, by-name handle to another service. Resolution happens on the
/// first call to [`Cached::get`]; the registry's own once-semantics
/// (spec §8 property 2) mean repeated `get()` calls from many `Cached`
/// handles for the same name still only trigger one factory invocation.
#[derive(Clone)]
pub struct Cached<T> {
    registry: ServiceRegistry,
    service_name: String,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Clone + Send + Sync + 'static> Cached<T> {
    pub fn new(registry: ServiceRegistry, service_name: impl Into<String>) -> Self {
        Cached {
            registry,
            service_name: service_name.into(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Resolve (and, on first call for this name, create) the underlying
    /// service. Panics on missing/wrong-type/cyclic wiring, matching
    /// `GetService[T]` (spec §4.D).
    pub async fn get(&self) -> T {
        self.registry.get(&self.service_name).await
    }

    /// The non-panicking variant, matching `TryGetService[T]`.
    pub async fn try_get(&self) -> Result<T, LokstraError> {
        self.registry.try_get(&self.service_name).await
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}
