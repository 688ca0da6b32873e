//! The global service registry (spec §4.D): type registration, lazy
//! instances, dependency resolution, and by-name once-semantics.
//!
//! Every instance lives behind a [`tokio::sync::OnceCell`] keyed by
//! service name, so concurrent first-accesses for the same name collapse
//! into exactly one factory invocation (spec §8 property 2, "Once") while
//! every other waiter blocks on the same cell and observes the same
//! instance. Cyclic dependency chains are caught with a task-local
//! in-progress set that mirrors the original's per-goroutine tracking
//! (spec §9 design note, "Cyclic graphs").

use dashmap::DashMap;
use lokstra_core::LokstraError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

pub type AnyArc = Arc<dyn Any + Send + Sync>;
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased shutdown invoker (spec §3 "services that implement a
/// Shutdown capability have it invoked in reverse creation order"): the
/// caller registering a type that needs cleanup supplies a closure that
/// downcasts the `AnyArc` back to the concrete type and calls its own
/// shutdown method.
pub type ShutdownFn = Arc<dyn Fn(&AnyArc) + Send + Sync>;

/// `(convention, resource, resource_plural)` carried by a service type so
/// the autogen layer (spec §4.F) can derive routes/proxies without the
/// registry knowing anything about HTTP.
#[derive(Debug, Clone)]
pub struct RouterMeta {
    pub convention: String,
    pub resource: String,
    pub resource_plural: String,
}

/// Resolved dependencies handed to a factory: every declared dependency
/// name mapped to its already-created instance.
pub type ResolvedDeps = HashMap<String, AnyArc>;

pub type Factory =
    Arc<dyn Fn(ResolvedDeps, Value) -> BoxFuture<'static, Result<AnyArc, LokstraError>> + Send + Sync>;

/// Deserialise a factory's raw `config` value into a typed struct, so a
/// factory can declare `#[derive(Deserialize)] struct Config { ... }`
/// instead of pulling fields out of the `Value` by hand (spec §2 "Typed
/// config section registration").
pub fn typed_config<T: DeserializeOwned>(config: &Value) -> Result<T, LokstraError> {
    serde_json::from_value(config.clone())
        .map_err(|e| LokstraError::Config(format!("invalid service config: {e}")))
}

/// A type registered once via [`ServiceRegistry::register_type`]; factories
/// are invoked once per lazily-declared service name that names this type.
#[derive(Clone)]
struct ServiceType {
    factory: Factory,
    router_meta: Option<RouterMeta>,
    shutdown: Option<ShutdownFn>,
}

/// A not-yet-created service: the type to build, its raw config, and the
/// dependency names that must be resolved first.
#[derive(Clone)]
struct Descriptor {
    type_name: String,
    config: Value,
    depends_on: Vec<String>,
}

enum Entry {
    /// Directly injected instance (spec §4.D `RegisterService`).
    Instance(AnyArc),
    /// Descriptor plus a once-cell that the first `get` populates. The
    /// cell is `Arc`-wrapped so a resolver can clone it out of the dashmap
    /// guard and await on it without holding the guard across `.await`.
    Lazy {
        descriptor: Descriptor,
        cell: Arc<OnceCell<AnyArc>>,
    },
}

tokio::task_local! {
    static IN_PROGRESS: std::cell::RefCell<Vec<String>>;
}

/// The process-wide registry. Cheap to clone (every field is an `Arc`-like
/// concurrent map); the deploy planner and tests both construct a fresh one
/// rather than share true global `static` state, per spec §9's "Global
/// mutable state" note ("all tests must reset it between runs").
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    types: Arc<DashMap<String, ServiceType>>,
    entries: Arc<DashMap<String, Entry>>,
    creation_order: Arc<Mutex<Vec<String>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `RegisterServiceType(name, factory, opts...)`. Re-registration is
    /// rejected unless `allow_override` is set (spec §4.D).
    pub fn register_type(&self, name: &str, factory: Factory, router_meta: Option<RouterMeta>, allow_override: bool) -> Result<(), LokstraError> {
        self.register_type_with_shutdown(name, factory, router_meta, None, allow_override)
    }

    /// Like [`Self::register_type`], additionally attaching a shutdown
    /// invoker that [`Self::shutdown_all`] calls for every instance of this
    /// type, in reverse creation order.
    pub fn register_type_with_shutdown(
        &self,
        name: &str,
        factory: Factory,
        router_meta: Option<RouterMeta>,
        shutdown: Option<ShutdownFn>,
        allow_override: bool,
    ) -> Result<(), LokstraError> {
        if !allow_override && self.types.contains_key(name) {
            return Err(LokstraError::Config(format!(
                "service type '{name}' already registered (pass allow_override to replace it)"
            )));
        }
        self.types.insert(
            name.to_string(),
            ServiceType {
                factory,
                router_meta,
                shutdown,
            },
        );
        Ok(())
    }

    pub fn router_meta(&self, type_name: &str) -> Option<RouterMeta> {
        self.types.get(type_name).and_then(|t| t.router_meta.clone())
    }

    /// `RegisterService(name, instance, opts...)`: direct injection, no
    /// factory involved, never re-resolved.
    pub fn register_instance<T: Send + Sync + 'static>(&self, name: &str, instance: T, allow_override: bool) -> Result<(), LokstraError> {
        if !allow_override && self.entries.contains_key(name) {
            return Err(LokstraError::Config(format!("service '{name}' already registered")));
        }
        self.entries
            .insert(name.to_string(), Entry::Instance(Arc::new(instance)));
        Ok(())
    }

    /// `RegisterLazyService(name, typeName, config, opts...)`: stored as a
    /// descriptor; the factory is not invoked until first `get`.
    pub fn register_lazy(&self, name: &str, type_name: &str, config: Value, depends_on: Vec<String>, allow_override: bool) -> Result<(), LokstraError> {
        if !allow_override && self.entries.contains_key(name) {
            return Err(LokstraError::Config(format!("service '{name}' already registered")));
        }
        self.entries.insert(
            name.to_string(),
            Entry::Lazy {
                descriptor: Descriptor {
                    type_name: type_name.to_string(),
                    config,
                    depends_on,
                },
                cell: Arc::new(OnceCell::new()),
            },
        );
        Ok(())
    }

    /// `GetService[T](name)`. Panics on missing service, wrong type, or a
    /// dependency cycle (spec §4.D, §7 `RegistryError` is fatal at first
    /// use).
    pub async fn get<T: Clone + Send + Sync + 'static>(&self, name: &str) -> T {
        match self.try_get::<T>(name).await {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }

    /// `TryGetService[T](name)`: the safe variant, returning an error
    /// instead of panicking.
    pub async fn try_get<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Result<T, LokstraError> {
        let any = self.resolve_any(name).await?;
        any.downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| LokstraError::Registry(format!("service '{name}' is not of the requested type")))
    }

    /// Resolve `name` to a type-erased instance, creating it (and its
    /// dependency chain) if needed. Establishes the task-local in-progress
    /// chain on the first (non-nested) call in a resolution; recursive
    /// calls made while resolving dependencies reuse the existing chain.
    pub async fn resolve_any(&self, name: &str) -> Result<AnyArc, LokstraError> {
        if IN_PROGRESS.try_with(|_| ()).is_ok() {
            self.resolve_in_scope(name).await
        } else {
            IN_PROGRESS
                .scope(std::cell::RefCell::new(Vec::new()), self.resolve_in_scope(name))
                .await
        }
    }

    async fn resolve_in_scope(&self, name: &str) -> Result<AnyArc, LokstraError> {
        self.enter(name.to_string())?;
        let result = self.resolve_inner(name).await;
        self.leave(name);
        result
    }

    fn enter(&self, name: String) -> Result<(), LokstraError> {
        IN_PROGRESS.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().position(|n| *n == name) {
                let mut chain = stack[pos..].to_vec();
                chain.push(name.clone());
                return Err(LokstraError::Registry(format!(
                    "dependency cycle detected: {}",
                    chain.join(" -> ")
                )));
            }
            stack.push(name);
            Ok(())
        })
    }

    fn leave(&self, name: &str) {
        let _ = IN_PROGRESS.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.last().map(|s| s.as_str()) == Some(name) {
                stack.pop();
            }
        });
    }

    async fn resolve_inner(&self, name: &str) -> Result<AnyArc, LokstraError> {
        enum Plan {
            Ready(AnyArc),
            Build { descriptor: Descriptor, cell: Arc<OnceCell<AnyArc>> },
        }
        let plan = {
            let guard = self
                .entries
                .get(name)
                .ok_or_else(|| LokstraError::Registry(format!("unknown service '{name}'")))?;
            match &*guard {
                Entry::Instance(v) => Plan::Ready(v.clone()),
                Entry::Lazy { descriptor, cell } => match cell.get() {
                    Some(v) => Plan::Ready(v.clone()),
                    None => Plan::Build {
                        descriptor: descriptor.clone(),
                        cell: cell.clone(),
                    },
                },
            }
        };

        let (descriptor, cell) = match plan {
            Plan::Ready(v) => return Ok(v),
            Plan::Build { descriptor, cell } => (descriptor, cell),
        };

        let mut resolved = ResolvedDeps::new();
        for dep in &descriptor.depends_on {
            let v = Box::pin(self.resolve_any(dep)).await?;
            resolved.insert(dep.clone(), v);
        }

        let factory = {
            self.types
                .get(&descriptor.type_name)
                .ok_or_else(|| LokstraError::Registry(format!("unknown service type '{}'", descriptor.type_name)))?
                .factory
                .clone()
        };

        // `get_or_try_init` guarantees the factory runs exactly once even
        // if several tasks race to resolve the same name; `cell` is an
        // owned `Arc` clone so nothing holds the dashmap guard across
        // this `.await`. The creation-order push lives inside the init
        // closure so it runs exactly once too, in true creation order.
        let config = descriptor.config.clone();
        let name_owned = name.to_string();
        let creation_order = self.creation_order.clone();
        let value = cell
            .get_or_try_init(|| async move {
                let result = factory(resolved, config).await?;
                creation_order.lock().unwrap().push(name_owned);
                Ok::<AnyArc, LokstraError>(result)
            })
            .await?
            .clone();

        Ok(value)
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Names of every lazily-created service, in reverse creation order -
    /// the order [`Self::shutdown_all`] invokes shutdown capabilities in.
    pub fn shutdown_order(&self) -> Vec<String> {
        self.creation_order.lock().unwrap().iter().rev().cloned().collect()
    }

    /// Invoke the Shutdown capability (spec §3 "services that implement a
    /// Shutdown capability have it invoked in reverse creation order") for
    /// every created service whose type registered a shutdown fn. Services
    /// with none, and direct instances (never "created"), are skipped.
    pub fn shutdown_all(&self) {
        for name in self.shutdown_order() {
            let resolved = self.entries.get(&name).and_then(|entry| match &*entry {
                Entry::Lazy { descriptor, cell } => cell.get().map(|v| (v.clone(), descriptor.type_name.clone())),
                Entry::Instance(_) => None,
            });
            let Some((instance, type_name)) = resolved else {
                continue;
            };
            let shutdown_fn = self.types.get(&type_name).and_then(|t| t.shutdown.clone());
            if let Some(f) = shutdown_fn {
                tracing::info!(service = %name, "invoking shutdown capability");
                f(&instance);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn string_factory(value: &'static str) -> Factory {
        Arc::new(move |_deps, _config| Box::pin(async move { Ok(Arc::new(value.to_string()) as AnyArc) }))
    }

    #[tokio::test]
    async fn direct_instance_roundtrips() {
        let reg = ServiceRegistry::new();
        reg.register_instance("greeting", "hello".to_string(), false).unwrap();
        let v: String = reg.get("greeting").await;
        assert_eq!(v, "hello");
    }

    #[tokio::test]
    async fn lazy_service_created_on_first_get() {
        let reg = ServiceRegistry::new();
        reg.register_type("echo", string_factory("built"), None, false).unwrap();
        reg.register_lazy("svc", "echo", Value::Null, vec![], false).unwrap();
        let v: String = reg.get("svc").await;
        assert_eq!(v, "built");
    }

    #[tokio::test]
    async fn missing_service_surfaces_registry_error() {
        let reg = ServiceRegistry::new();
        let err = reg.try_get::<String>("nope").await.unwrap_err();
        assert!(matches!(err, LokstraError::Registry(_)));
    }

    #[tokio::test]
    async fn wrong_type_surfaces_registry_error() {
        let reg = ServiceRegistry::new();
        reg.register_instance("n", 42i32, false).unwrap();
        let err = reg.try_get::<String>("n").await.unwrap_err();
        assert!(matches!(err, LokstraError::Registry(_)));
    }

    #[tokio::test]
    async fn dependency_chain_is_resolved() {
        let reg = ServiceRegistry::new();
        reg.register_type(
            "dep_type",
            Arc::new(|_d, _c| Box::pin(async { Ok(Arc::new(10i32) as AnyArc) })),
            None,
            false,
        )
        .unwrap();
        reg.register_type(
            "consumer_type",
            Arc::new(|deps: ResolvedDeps, _c| {
                Box::pin(async move {
                    let dep = deps.get("dep").unwrap().downcast_ref::<i32>().copied().unwrap();
                    Ok(Arc::new(dep + 1) as AnyArc)
                })
            }),
            None,
            false,
        )
        .unwrap();
        reg.register_lazy("dep", "dep_type", Value::Null, vec![], false).unwrap();
        reg.register_lazy("consumer", "consumer_type", Value::Null, vec!["dep".to_string()], false)
            .unwrap();

        let v: i32 = reg.get("consumer").await;
        assert_eq!(v, 11);
    }

    #[tokio::test]
    async fn direct_self_cycle_is_detected() {
        let reg = ServiceRegistry::new();
        reg.register_type(
            "cyclic_type",
            Arc::new(|_d, _c| {
                Box::pin(async {
                    Ok(Arc::new(1i32) as AnyArc)
                })
            }),
            None,
            false,
        )
        .unwrap();
        reg.register_lazy("a", "cyclic_type", Value::Null, vec!["a".to_string()], false).unwrap();
        let err = reg.try_get::<i32>("a").await.unwrap_err();
        assert!(matches!(err, LokstraError::Registry(msg) if msg.contains("cycle")));
    }

    #[tokio::test]
    async fn concurrent_resolvers_observe_one_factory_invocation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let reg = ServiceRegistry::new();
        let calls_clone = calls.clone();
        reg.register_type(
            "counted",
            Arc::new(move |_d, _c| {
                let calls = calls_clone.clone();
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Ok(Arc::new(7i32) as AnyArc)
                })
            }),
            None,
            false,
        )
        .unwrap();
        reg.register_lazy("svc", "counted", Value::Null, vec![], false).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let reg = reg.clone();
            handles.push(tokio::spawn(async move { reg.get::<i32>("svc").await }));
        }
        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }
        assert!(results.iter().all(|v| *v == 7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_all_invokes_registered_capability_in_reverse_creation_order() {
        let reg = ServiceRegistry::new();
        let shutdown_calls: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));

        let calls_for_a = shutdown_calls.clone();
        reg.register_type_with_shutdown(
            "named_type",
            Arc::new(|_d, config| {
                Box::pin(async move { Ok(Arc::new(config.as_str().unwrap_or_default().to_string()) as AnyArc) })
            }),
            None,
            Some(Arc::new(move |instance: &AnyArc| {
                let name = instance.downcast_ref::<String>().unwrap().clone();
                calls_for_a.lock().unwrap().push(name);
            })),
            false,
        )
        .unwrap();

        reg.register_lazy("a", "named_type", Value::String("a".into()), vec![], false).unwrap();
        reg.register_lazy("b", "named_type", Value::String("b".into()), vec![], false).unwrap();

        let _: String = reg.get("a").await;
        let _: String = reg.get("b").await;

        reg.shutdown_all();
        assert_eq!(*shutdown_calls.lock().unwrap(), vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn shutdown_all_skips_services_never_created() {
        let reg = ServiceRegistry::new();
        reg.register_type("named_type", string_factory("unused"), None, false).unwrap();
        reg.register_lazy("never_used", "named_type", Value::Null, vec![], false).unwrap();
        // No `.get("never_used")` call - shutdown_all must not invoke anything for it.
        reg.shutdown_all();
        assert!(reg.shutdown_order().is_empty());
    }

    #[derive(serde::Deserialize)]
    struct DbConfig {
        host: String,
        port: u16,
    }

    #[test]
    fn typed_config_deserialises_struct() {
        let cfg: DbConfig = typed_config(&serde_json::json!({"host": "localhost", "port": 5432})).unwrap();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 5432);
    }

    #[test]
    fn typed_config_rejects_mismatched_shape() {
        let err = typed_config::<DbConfig>(&Value::Null).unwrap_err();
        assert!(matches!(err, LokstraError::Config(_)));
    }

    #[test]
    fn router_meta_is_retrievable() {
        let reg = ServiceRegistry::new();
        reg.register_type(
            "user_service",
            string_factory("x"),
            Some(RouterMeta {
                convention: "rest".into(),
                resource: "user".into(),
                resource_plural: "users".into(),
            }),
            false,
        )
        .unwrap();
        let meta = reg.router_meta("user_service").unwrap();
        assert_eq!(meta.resource_plural, "users");
    }
}
