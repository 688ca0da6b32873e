//! Lokstra — a service-and-deployment framework for long-running network
//! applications assembled from named services, routers, middleware and
//! HTTP apps (spec §1).
//!
//! This facade crate re-exports every `lokstra-*` sub-crate through a
//! single dependency, mirroring the teacher's `r2e` facade crate: import
//! everything with
//!
//! ```ignore
//! use lokstra::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature    | Default | Crate             |
//! |------------|---------|-------------------|
//! | `sync`     | **yes** | `lokstra-sync`    |
//! | `metrics`  | **yes** | `lokstra-metrics` |
//! | `full`     | no      | all of the above  |
//!
//! The core runtime (registry, router, autogen, proxy, deploy planner,
//! HTTP listener supervisor, server aggregator) has no feature gate: it is
//! the hard core described in spec §1 and is always present.

pub extern crate lokstra_autogen;
pub extern crate lokstra_core;
pub extern crate lokstra_deploy;
pub extern crate lokstra_http;
pub extern crate lokstra_proxy;
pub extern crate lokstra_registry;
pub extern crate lokstra_router;
pub extern crate lokstra_server;

#[cfg(feature = "sync")]
pub extern crate lokstra_sync;

#[cfg(feature = "metrics")]
pub extern crate lokstra_metrics;

// Re-export the request/response core at the top level - every other
// crate's public surface is built on `Ctx`/`Response`/`LokstraError`, so
// callers reach for these constantly.
pub use lokstra_core::{
    envelope::{api, ApiEnvelope, EnvelopeStatus, ErrorBody, FieldError, Meta},
    BoxFuture, Ctx, IntoResponse, LokstraError, MiddlewareFn, RequestParts, Response,
};

pub use lokstra_router::{
    handler, serve, CheckStatus, ChiEngine, FastHttpEngine, Handler, HealthCheck, HealthRegistry, Pattern, Router, RouterEngine, Segment,
    StaticMount, TreeMuxEngine,
};

pub use lokstra_registry::{typed_config, AnyArc, Cached, Factory, MiddlewareFactory, MiddlewareRegistry, ResolvedDeps, RouterMeta, ServiceRegistry, ShutdownFn};

pub use lokstra_autogen::{generate_router, resolve_route, AutogenService, Convention, ConventionRoute, ResourceNames, RouteOverride};

pub use lokstra_proxy::Service as ProxyService;

pub use lokstra_deploy::{AppDef, Deploy, DeployError, DeploymentDef, MountDef, Plan, RawPlan, ReverseProxyDef, ServerDef};

pub use lokstra_http::{DrainState, FastHttpListener, ListenerSupervisor, NetHttpListener, OutBody, RouterService, TlsListener};

pub use lokstra_server::{App, ListenerKind, Server};

#[cfg(feature = "sync")]
pub use lokstra_sync::{Callback, HeartbeatSchedule, NotifyPayload, SyncConfigPg, SyncConfigSettings, SyncError};

#[cfg(feature = "metrics")]
pub use lokstra_metrics::{metrics_handler, HttpMetrics, MetricsRegistry, Summary};

/// Unified prelude - import everything with `use lokstra::prelude::*`.
pub mod prelude {
    pub use crate::{
        api, generate_router, handler, resolve_route, serve, ApiEnvelope, App, AutogenService, Cached, ChiEngine, Convention,
        ConventionRoute, Ctx, Deploy, EnvelopeStatus, ErrorBody, FastHttpEngine, FieldError, Handler, HealthCheck, HealthRegistry,
        IntoResponse, ListenerKind, ListenerSupervisor, LokstraError, Meta, MiddlewareFn, NetHttpListener, Plan, ProxyService,
        RequestParts, Response, ResourceNames, Router, RouterEngine, RouteOverride, Server, ServiceRegistry, StaticMount,
        TlsListener, TreeMuxEngine, typed_config,
    };

    #[cfg(feature = "sync")]
    pub use crate::{HeartbeatSchedule, SyncConfigPg, SyncConfigSettings};

    #[cfg(feature = "metrics")]
    pub use crate::{metrics_handler, HttpMetrics, MetricsRegistry};
}
