//! The aggregator binary's library half (spec §6 "CLI surface"): load a
//! deployment plan, pick one server out of it, and run every app it
//! declares until a shutdown signal arrives.
//!
//! Registering application-specific service types, router handlers, and
//! published-service wiring is out of scope here (spec.md §1: "the stable
//! content of `main.go` examples"). What this crate *can* run generically
//! is exactly what the deploy planner (`lokstra-deploy`) already resolves
//! as data rather than code: static-file mounts, SPA fallback mounts, and
//! reverse-proxy mounts declared under an app in the plan.

use lokstra_core::LokstraError;
use lokstra_deploy::{Deploy, Plan};
use lokstra_registry::ServiceRegistry;
use lokstra_router::{HealthRegistry, ReverseProxyMount, Router, RouterEngine, StaticMount, TreeMuxEngine};
use lokstra_server::{App, ListenerKind, Server};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Server-selection failures (spec §7 `ConfigError`, "fatal at startup").
#[derive(Debug, Clone)]
pub enum CliError {
    NoServerMatches(Option<String>),
    AmbiguousServer(Vec<String>),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::NoServerMatches(Some(name)) => write!(f, "no server named '{name}' in the deployment plan"),
            CliError::NoServerMatches(None) => write!(f, "the deployment plan declares no servers"),
            CliError::AmbiguousServer(names) => {
                write!(f, "--server is required: the plan declares multiple servers ({})", names.join(", "))
            }
        }
    }
}

impl std::error::Error for CliError {}

impl From<CliError> for LokstraError {
    fn from(err: CliError) -> Self {
        LokstraError::Config(err.to_string())
    }
}

/// Pick one server out of the plan: `name` may be a bare server name or a
/// fully-qualified `deployment.server` name. With `name = None`, a plan
/// that declares exactly one server across every deployment is selected
/// automatically; any other count is ambiguous.
fn select_server(plan: &Plan, name: Option<&str>) -> Result<(String, lokstra_deploy::plan::ResolvedServer), CliError> {
    let mut matches = Vec::new();
    for (dep_name, deployment) in &plan.deployments {
        for (server_name, server) in &deployment.servers {
            let fq = format!("{dep_name}.{server_name}");
            let selected = match name {
                Some(requested) => requested == server_name || requested == fq,
                None => true,
            };
            if selected {
                matches.push((fq, server.clone()));
            }
        }
    }

    match matches.len() {
        0 => Err(CliError::NoServerMatches(name.map(str::to_string))),
        1 => Ok(matches.into_iter().next().expect("len checked above")),
        _ => Err(CliError::AmbiguousServer(matches.into_iter().map(|(fq, _)| fq).collect())),
    }
}

/// `:8080` binds every interface; anything else is parsed as a literal
/// socket address. Mirrors `lokstra_deploy::plan`'s own `normalize_addr`,
/// but for `SocketAddr::parse` rather than URL assembly.
fn bind_addr(addr: &str) -> Result<SocketAddr, LokstraError> {
    let candidate = match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => addr.to_string(),
    };
    candidate
        .parse()
        .map_err(|e| LokstraError::Config(format!("invalid bind address '{addr}': {e}")))
}

/// Build every app the resolved server declares, wiring only the mounts
/// the planner already resolved as data (static files, SPA fallback,
/// reverse proxies). Business routes and service wiring are the calling
/// application's responsibility.
fn build_server(name: &str, resolved: lokstra_deploy::plan::ResolvedServer) -> Result<Server, LokstraError> {
    let mut apps = Vec::with_capacity(resolved.apps.len());
    for app_def in resolved.apps {
        let mut router = Router::new();
        // Every app gets liveness/readiness wiring for free, regardless of
        // which routers/mounts the plan declares (spec §2 "Supplemented
        // features" - ambient operational surface, not a business route).
        router.mount_health(HealthRegistry::new());
        for mount in &app_def.mount_static {
            router.mount_static(&mount.prefix, StaticMount::new(mount.dir.clone()).spa(mount.spa));
        }
        for mount in &app_def.mount_spa {
            router.mount_static(&mount.prefix, StaticMount::new(mount.dir.clone()).spa(true));
        }
        for proxy in &app_def.reverse_proxies {
            router.mount_reverse_proxy(&proxy.prefix, ReverseProxyMount::new(proxy.target.clone()));
        }

        let mut engine = TreeMuxEngine::new();
        router.build(&mut engine)?;
        let engine: Arc<dyn RouterEngine> = Arc::new(engine);

        let addr = bind_addr(&app_def.addr)?;
        apps.push(App::new(app_def.name.clone(), addr, engine, ListenerKind::Http));
    }

    Ok(Server::new(name, apps, ServiceRegistry::new()))
}

/// Load `config`, select `server_name` (or the plan's sole server), and
/// run it until a shutdown signal arrives, draining within
/// `shutdown_timeout` (spec §6: "SIGINT/SIGTERM trigger graceful
/// shutdown").
pub async fn run(config: PathBuf, server_name: Option<String>, shutdown_timeout: Duration) -> Result<(), LokstraError> {
    let plan = Deploy::load(&config)?;
    let (fq_name, resolved) = select_server(&plan, server_name.as_deref())?;
    tracing::info!(server = %fq_name, apps = resolved.apps.len(), "lokstra-cli: starting server");
    let server = build_server(&fq_name, resolved)?;
    server.start_and_wait_for_shutdown(shutdown_timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lokstra_deploy::plan::{Plan, ResolvedApp, ResolvedDeployment, ResolvedServer};
    use std::collections::BTreeMap;

    fn plan_with(deployment: &str, server: &str) -> Plan {
        let mut servers = BTreeMap::new();
        servers.insert(
            server.to_string(),
            ResolvedServer {
                apps: vec![ResolvedApp {
                    name: format!("{deployment}.{server}.{server}"),
                    addr: ":0".to_string(),
                    url: "http://localhost:0".to_string(),
                    routers: vec![],
                    published_services: vec![],
                    reverse_proxies: vec![],
                    mount_spa: vec![],
                    mount_static: vec![],
                }],
            },
        );
        let mut deployments = BTreeMap::new();
        deployments.insert(deployment.to_string(), ResolvedDeployment { servers });
        Plan {
            deployments,
            ..Plan::default()
        }
    }

    #[test]
    fn selects_the_sole_server_when_none_named() {
        let plan = plan_with("d1", "s1");
        let (fq, _) = select_server(&plan, None).unwrap();
        assert_eq!(fq, "d1.s1");
    }

    #[test]
    fn selects_by_bare_name() {
        let plan = plan_with("d1", "s1");
        let (fq, _) = select_server(&plan, Some("s1")).unwrap();
        assert_eq!(fq, "d1.s1");
    }

    #[test]
    fn selects_by_fully_qualified_name() {
        let plan = plan_with("d1", "s1");
        let (fq, _) = select_server(&plan, Some("d1.s1")).unwrap();
        assert_eq!(fq, "d1.s1");
    }

    #[test]
    fn ambiguous_without_a_name_when_multiple_servers_exist() {
        let mut plan = plan_with("d1", "s1");
        let mut servers = BTreeMap::new();
        servers.insert(
            "s2".to_string(),
            ResolvedServer {
                apps: vec![ResolvedApp {
                    name: "d1.s2.s2".to_string(),
                    addr: ":0".to_string(),
                    url: "http://localhost:0".to_string(),
                    routers: vec![],
                    published_services: vec![],
                    reverse_proxies: vec![],
                    mount_spa: vec![],
                    mount_static: vec![],
                }],
            },
        );
        plan.deployments.get_mut("d1").unwrap().servers.extend(servers);

        let err = select_server(&plan, None).unwrap_err();
        assert!(matches!(err, CliError::AmbiguousServer(_)));
    }

    #[test]
    fn unknown_name_is_not_found() {
        let plan = plan_with("d1", "s1");
        let err = select_server(&plan, Some("nope")).unwrap_err();
        assert!(matches!(err, CliError::NoServerMatches(Some(_))));
    }

    #[test]
    fn colon_port_binds_every_interface() {
        assert_eq!(bind_addr(":8080").unwrap(), "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn literal_socket_address_parses_directly() {
        assert_eq!(bind_addr("127.0.0.1:9000").unwrap(), "127.0.0.1:9000".parse().unwrap());
    }
}
