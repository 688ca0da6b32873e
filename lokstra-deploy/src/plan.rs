//! Namespacing and topology resolution (spec §4.H): rewrites every inline
//! middleware/service/router/external-service name declared inside a
//! deployment or server to a globally-unique fully-qualified name, then
//! resolves `published-services` into concrete base URLs for
//! external-service definitions.

use crate::error::DeployError;
use crate::schema::{AppDef, DeploymentDef, MountDef, RawPlan, ReverseProxyDef, ServerDef};
use crate::secrets::{resolve_placeholders, ConfigAndEnvResolver, SecretResolver};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct ResolvedApp {
    pub name: String,
    pub addr: String,
    pub url: String,
    pub routers: Vec<String>,
    pub published_services: Vec<String>,
    pub reverse_proxies: Vec<ReverseProxyDef>,
    pub mount_spa: Vec<MountDef>,
    pub mount_static: Vec<MountDef>,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedServer {
    pub apps: Vec<ResolvedApp>,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedDeployment {
    pub servers: BTreeMap<String, ResolvedServer>,
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub configs: BTreeMap<String, String>,
    pub named_db_pools: BTreeMap<String, Value>,
    pub middleware_definitions: BTreeMap<String, Value>,
    pub service_definitions: BTreeMap<String, Value>,
    pub router_definitions: BTreeMap<String, Value>,
    /// Resolved URL per external-service name (spec: "an external-service
    /// entry points at a concrete URL").
    pub external_service_urls: BTreeMap<String, String>,
    pub deployments: BTreeMap<String, ResolvedDeployment>,
}

/// Turn a loaded, merged [`RawPlan`] into a [`Plan`]: expand `${...}`
/// placeholders, namespace every inline definition, and resolve
/// published-service topology.
pub fn resolve(raw: RawPlan) -> Result<Plan, DeployError> {
    let configs = flatten_configs(&raw.configs)?;
    let resolver = ConfigAndEnvResolver { configs: &configs };

    let named_db_pools = expand_map(raw.named_db_pools, &resolver)?;
    let mut middleware_definitions = expand_map(raw.middleware_definitions, &resolver)?;
    let mut service_definitions = expand_map(raw.service_definitions, &resolver)?;
    let mut router_definitions = expand_map(raw.router_definitions, &resolver)?;
    let mut external_service_definitions = expand_map(raw.external_service_definitions, &resolver)?;

    let mut deployments = BTreeMap::new();
    let mut publishers: HashMap<String, String> = HashMap::new(); // service name -> app fq name

    for (dep_name, dep) in raw.deployments {
        namespace_into(&mut external_service_definitions, dep.external_service_definitions.clone(), &dep_name, &resolver)?;
        let resolved = resolve_deployment(
            &dep_name,
            dep,
            &resolver,
            &mut middleware_definitions,
            &mut service_definitions,
            &mut router_definitions,
            &mut publishers,
        )?;
        deployments.insert(dep_name, resolved);
    }

    let mut external_service_urls = BTreeMap::new();
    for name in external_service_definitions.keys() {
        match publishers.get(name) {
            Some(app_fq) => {
                external_service_urls.insert(name.clone(), app_fq.clone());
            }
            None => return Err(DeployError::MissingPublisher(name.clone())),
        }
    }

    Ok(Plan {
        configs,
        named_db_pools,
        middleware_definitions,
        service_definitions,
        router_definitions,
        external_service_urls,
        deployments,
    })
}

#[allow(clippy::too_many_arguments)]
fn resolve_deployment(
    dep_name: &str,
    dep: DeploymentDef,
    resolver: &dyn SecretResolver,
    middleware_definitions: &mut BTreeMap<String, Value>,
    service_definitions: &mut BTreeMap<String, Value>,
    router_definitions: &mut BTreeMap<String, Value>,
    publishers: &mut HashMap<String, String>,
) -> Result<ResolvedDeployment, DeployError> {
    namespace_into(middleware_definitions, dep.middleware_definitions, dep_name, resolver)?;
    namespace_into(service_definitions, dep.service_definitions, dep_name, resolver)?;
    namespace_into(router_definitions, dep.router_definitions, dep_name, resolver)?;

    let mut servers = BTreeMap::new();
    for (server_name, server) in dep.servers {
        let resolved = resolve_server(dep_name, &server_name, server, resolver, service_definitions, publishers)?;
        servers.insert(server_name, resolved);
    }
    Ok(ResolvedDeployment { servers })
}

fn resolve_server(
    dep_name: &str,
    server_name: &str,
    server: ServerDef,
    resolver: &dyn SecretResolver,
    service_definitions: &mut BTreeMap<String, Value>,
    publishers: &mut HashMap<String, String>,
) -> Result<ResolvedServer, DeployError> {
    let server_scope = format!("{dep_name}.{server_name}");
    namespace_into(service_definitions, server.service_definitions, &server_scope, resolver)?;

    let base_url = match &server.base_url {
        Some(u) => resolve_placeholders(u, resolver)?,
        None => String::new(),
    };

    // Shorthand form: a single implicit app using the server's own addr.
    let mut apps = server.apps;
    if apps.is_empty() {
        if let Some(addr) = &server.addr {
            apps.push(AppDef {
                name: Some(server_name.to_string()),
                addr: addr.clone(),
                routers: server.routers.clone(),
                published_services: server.published_services.clone(),
                reverse_proxies: Vec::new(),
                mount_spa: Vec::new(),
                mount_static: Vec::new(),
            });
        }
    }

    let mut resolved_apps = Vec::with_capacity(apps.len());
    for app in apps {
        let app_name = app.name.clone().unwrap_or_else(|| server_name.to_string());
        let app_fq = format!("{dep_name}.{server_name}.{app_name}");
        let addr = resolve_placeholders(&app.addr, resolver)?;
        let url = format!("{base_url}{}", normalize_addr(&addr));

        for svc in &app.published_services {
            if let Some(existing) = publishers.insert(svc.clone(), url.clone()) {
                if existing != url {
                    return Err(DeployError::PublishConflict {
                        service: svc.clone(),
                        app_a: existing,
                        app_b: url.clone(),
                    });
                }
            }
        }

        resolved_apps.push(ResolvedApp {
            name: app_fq,
            addr,
            url,
            routers: app.routers,
            published_services: app.published_services,
            reverse_proxies: app.reverse_proxies,
            mount_spa: app.mount_spa,
            mount_static: app.mount_static,
        });
    }

    Ok(ResolvedServer { apps: resolved_apps })
}

/// `:8080` -> `http://localhost:8080`; anything else passes through
/// unchanged (spec §4.H: "normalising a leading `:` port").
fn normalize_addr(addr: &str) -> String {
    if let Some(port) = addr.strip_prefix(':') {
        format!("http://localhost:{port}")
    } else {
        addr.to_string()
    }
}

fn namespace_into(target: &mut BTreeMap<String, Value>, incoming: BTreeMap<String, Value>, scope: &str, resolver: &dyn SecretResolver) -> Result<(), DeployError> {
    for (name, value) in incoming {
        let fq_name = format!("{scope}.{name}");
        target.insert(fq_name, expand_value(value, resolver)?);
    }
    Ok(())
}

fn expand_map(map: BTreeMap<String, Value>, resolver: &dyn SecretResolver) -> Result<BTreeMap<String, Value>, DeployError> {
    map.into_iter().map(|(k, v)| Ok((k, expand_value(v, resolver)?))).collect()
}

fn expand_value(value: Value, resolver: &dyn SecretResolver) -> Result<Value, DeployError> {
    match value {
        Value::String(s) => Ok(Value::String(resolve_placeholders(&s, resolver)?)),
        Value::Sequence(seq) => seq.into_iter().map(|v| expand_value(v, resolver)).collect::<Result<_, _>>().map(Value::Sequence),
        Value::Mapping(map) => {
            let mut out = serde_yaml::Mapping::new();
            for (k, v) in map {
                out.insert(k, expand_value(v, resolver)?);
            }
            Ok(Value::Mapping(out))
        }
        other => Ok(other),
    }
}

fn flatten_configs(configs: &BTreeMap<String, Value>) -> Result<BTreeMap<String, String>, DeployError> {
    // `configs` values are resolved against the raw environment only (they
    // are the resolution source for everything else), then stringified so
    // later placeholder lookups can treat them as plain substitution values.
    struct EnvOnly;
    impl SecretResolver for EnvOnly {
        fn resolve(&self, name: &str) -> Option<String> {
            std::env::var(name).ok()
        }
    }
    let mut out = BTreeMap::new();
    for (key, value) in configs {
        let expanded = expand_value(value.clone(), &EnvOnly)?;
        let as_string = match expanded {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => serde_yaml::to_string(&other).unwrap_or_default().trim().to_string(),
        };
        out.insert(key.clone(), as_string);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DeploymentDef, RawPlan, ServerDef};

    fn plan_with_one_publisher_and_one_external(service: &str, port: &str) -> RawPlan {
        let mut raw = RawPlan::default();
        raw.external_service_definitions.insert(service.to_string(), Value::Null);
        let server = ServerDef {
            base_url: None,
            addr: Some(format!(":{port}")),
            routers: vec![],
            published_services: vec![service.to_string()],
            apps: vec![],
            service_definitions: BTreeMap::new(),
        };
        let mut dep = DeploymentDef::default();
        dep.servers.insert("s1".to_string(), server);
        raw.deployments.insert("d1".to_string(), dep);
        raw
    }

    #[test]
    fn published_service_resolves_to_app_url() {
        let raw = plan_with_one_publisher_and_one_external("product", "9000");
        let plan = resolve(raw).unwrap();
        assert_eq!(plan.external_service_urls.get("product").unwrap(), "http://localhost:9000");
    }

    #[test]
    fn missing_publisher_is_an_error() {
        let mut raw = RawPlan::default();
        raw.external_service_definitions.insert("orphan".to_string(), Value::Null);
        let err = resolve(raw).unwrap_err();
        assert!(matches!(err, DeployError::MissingPublisher(_)));
    }

    #[test]
    fn two_apps_publishing_the_same_service_conflict() {
        let mut raw = RawPlan::default();
        raw.external_service_definitions.insert("dup".to_string(), Value::Null);
        let mut dep = DeploymentDef::default();
        dep.servers.insert(
            "s1".to_string(),
            ServerDef {
                addr: Some(":9000".to_string()),
                published_services: vec!["dup".to_string()],
                ..Default::default()
            },
        );
        dep.servers.insert(
            "s2".to_string(),
            ServerDef {
                addr: Some(":9001".to_string()),
                published_services: vec!["dup".to_string()],
                ..Default::default()
            },
        );
        raw.deployments.insert("d1".to_string(), dep);
        let err = resolve(raw).unwrap_err();
        assert!(matches!(err, DeployError::PublishConflict { .. }));
    }

    #[test]
    fn inline_service_definition_is_namespaced_to_deployment_server() {
        let mut raw = RawPlan::default();
        let mut server = ServerDef::default();
        server.addr = Some(":9000".to_string());
        server.service_definitions.insert("cache".to_string(), Value::String("redis".to_string()));
        let mut dep = DeploymentDef::default();
        dep.servers.insert("s1".to_string(), server);
        raw.deployments.insert("d1".to_string(), dep);

        let plan = resolve(raw).unwrap();
        assert!(plan.service_definitions.contains_key("d1.s1.cache"));
    }

    #[test]
    fn placeholder_in_addr_is_expanded_before_url_assembly() {
        std::env::set_var("LOKSTRA_TEST_PORT", "7777");
        let raw = plan_with_one_publisher_and_one_external("product", "${LOKSTRA_TEST_PORT}");
        let plan = resolve(raw).unwrap();
        assert_eq!(plan.external_service_urls.get("product").unwrap(), "http://localhost:7777");
        std::env::remove_var("LOKSTRA_TEST_PORT");
    }
}
