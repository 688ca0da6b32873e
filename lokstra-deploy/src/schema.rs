//! Typed mirror of the YAML plan schema (spec §4.H / §6): top-level keys
//! `configs`, `named-db-pools`, `middleware-definitions`,
//! `service-definitions`, `router-definitions`,
//! `external-service-definitions`, `deployments`. Definition bodies are left
//! as `serde_yaml::Value` since their shape is type-specific (a middleware
//! definition's `config` map means something different per middleware
//! type); only the structural envelope around them is typed.

use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlan {
    #[serde(default)]
    pub configs: BTreeMap<String, Value>,
    #[serde(rename = "named-db-pools", default)]
    pub named_db_pools: BTreeMap<String, Value>,
    #[serde(rename = "middleware-definitions", default)]
    pub middleware_definitions: BTreeMap<String, Value>,
    #[serde(rename = "service-definitions", default)]
    pub service_definitions: BTreeMap<String, Value>,
    #[serde(rename = "router-definitions", default)]
    pub router_definitions: BTreeMap<String, Value>,
    #[serde(rename = "external-service-definitions", default)]
    pub external_service_definitions: BTreeMap<String, Value>,
    #[serde(default)]
    pub deployments: BTreeMap<String, DeploymentDef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentDef {
    #[serde(rename = "config-overrides", default)]
    pub config_overrides: Vec<String>,
    #[serde(rename = "middleware-definitions", default)]
    pub middleware_definitions: BTreeMap<String, Value>,
    #[serde(rename = "service-definitions", default)]
    pub service_definitions: BTreeMap<String, Value>,
    #[serde(rename = "router-definitions", default)]
    pub router_definitions: BTreeMap<String, Value>,
    #[serde(rename = "external-service-definitions", default)]
    pub external_service_definitions: BTreeMap<String, Value>,
    #[serde(default)]
    pub servers: BTreeMap<String, ServerDef>,
}

/// Either the shorthand `(addr, routers, published-services)` form or the
/// explicit multi-`apps` form (spec §4.H).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerDef {
    #[serde(rename = "base-url", default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub addr: Option<String>,
    #[serde(default)]
    pub routers: Vec<String>,
    #[serde(rename = "published-services", default)]
    pub published_services: Vec<String>,
    #[serde(default)]
    pub apps: Vec<AppDef>,
    #[serde(rename = "service-definitions", default)]
    pub service_definitions: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppDef {
    pub name: Option<String>,
    pub addr: String,
    #[serde(default)]
    pub routers: Vec<String>,
    #[serde(rename = "published-services", default)]
    pub published_services: Vec<String>,
    #[serde(rename = "reverse-proxies", default)]
    pub reverse_proxies: Vec<ReverseProxyDef>,
    #[serde(rename = "mount-spa", default)]
    pub mount_spa: Vec<MountDef>,
    #[serde(rename = "mount-static", default)]
    pub mount_static: Vec<MountDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReverseProxyDef {
    pub prefix: String,
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MountDef {
    pub prefix: String,
    pub dir: String,
    #[serde(default)]
    pub spa: bool,
}
