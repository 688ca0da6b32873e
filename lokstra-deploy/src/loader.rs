//! Multi-file YAML loading and merging (spec §4.H): a directory of
//! `*.yaml`/`*.yml` files is merged key-wise into one [`crate::schema::RawPlan`].
//! Files are visited in filename order (a deterministic choice recorded in
//! `DESIGN.md` - spec.md leaves merge order across files unspecified).
//! Mirrors the teacher's `r2e_core::config` directory-walk loader
//! (`config/loader.rs`), generalized from flattened key/value pairs to a
//! structured merge since the plan schema is nested, not flat.

use crate::error::DeployError;
use crate::schema::{DeploymentDef, RawPlan};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Load a single file or a directory of plan files and merge them.
pub fn load(path: &Path) -> Result<RawPlan, DeployError> {
    if path.is_dir() {
        let mut files: Vec<_> = std::fs::read_dir(path)
            .map_err(|e| DeployError::Load(format!("reading directory '{}': {e}", path.display())))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml")))
            .collect();
        files.sort();

        let mut merged = RawPlan::default();
        for file in files {
            let plan = load_file(&file)?;
            merge_plan(&mut merged, plan)?;
        }
        Ok(merged)
    } else {
        load_file(path)
    }
}

fn load_file(path: &Path) -> Result<RawPlan, DeployError> {
    let content = std::fs::read_to_string(path).map_err(|e| DeployError::Load(format!("reading '{}': {e}", path.display())))?;
    serde_yaml::from_str(&content).map_err(|e| DeployError::Load(format!("parsing '{}': {e}", path.display())))
}

fn merge_plan(acc: &mut RawPlan, incoming: RawPlan) -> Result<(), DeployError> {
    let overrides: std::collections::HashSet<String> = incoming
        .deployments
        .values()
        .flat_map(|d| d.config_overrides.iter().cloned())
        .collect();

    merge_section(&mut acc.configs, incoming.configs, "configs", &overrides)?;
    merge_section(&mut acc.named_db_pools, incoming.named_db_pools, "named-db-pools", &overrides)?;
    merge_section(
        &mut acc.middleware_definitions,
        incoming.middleware_definitions,
        "middleware-definitions",
        &overrides,
    )?;
    merge_section(
        &mut acc.service_definitions,
        incoming.service_definitions,
        "service-definitions",
        &overrides,
    )?;
    merge_section(&mut acc.router_definitions, incoming.router_definitions, "router-definitions", &overrides)?;
    merge_section(
        &mut acc.external_service_definitions,
        incoming.external_service_definitions,
        "external-service-definitions",
        &overrides,
    )?;

    for (name, def) in incoming.deployments {
        merge_deployment(acc, name, def)?;
    }
    Ok(())
}

fn merge_deployment(acc: &mut RawPlan, name: String, def: DeploymentDef) -> Result<(), DeployError> {
    if acc.deployments.contains_key(&name) {
        return Err(DeployError::DuplicateDeployment(name));
    }
    acc.deployments.insert(name, def);
    Ok(())
}

/// Merge one section's key/value pairs into `acc`. A scalar collision
/// (same key present in both, with a different value) is an error unless
/// `key` is listed in `overrides`, in which case the incoming value wins
/// (spec §4.H: "scalar collisions are errors unless a deployment-local
/// `config-overrides` block authorises them").
fn merge_section(acc: &mut BTreeMap<String, Value>, incoming: BTreeMap<String, Value>, section: &str, overrides: &std::collections::HashSet<String>) -> Result<(), DeployError> {
    for (key, value) in incoming {
        match acc.get(&key) {
            Some(existing) if existing != &value && !overrides.contains(&key) => {
                return Err(DeployError::Merge {
                    section: section.to_string(),
                    key,
                });
            }
            _ => {
                acc.insert(key, value);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, content: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn merges_two_files_in_filename_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "01-base.yaml", "configs:\n  db_host: localhost\n");
        write(dir.path(), "02-extra.yaml", "configs:\n  db_port: \"5432\"\n");
        let plan = load(dir.path()).unwrap();
        assert_eq!(plan.configs.len(), 2);
    }

    #[test]
    fn colliding_scalar_without_override_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "01-base.yaml", "configs:\n  db_host: localhost\n");
        write(dir.path(), "02-conflict.yaml", "configs:\n  db_host: other\n");
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, DeployError::Merge { .. }));
    }

    #[test]
    fn colliding_scalar_with_override_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "01-base.yaml", "configs:\n  db_host: localhost\n");
        write(
            dir.path(),
            "02-override.yaml",
            "configs:\n  db_host: other\ndeployments:\n  d1:\n    config-overrides: [db_host]\n    servers: {}\n",
        );
        let plan = load(dir.path()).unwrap();
        assert_eq!(plan.configs.get("db_host").unwrap().as_str().unwrap(), "other");
    }

    #[test]
    fn duplicate_deployment_id_across_files_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "01-a.yaml", "deployments:\n  d1:\n    servers: {}\n");
        write(dir.path(), "02-b.yaml", "deployments:\n  d1:\n    servers: {}\n");
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, DeployError::DuplicateDeployment(_)));
    }
}
