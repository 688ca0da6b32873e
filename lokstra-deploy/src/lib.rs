//! The deployment planner (spec component H): loads a directory of YAML
//! files describing configs, services, routers, servers and apps, merges
//! them, namespaces every inline definition, and resolves which services
//! are local versus published by another app in the same plan.

pub mod error;
pub mod loader;
pub mod plan;
pub mod schema;
pub mod secrets;

pub use error::DeployError;
pub use plan::Plan;
pub use schema::{AppDef, DeploymentDef, MountDef, RawPlan, ReverseProxyDef, ServerDef};

use std::path::Path;

/// `Deploy::load(path)`: load (file or directory), merge, and resolve a
/// deployment plan in one call.
pub struct Deploy;

impl Deploy {
    pub fn load(path: impl AsRef<Path>) -> Result<Plan, DeployError> {
        let raw = loader::load(path.as_ref())?;
        plan::resolve(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_reads_a_single_file_plan() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plan.yaml");
        let mut f = std::fs::File::create(&file).unwrap();
        f.write_all(
            b"configs:\n  greeting: hello\ndeployments:\n  d1:\n    servers:\n      s1:\n        addr: ':8080'\n",
        )
        .unwrap();

        let plan = Deploy::load(&file).unwrap();
        assert_eq!(plan.configs.get("greeting").unwrap(), "hello");
        assert_eq!(plan.deployments.get("d1").unwrap().servers.get("s1").unwrap().apps[0].url, "http://localhost:8080");
    }
}
