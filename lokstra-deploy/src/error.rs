use lokstra_core::LokstraError;

/// Deploy-planner error kinds (spec §7 `ConfigError`): malformed YAML,
/// duplicate name, missing published service, unknown middleware type -
/// all fatal at startup. Mirrors `r2e_core::config::ConfigError`'s manual
/// `Display`/`Error` impls rather than deriving via `thiserror`.
#[derive(Debug, Clone)]
pub enum DeployError {
    Load(String),
    Merge { section: String, key: String },
    Placeholder(String),
    PublishConflict { service: String, app_a: String, app_b: String },
    MissingPublisher(String),
    DuplicateDeployment(String),
}

impl std::fmt::Display for DeployError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployError::Load(msg) => write!(f, "failed to load deployment plan: {msg}"),
            DeployError::Merge { section, key } => {
                write!(f, "conflicting value for '{key}' in section '{section}' across plan files (not listed in config-overrides)")
            }
            DeployError::Placeholder(msg) => write!(f, "placeholder expansion failed: {msg}"),
            DeployError::PublishConflict { service, app_a, app_b } => {
                write!(f, "service '{service}' is published by both '{app_a}' and '{app_b}'")
            }
            DeployError::MissingPublisher(name) => {
                write!(f, "external service '{name}' has no app that publishes it")
            }
            DeployError::DuplicateDeployment(name) => write!(f, "duplicate deployment id '{name}'"),
        }
    }
}

impl std::error::Error for DeployError {}

impl From<DeployError> for LokstraError {
    fn from(err: DeployError) -> Self {
        LokstraError::Config(err.to_string())
    }
}
