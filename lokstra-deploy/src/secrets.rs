//! Placeholder expansion: `${NAME}` and `${NAME:-default}` (spec §4.H,
//! "Variable substitution"), resolved from the plan's own `configs` section
//! first, then process environment - mirrors the teacher's
//! `SecretResolver`/`resolve_placeholders` shape (`r2e_core::config::secrets`)
//! generalized from secrets-only to any configured value.

use crate::error::DeployError;
use std::collections::BTreeMap;

pub trait SecretResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Look up `configs.<name>` (as a plain string) first, then fall back to
/// the process environment.
pub struct ConfigAndEnvResolver<'a> {
    pub configs: &'a BTreeMap<String, String>,
}

impl<'a> SecretResolver for ConfigAndEnvResolver<'a> {
    fn resolve(&self, name: &str) -> Option<String> {
        self.configs.get(name).cloned().or_else(|| std::env::var(name).ok())
    }
}

/// Expand every `${NAME}`/`${NAME:-default}` occurrence in `input`.
/// Unresolvable placeholders with no default are a hard error (spec §7
/// ConfigError: fatal at startup).
pub fn resolve_placeholders(input: &str, resolver: &dyn SecretResolver) -> Result<String, DeployError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| DeployError::Placeholder(format!("unclosed placeholder in: {input}")))?;
        let body = &after[..end];
        let (name, default) = match body.split_once(":-") {
            Some((n, d)) => (n, Some(d)),
            None => (body, None),
        };
        let resolved = match resolver.resolve(name) {
            Some(v) => v,
            None => default
                .map(str::to_string)
                .ok_or_else(|| DeployError::Placeholder(format!("no value for '{name}' and no default given")))?,
        };
        out.push_str(&resolved);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(BTreeMap<String, String>);
    impl SecretResolver for Fixed {
        fn resolve(&self, name: &str) -> Option<String> {
            self.0.get(name).cloned()
        }
    }

    #[test]
    fn expands_known_variable() {
        let mut m = BTreeMap::new();
        m.insert("HOST".to_string(), "db.internal".to_string());
        let resolved = resolve_placeholders("postgres://${HOST}/app", &Fixed(m)).unwrap();
        assert_eq!(resolved, "postgres://db.internal/app");
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        let resolved = resolve_placeholders("${PORT:-5432}", &Fixed(BTreeMap::new())).unwrap();
        assert_eq!(resolved, "5432");
    }

    #[test]
    fn missing_variable_without_default_errors() {
        let err = resolve_placeholders("${MISSING}", &Fixed(BTreeMap::new())).unwrap_err();
        assert!(matches!(err, DeployError::Placeholder(_)));
    }

    #[test]
    fn multiple_placeholders_in_one_string() {
        let mut m = BTreeMap::new();
        m.insert("SCHEME".to_string(), "https".to_string());
        let resolved = resolve_placeholders("${SCHEME}://${HOST:-localhost}:${PORT:-8080}", &Fixed(m)).unwrap();
        assert_eq!(resolved, "https://localhost:8080");
    }
}
