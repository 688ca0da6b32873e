//! The middleware registry (spec §4.E): factories keyed by type name,
//! named config entries, and the inline-parameter grammar that lets a
//! middleware reference in config override registered config for a single
//! lookup.
//!
//! ```text
//! ref        := name (WS kv (WS? "," WS? kv)*)?
//! kv         := key "=" (qstring | bareword)
//! qstring    := '"' (esc | not-quote-or-backslash)* '"'
//! bareword   := [^, \t"]+
//! ```

use dashmap::DashMap;
use lokstra_core::{LokstraError, MiddlewareFn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A factory turns a (possibly inline-overridden) config value into a
/// compiled [`MiddlewareFn`].
pub type MiddlewareFactory = Arc<dyn Fn(&Value) -> Result<MiddlewareFn, LokstraError> + Send + Sync>;

#[derive(Clone)]
struct MiddlewareTypeDef {
    factory: MiddlewareFactory,
    /// 1..=100, 1 = highest priority (spec §4.E; resolved in SPEC_FULL.md
    /// §3.1: ascending, ties broken by registration order).
    priority: u8,
}

#[derive(Clone)]
struct MiddlewareEntry {
    type_name: String,
    config: Value,
}

/// Two axes of state (spec §4.E): middleware *factories* keyed by type
/// name, and middleware *entries* (name → `{type, config}`). Compiled
/// instances are cached per full reference string (including inline
/// params) so distinct parameterisations of the same type never collide.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    types: Arc<DashMap<String, MiddlewareTypeDef>>,
    entries: Arc<DashMap<String, MiddlewareEntry>>,
    compiled: Arc<DashMap<String, Arc<OnceCell<MiddlewareFn>>>>,
    registration_order: Arc<DashMap<String, usize>>,
    next_order: Arc<std::sync::atomic::AtomicUsize>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&self, type_name: &str, factory: MiddlewareFactory, priority: u8) {
        let order = self.next_order.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.registration_order.insert(type_name.to_string(), order);
        self.types.insert(
            type_name.to_string(),
            MiddlewareTypeDef { factory, priority },
        );
    }

    pub fn register_entry(&self, name: &str, type_name: &str, config: Value) {
        self.entries.insert(
            name.to_string(),
            MiddlewareEntry {
                type_name: type_name.to_string(),
                config,
            },
        );
    }

    /// Priority (1 = highest) and registration order of the type behind
    /// `name`, used by callers that assemble a chain in priority order.
    pub fn ordering(&self, name: &str) -> Option<(u8, usize)> {
        let entry = self.entries.get(name)?;
        let def = self.types.get(&entry.type_name)?;
        let order = self.registration_order.get(&entry.type_name).map(|o| *o).unwrap_or(0);
        Some((def.priority, order))
    }

    /// Resolve a middleware *reference string* (spec grammar above) into a
    /// compiled [`MiddlewareFn`], parsing and applying any inline
    /// key/value overrides, and caching the result under the full
    /// reference string so different inline params produce distinct
    /// cached instances.
    pub async fn resolve(&self, reference: &str) -> Result<MiddlewareFn, LokstraError> {
        let cell = self
            .compiled
            .entry(reference.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let reference = reference.to_string();
        let this = self.clone();
        cell.get_or_try_init(|| async move { this.compile(&reference) })
            .await
            .cloned()
    }

    fn compile(&self, reference: &str) -> Result<MiddlewareFn, LokstraError> {
        let parsed = InlineRef::parse(reference)?;
        let entry = self
            .entries
            .get(&parsed.name)
            .ok_or_else(|| LokstraError::Config(format!("unknown middleware '{}'", parsed.name)))?;
        let def = self
            .types
            .get(&entry.type_name)
            .ok_or_else(|| LokstraError::Config(format!("unknown middleware type '{}'", entry.type_name)))?;

        let mut config = entry.config.clone();
        if let Value::Object(map) = &mut config {
            for (k, v) in parsed.params {
                map.insert(k, Value::String(v));
            }
        }
        (def.factory)(&config)
    }
}

/// A parsed middleware reference: base name plus inline key/value
/// overrides (spec §4.E grammar).
#[derive(Debug, PartialEq, Eq)]
struct InlineRef {
    name: String,
    params: Vec<(String, String)>,
}

impl InlineRef {
    fn parse(input: &str) -> Result<Self, LokstraError> {
        let trimmed = input.trim();
        let name_end = trimmed
            .find(|c: char| c.is_whitespace())
            .unwrap_or(trimmed.len());
        let name = trimmed[..name_end].to_string();
        if name.is_empty() {
            return Err(LokstraError::Config("middleware reference missing a name".into()));
        }
        let rest = trimmed[name_end..].trim_start();
        let params = if rest.is_empty() {
            Vec::new()
        } else {
            Self::parse_kv_list(rest)?
        };
        Ok(InlineRef { name, params })
    }

    fn parse_kv_list(input: &str) -> Result<Vec<(String, String)>, LokstraError> {
        let mut params = Vec::new();
        let chars: Vec<char> = input.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            while i < chars.len() && (chars[i].is_whitespace() || chars[i] == ',') {
                i += 1;
            }
            if i >= chars.len() {
                break;
            }
            let key_start = i;
            while i < chars.len() && chars[i] != '=' {
                i += 1;
            }
            if i >= chars.len() {
                return Err(LokstraError::Config(format!(
                    "malformed middleware param (missing '='): {input}"
                )));
            }
            let key: String = chars[key_start..i].iter().collect();
            i += 1; // skip '='
            let (value, next) = if i < chars.len() && chars[i] == '"' {
                Self::parse_qstring(&chars, i + 1)?
            } else {
                Self::parse_bareword(&chars, i)
            };
            params.push((key.trim().to_string(), value));
            i = next;
        }
        Ok(params)
    }

    fn parse_qstring(chars: &[char], mut i: usize) -> Result<(String, usize), LokstraError> {
        let mut value = String::new();
        while i < chars.len() {
            match chars[i] {
                '\\' if i + 1 < chars.len() => {
                    value.push(chars[i + 1]);
                    i += 2;
                }
                '"' => {
                    return Ok((value, i + 1));
                }
                c => {
                    value.push(c);
                    i += 1;
                }
            }
        }
        Err(LokstraError::Config("unterminated quoted middleware param value".into()))
    }

    fn parse_bareword(chars: &[char], mut i: usize) -> (String, usize) {
        let mut value = String::new();
        while i < chars.len() && chars[i] != ',' {
            value.push(chars[i]);
            i += 1;
        }
        (value.trim().to_string(), i)
    }
}
