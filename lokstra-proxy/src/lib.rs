//! Typed HTTP proxy client (spec component G): `proxy.Service{baseURL,
//! conversion, override, httpClient}.Call(...)`, reverse-mapping the
//! standard envelope and the transport layer onto the shared error
//! taxonomy.
//!
//! The path/verb a call targets is computed by
//! [`lokstra_autogen::resolve_route`] - the same function
//! `lokstra-autogen`'s router generator runs - so a service's server routes
//! and its generated proxy agree on every method (spec §8 property 1).

use http::Method;
use lokstra_autogen::{resolve_route, Convention, ResourceNames, RouteOverride};
use lokstra_core::envelope::{ApiEnvelope, EnvelopeStatus};
use lokstra_core::LokstraError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// A typed client for one remote resource, generated from the same
/// convention/override pair its server-side counterpart uses.
pub struct Service {
    base_url: String,
    resource: ResourceNames,
    convention: Convention,
    overrides: RouteOverride,
    http: reqwest::Client,
}

impl Service {
    pub fn new(base_url: impl Into<String>, resource: ResourceNames, convention: Convention, overrides: RouteOverride) -> Self {
        Service {
            base_url: base_url.into(),
            resource,
            convention,
            overrides,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Call `method_name` with `path_params` substituted into the derived
    /// path template, `query_params` URL-encoded and appended to the
    /// request URL, and `body` sent as the JSON request body for
    /// POST/PUT/PATCH (ignored otherwise). This is the same path+query+body
    /// mapping [`lokstra_core::Ctx::bind`] reads on the server side (spec
    /// §4.G, §4.F), so a `List` call's pagination fields travel as query
    /// params the same way the server binds them. Reverse-maps the
    /// standard envelope into `T` on success, or into a [`LokstraError`]
    /// (spec §4.G: 2xx/4xx/5xx/transport-failure all map onto the shared
    /// taxonomy).
    pub async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method_name: &str,
        path_params: &HashMap<String, String>,
        query_params: &HashMap<String, String>,
        body: Option<&B>,
    ) -> Result<T, LokstraError> {
        let route = resolve_route(&self.convention, &self.overrides, method_name, &self.resource);
        let url = format!("{}{}", self.base_url, substitute_path(&route.path, path_params));

        let mut req = self.http.request(route.method.clone(), &url);
        if !query_params.is_empty() {
            req = req.query(&query_params.iter().collect::<Vec<_>>());
        }
        if matches!(route.method, Method::POST | Method::PUT | Method::PATCH) {
            if let Some(b) = body {
                req = req.json(b);
            }
        }

        let resp = req.send().await.map_err(|e| LokstraError::Transport(e.to_string()))?;

        let status = resp.status();
        let raw: Value = resp
            .json()
            .await
            .map_err(|e| LokstraError::Internal(format!("invalid response body: {e}")))?;
        let envelope: ApiEnvelope<Value> = ApiEnvelope::from_json(raw)
            .map_err(|e| LokstraError::Internal(format!("response did not match the envelope shape: {e}")))?;

        match envelope.status {
            EnvelopeStatus::Success => {
                let data = envelope.data.unwrap_or(Value::Null);
                serde_json::from_value(data).map_err(|e| LokstraError::Internal(format!("data did not match expected type: {e}")))
            }
            EnvelopeStatus::Error => {
                let err = envelope.error.unwrap_or(lokstra_core::envelope::ErrorBody {
                    code: "UPSTREAM_ERROR".into(),
                    message: format!("upstream returned {status} with no error body"),
                    fields: Vec::new(),
                });
                Err(LokstraError::Upstream {
                    code: err.code,
                    message: err.message,
                })
            }
        }
    }
}

/// Replace every `{name}` placeholder in `path` with its value from
/// `path_params`. Unresolved placeholders are left as-is; the remote will
/// 404 rather than the client silently sending a malformed path.
fn substitute_path(path: &str, path_params: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            let mut name = String::new();
            for c2 in chars.by_ref() {
                if c2 == '}' {
                    break;
                }
                name.push(c2);
            }
            let name = name.trim_end_matches("...");
            match path_params.get(name) {
                Some(v) => out.push_str(v),
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_path_fills_known_params() {
        let mut params = HashMap::new();
        params.insert("id".to_string(), "42".to_string());
        assert_eq!(substitute_path("/users/{id}", &params), "/users/42");
    }

    #[test]
    fn substitute_path_leaves_unknown_placeholders() {
        let params = HashMap::new();
        assert_eq!(substitute_path("/users/{id}", &params), "/users/{id}");
    }

    #[test]
    fn substitute_path_handles_wildcard_suffix_syntax() {
        let mut params = HashMap::new();
        params.insert("rest".to_string(), "a/b/c".to_string());
        assert_eq!(substitute_path("/files/{rest...}", &params), "/files/a/b/c");
    }

    #[test]
    fn call_target_matches_what_the_router_would_generate() {
        let resource = ResourceNames::new("user", "users");
        let overrides = RouteOverride::new().with_prefix("/api/v1");
        let route = resolve_route(&Convention::Rest, &overrides, "Get", &resource);
        assert_eq!(route.path, "/api/v1/users/{id}");
        assert_eq!(route.method, Method::GET);
    }

    #[test]
    fn query_params_are_url_encoded_and_appended() {
        let client = reqwest::Client::new();
        let mut query = HashMap::new();
        query.insert("page".to_string(), "2".to_string());
        query.insert("q".to_string(), "a b".to_string());
        let req = client
            .request(Method::GET, "http://example.test/users")
            .query(&query.iter().collect::<Vec<_>>())
            .build()
            .unwrap();
        let pairs: HashMap<String, String> = req.url().query_pairs().into_owned().collect();
        assert_eq!(pairs.get("page"), Some(&"2".to_string()));
        assert_eq!(pairs.get("q"), Some(&"a b".to_string()));
    }
}
