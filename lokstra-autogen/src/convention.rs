//! A [`Convention`] is a pure function from `(methodName, resource,
//! resourcePlural) -> (httpMethod, pathTemplate)` (spec §4.F). Both the
//! route generator (this crate) and the proxy generator (`lokstra-proxy`)
//! consume the exact same function, which is the load-bearing mechanism
//! behind the symmetry invariant (spec §8 property 1): for any
//! `(convention, override)` pair and any method name, the route the
//! server registers and the URL the proxy calls are byte-identical.

use http::Method;

/// One derived route before any [`crate::override_rules::RouteOverride`]
/// is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionRoute {
    pub method: Method,
    pub path: String,
}

/// Built-in conventions named in spec §4.F. `Custom` carries a function
/// pointer so callers can supply their own pure mapping while still
/// participating in the same symmetry guarantee (the same `Convention`
/// value is handed to both the router generator and the proxy generator).
#[derive(Clone, Copy)]
pub enum Convention {
    /// `List -> GET /{plural}`, `Get -> GET /{plural}/{id}`,
    /// `Create -> POST /{plural}`, `Update -> PUT /{plural}/{id}`,
    /// `Delete -> DELETE /{plural}/{id}`. Any other method name falls back
    /// to `POST /{plural}/{method}` (RPC-style escape hatch).
    Rest,
    /// Every method is `POST /{plural}/{methodName}`.
    Rpc,
    /// A caller-supplied pure mapping function.
    Custom(fn(&str, &str, &str) -> ConventionRoute),
}

impl Convention {
    /// Apply the convention to a method name and resource names. This is
    /// the single function both `GenerateRouter` and `GenerateProxy` call
    /// (spec §9, "Server/client symmetry").
    pub fn apply(&self, method_name: &str, resource: &str, resource_plural: &str) -> ConventionRoute {
        match self {
            Convention::Rest => rest_route(method_name, resource_plural),
            Convention::Rpc => rpc_route(method_name, resource_plural),
            Convention::Custom(f) => f(method_name, resource, resource_plural),
        }
        .tap_resource(resource)
    }
}

// A resource-unused no-op hook kept symmetrical with the spec's 3-argument
// convention signature; built-ins only need the plural form today.
trait TapResource {
    fn tap_resource(self, resource: &str) -> Self;
}
impl TapResource for ConventionRoute {
    fn tap_resource(self, _resource: &str) -> Self {
        self
    }
}

fn rest_route(method_name: &str, plural: &str) -> ConventionRoute {
    match method_name {
        "List" => ConventionRoute {
            method: Method::GET,
            path: format!("/{plural}"),
        },
        "Get" => ConventionRoute {
            method: Method::GET,
            path: format!("/{plural}/{{id}}"),
        },
        "Create" => ConventionRoute {
            method: Method::POST,
            path: format!("/{plural}"),
        },
        "Update" => ConventionRoute {
            method: Method::PUT,
            path: format!("/{plural}/{{id}}"),
        },
        "Delete" => ConventionRoute {
            method: Method::DELETE,
            path: format!("/{plural}/{{id}}"),
        },
        other => rpc_route(other, plural),
    }
}

fn rpc_route(method_name: &str, plural: &str) -> ConventionRoute {
    ConventionRoute {
        method: Method::POST,
        path: format!("/{plural}/{method_name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_list_and_get() {
        let r = Convention::Rest.apply("List", "user", "users");
        assert_eq!(r.method, Method::GET);
        assert_eq!(r.path, "/users");

        let r = Convention::Rest.apply("Get", "user", "users");
        assert_eq!(r.method, Method::GET);
        assert_eq!(r.path, "/users/{id}");
    }

    #[test]
    fn rest_create_update_delete() {
        assert_eq!(Convention::Rest.apply("Create", "user", "users").method, Method::POST);
        assert_eq!(Convention::Rest.apply("Update", "user", "users").method, Method::PUT);
        assert_eq!(Convention::Rest.apply("Delete", "user", "users").method, Method::DELETE);
    }

    #[test]
    fn rest_unknown_method_falls_back_to_rpc_style() {
        let r = Convention::Rest.apply("Activate", "user", "users");
        assert_eq!(r.method, Method::POST);
        assert_eq!(r.path, "/users/Activate");
    }

    #[test]
    fn rpc_always_posts_under_method_name() {
        let r = Convention::Rpc.apply("List", "user", "users");
        assert_eq!(r.method, Method::POST);
        assert_eq!(r.path, "/users/List");
    }

    #[test]
    fn custom_convention_is_a_pure_function() {
        fn caps(method: &str, _resource: &str, plural: &str) -> ConventionRoute {
            ConventionRoute {
                method: Method::GET,
                path: format!("/{plural}/{method}").to_uppercase(),
            }
        }
        let r = Convention::Custom(caps).apply("get", "user", "users");
        assert_eq!(r.path, "/USERS/GET");
    }
}
