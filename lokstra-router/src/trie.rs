//! The single matching data structure shared by all three router engines
//! (spec §4.B). Each engine only differs in how it translates its native
//! pattern syntax into [`crate::pattern::Pattern`] before calling
//! [`Trie::insert`]; matching, the 404/405 split, `Allow` computation, and
//! the HEAD/OPTIONS synthesis all live here exactly once.

use crate::pattern::{Pattern, Segment};
use http::Method;
use lokstra_core::MiddlewareFn;
use std::collections::HashMap;
use std::sync::Arc;

/// A fully composed per-route middleware chain (group middleware + route
/// middleware + the terminal handler adapter), driven by [`lokstra_core::Ctx::next`].
pub type RouteChain = Arc<Vec<MiddlewareFn>>;

/// The verbs `ANY` expands to (spec §4.B: "register the handler for every
/// common verb").
const ANY_VERBS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Source {
    Explicit,
    Any,
    AutoHead,
}

#[derive(Clone)]
struct MethodEntry {
    chain: RouteChain,
    source: Source,
}

#[derive(Default)]
struct Node {
    static_children: HashMap<String, Node>,
    param_child: Option<(String, Box<Node>)>,
    wildcard: Option<(String, Box<Node>)>,
    methods: HashMap<Method, MethodEntry>,
}

impl Node {
    fn ensure_static(&mut self, key: &str) -> &mut Node {
        self.static_children.entry(key.to_string()).or_default()
    }

    fn ensure_param(&mut self, name: &str) -> &mut Node {
        if self.param_child.is_none() {
            self.param_child = Some((name.to_string(), Box::new(Node::default())));
        }
        &mut self.param_child.as_mut().unwrap().1
    }

    fn ensure_wildcard(&mut self, name: &str) -> &mut Node {
        if self.wildcard.is_none() {
            self.wildcard = Some((name.to_string(), Box::new(Node::default())));
        }
        &mut self.wildcard.as_mut().unwrap().1
    }
}

pub struct Match<'a> {
    pub chain: &'a RouteChain,
    pub params: HashMap<String, String>,
    pub is_auto_head: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MatchError {
    NotFound,
    MethodNotAllowed(Vec<Method>),
}

pub struct Trie {
    root: Node,
}

impl Default for Trie {
    fn default() -> Self {
        Trie { root: Node::default() }
    }
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `handler` for `method` at `pattern`. `ANY` expands to every
    /// verb in [`ANY_VERBS`] without clobbering an explicit registration
    /// that already occupies a slot (explicit beats `ANY` regardless of
    /// insertion order, per the spec's tie-break rule). Registering `GET`
    /// auto-registers `HEAD` at the same node unless `HEAD` was already
    /// registered explicitly.
    pub fn insert(&mut self, method: Method, pattern: &Pattern, chain: RouteChain) {
        let node = Self::walk_insert(&mut self.root, &pattern.segments);
        if method == Method::GET {
            node.methods.insert(
                Method::GET,
                MethodEntry {
                    chain: chain.clone(),
                    source: Source::Explicit,
                },
            );
            node.methods.entry(Method::HEAD).or_insert(MethodEntry {
                chain,
                source: Source::AutoHead,
            });
            return;
        }
        if method.as_str() == "ANY" {
            for verb in ANY_VERBS.iter() {
                let replace = match node.methods.get(verb) {
                    Some(existing) => existing.source == Source::Any,
                    None => true,
                };
                if replace {
                    node.methods.insert(
                        verb.clone(),
                        MethodEntry {
                            chain: chain.clone(),
                            source: Source::Any,
                        },
                    );
                }
            }
            // `ANY` registers GET, so it must also auto-register HEAD at
            // this node (spec §4.B, §8 property 5) unless HEAD was already
            // registered explicitly.
            node.methods.entry(Method::HEAD).or_insert(MethodEntry {
                chain,
                source: Source::AutoHead,
            });
            return;
        }
        node.methods.insert(
            method,
            MethodEntry {
                chain,
                source: Source::Explicit,
            },
        );
    }

    fn walk_insert<'n>(root: &'n mut Node, segments: &[Segment]) -> &'n mut Node {
        let mut node = root;
        for seg in segments {
            node = match seg {
                Segment::Static(s) => node.ensure_static(s),
                Segment::Param(name) => node.ensure_param(name),
                Segment::Wildcard(name) => node.ensure_wildcard(name),
            };
        }
        node
    }

    pub fn find(&self, method: &Method, path: &str) -> Result<Match<'_>, MatchError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = HashMap::new();
        let node = Self::walk_find(&self.root, &segments, &mut params).ok_or(MatchError::NotFound)?;
        if node.methods.is_empty() {
            return Err(MatchError::NotFound);
        }
        match node.methods.get(method) {
            Some(entry) => Ok(Match {
                chain: &entry.chain,
                params,
                is_auto_head: entry.source == Source::AutoHead,
            }),
            None => Err(MatchError::MethodNotAllowed(Self::allowed_methods_of(node))),
        }
    }

    /// All methods registered at the node matching `path`, for `Allow`
    /// header computation (OPTIONS and 405 responses). Returns `None` if
    /// the path itself has no registrations at all (plain 404).
    pub fn allowed_methods(&self, path: &str) -> Option<Vec<Method>> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = HashMap::new();
        let node = Self::walk_find(&self.root, &segments, &mut params)?;
        if node.methods.is_empty() {
            return None;
        }
        Some(Self::allowed_methods_of(node))
    }

    fn allowed_methods_of(node: &Node) -> Vec<Method> {
        let mut methods: Vec<Method> = node.methods.keys().cloned().collect();
        if !methods.contains(&Method::OPTIONS) {
            methods.push(Method::OPTIONS);
        }
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods.dedup();
        methods
    }

    fn walk_find<'n>(
        node: &'n Node,
        segments: &[&str],
        params: &mut HashMap<String, String>,
    ) -> Option<&'n Node> {
        if segments.is_empty() {
            return Some(node);
        }
        let (head, rest) = segments.split_first().unwrap();
        if let Some(child) = node.static_children.get(*head) {
            if let Some(found) = Self::walk_find(child, rest, params) {
                return Some(found);
            }
        }
        if let Some((name, child)) = &node.param_child {
            params.insert(name.clone(), (*head).to_string());
            if let Some(found) = Self::walk_find(child, rest, params) {
                return Some(found);
            }
            params.remove(name);
        }
        if let Some((name, child)) = &node.wildcard {
            let remainder = segments.join("/");
            params.insert(name.clone(), remainder);
            return Some(child);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lokstra_core::{Ctx, LokstraError};
    use std::sync::Arc;

    fn noop_handler() -> RouteChain {
        let f: MiddlewareFn = Arc::new(|_ctx: &mut Ctx| Box::pin(async move { Ok::<(), LokstraError>(()) }));
        Arc::new(vec![f])
    }

    #[test]
    fn exact_path_beats_wildcard() {
        let mut trie = Trie::new();
        trie.insert(Method::GET, &Pattern::parse("/files/{path...}").unwrap(), noop_handler());
        trie.insert(Method::GET, &Pattern::parse("/files/readme").unwrap(), noop_handler());
        let m = trie.find(&Method::GET, "/files/readme").unwrap();
        assert!(m.params.is_empty());
    }

    #[test]
    fn longest_static_prefix_wins_over_param() {
        let mut trie = Trie::new();
        trie.insert(Method::GET, &Pattern::parse("/users/{id}").unwrap(), noop_handler());
        trie.insert(Method::GET, &Pattern::parse("/users/me").unwrap(), noop_handler());
        let m = trie.find(&Method::GET, "/users/me").unwrap();
        assert!(m.params.is_empty());
        let m2 = trie.find(&Method::GET, "/users/42").unwrap();
        assert_eq!(m2.params.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn get_auto_registers_head() {
        let mut trie = Trie::new();
        trie.insert(Method::GET, &Pattern::parse("/ping").unwrap(), noop_handler());
        let m = trie.find(&Method::HEAD, "/ping").unwrap();
        assert!(m.is_auto_head);
    }

    #[test]
    fn explicit_method_beats_any() {
        let mut trie = Trie::new();
        trie.insert(Method::from_bytes(b"ANY").unwrap(), &Pattern::parse("/x").unwrap(), noop_handler());
        trie.insert(Method::POST, &Pattern::parse("/x").unwrap(), noop_handler());
        let m = trie.find(&Method::POST, "/x").unwrap();
        assert!(!m.is_auto_head);
        assert!(trie.find(&Method::GET, "/x").is_ok());
    }

    #[test]
    fn missing_verb_on_known_path_is_405_with_allow() {
        let mut trie = Trie::new();
        trie.insert(Method::GET, &Pattern::parse("/items").unwrap(), noop_handler());
        trie.insert(Method::POST, &Pattern::parse("/items").unwrap(), noop_handler());
        match trie.find(&Method::DELETE, "/items") {
            Err(MatchError::MethodNotAllowed(allowed)) => {
                assert!(allowed.contains(&Method::GET));
                assert!(allowed.contains(&Method::POST));
                assert!(allowed.contains(&Method::HEAD));
                assert!(allowed.contains(&Method::OPTIONS));
            }
            other => panic!("expected MethodNotAllowed, got {other:?}"),
        }
    }

    #[test]
    fn unknown_path_is_not_found() {
        let trie = Trie::new();
        assert_eq!(trie.find(&Method::GET, "/nope"), Err(MatchError::NotFound));
    }

    #[test]
    fn wildcard_captures_remaining_segments() {
        let mut trie = Trie::new();
        trie.insert(Method::GET, &Pattern::parse("/static/{rest...}").unwrap(), noop_handler());
        let m = trie.find(&Method::GET, "/static/js/app.js").unwrap();
        assert_eq!(m.params.get("rest"), Some(&"js/app.js".to_string()));
    }
}
