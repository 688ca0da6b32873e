//! Router engines and router façade for Lokstra (spec components B and C).
//!
//! Three pluggable engines (`tree-mux`, `chi`, `fasthttp`) normalise their
//! native pattern dialects into one semantic over a single [`trie::Trie`];
//! [`router::Router`] is the engine-agnostic façade applications build
//! against (groups, middleware locking, overrides, mounts).

pub mod engine;
pub mod health;
pub mod pattern;
pub mod reverse_proxy;
pub mod router;
pub mod static_files;
mod trie;

pub use engine::{ChiEngine, FastHttpEngine, RouterEngine, TreeMuxEngine};
pub use health::{CheckStatus, HealthCheck, HealthRegistry};
pub use pattern::{Pattern, Segment};
pub use reverse_proxy::ReverseProxyMount;
pub use router::{handler, serve, Handler, Router};
pub use static_files::StaticMount;
