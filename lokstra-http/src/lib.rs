//! HTTP listener supervisor (spec §4.J): three backends - net/http, TLS
//! and fasthttp-style - sharing one `ListenAndServe`/`Shutdown`/
//! `IsRunning`/`ActiveRequest` interface and one drain/503 policy.

mod bridge;
mod drain;
mod fasthttp;
mod net_http;
mod supervisor;
mod tls;

pub use bridge::{OutBody, RouterService};
pub use drain::DrainState;
pub use fasthttp::FastHttpListener;
pub use net_http::NetHttpListener;
pub use supervisor::ListenerSupervisor;
pub use tls::TlsListener;
