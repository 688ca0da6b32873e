//! `App = {name, addr, router, listener}` (spec §4.K).

use lokstra_http::{FastHttpListener, ListenerSupervisor, NetHttpListener, TlsListener};
use lokstra_router::RouterEngine;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Which of the three listener backends (spec §4.J) this app binds with.
#[derive(Clone)]
pub enum ListenerKind {
    Http,
    Tls { cert_path: PathBuf, key_path: PathBuf },
    FastHttp,
}

pub struct App {
    pub name: String,
    pub addr: SocketAddr,
    pub listener: Arc<dyn ListenerSupervisor>,
}

impl App {
    pub fn new(name: impl Into<String>, addr: SocketAddr, engine: Arc<dyn RouterEngine>, kind: ListenerKind) -> Self {
        let listener: Arc<dyn ListenerSupervisor> = match kind {
            ListenerKind::Http => Arc::new(NetHttpListener::new(addr, engine)),
            ListenerKind::Tls { cert_path, key_path } => Arc::new(TlsListener::new(addr, cert_path, key_path, engine)),
            ListenerKind::FastHttp => Arc::new(FastHttpListener::new(addr, engine)),
        };
        App {
            name: name.into(),
            addr,
            listener,
        }
    }
}
