//! Server/App aggregator (spec component K): `App = {name, addr, router,
//! listener}`, `Server = {name, apps[], settings}`, concurrent app
//! startup, and aggregate graceful shutdown bounded by one total timeout
//! rather than one timeout per app.
//!
//! Grounded on `r2e_core::builder::AppBuilder`'s lifecycle (`start()` /
//! `start_and_wait_for_shutdown()`), generalised from "one app per
//! process" to "many apps per server, many servers per deployment".

mod app;
mod server;

pub use app::{App, ListenerKind};
pub use server::Server;
