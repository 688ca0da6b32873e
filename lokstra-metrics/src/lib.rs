//! The metrics service (spec component L): a process-wide counter/gauge/
//! histogram registry with a label schema fixed at first observation, an
//! HTTP request-tracking middleware, and the `/metrics` handler.
//!
//! Grounded on `r2e-prometheus` (Tower layer + `prometheus::Registry` +
//! text-encoded handler), generalised from the teacher's one fixed HTTP
//! histogram into a name-keyed registry any service can declare metrics
//! against.

mod handler;
mod middleware;
mod registry;

pub use handler::metrics_handler;
pub use middleware::HttpMetrics;
pub use registry::{MetricsRegistry, Summary};
