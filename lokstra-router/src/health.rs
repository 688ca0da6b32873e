//! Health endpoint mounting (spec §2 "Supplemented features"): readiness
//! and liveness checks are an ambient operational surface the spec's
//! Non-goals never name, so they ride along with the rest of the router
//! façade rather than being excluded.
//!
//! Grounded on the teacher's `r2e_core::health` module: a trait for named
//! checks, an aggregator distinguishing liveness from readiness, and three
//! routes (`/health`, `/health/live`, `/health/ready`). Scaled down to this
//! workspace's handler shape (one `MiddlewareFn` per route, no axum
//! `State` extractor) and its envelope conventions.

use crate::router::handler;
use http::StatusCode;
use lokstra_core::{BoxFuture, Ctx, LokstraError, MiddlewareFn, Response};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// The result of one named check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Up,
    Down(String),
}

impl CheckStatus {
    pub fn is_up(&self) -> bool {
        matches!(self, CheckStatus::Up)
    }
}

/// A named health check. `affects_readiness = false` marks a liveness-only
/// check (e.g. disk space) that should not block `/health/ready`.
pub trait HealthCheck: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn check(&self) -> BoxFuture<'_, CheckStatus>;
    fn affects_readiness(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Serialize)]
struct CheckReport {
    name: String,
    status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "UPPERCASE")]
enum ReportStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
struct AggregateReport {
    status: ReportStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    checks: Vec<CheckReport>,
    uptime_seconds: u64,
}

/// Registry of health checks plus the process start time, mounted onto a
/// [`crate::router::Router`] under a prefix (conventionally `/`).
pub struct HealthRegistry {
    checks: Vec<Arc<dyn HealthCheck>>,
    started_at: Instant,
}

impl HealthRegistry {
    pub fn new() -> Self {
        HealthRegistry {
            checks: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn register(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    async fn aggregate(&self, readiness_only: bool) -> AggregateReport {
        let mut reports = Vec::new();
        let mut all_up = true;
        for check in &self.checks {
            if readiness_only && !check.affects_readiness() {
                continue;
            }
            let status = check.check().await;
            if !status.is_up() {
                all_up = false;
            }
            let (report_status, reason) = match status {
                CheckStatus::Up => (ReportStatus::Up, None),
                CheckStatus::Down(reason) => (ReportStatus::Down, Some(reason)),
            };
            reports.push(CheckReport {
                name: check.name().to_string(),
                status: report_status,
                reason,
            });
        }
        AggregateReport {
            status: if all_up { ReportStatus::Up } else { ReportStatus::Down },
            checks: reports,
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }

    fn into_shared(self) -> Arc<HealthRegistry> {
        Arc::new(self)
    }

    /// Build the three route handlers (`/health`, `/health/live`,
    /// `/health/ready`) over this registry, ready for
    /// [`crate::router::Router::get`].
    pub fn into_handlers(self) -> (MiddlewareFn, MiddlewareFn, MiddlewareFn) {
        let shared = self.into_shared();

        let for_health = shared.clone();
        let health = handler(move |ctx: &mut Ctx| {
            let shared = for_health.clone();
            async move {
                let report = shared.aggregate(false).await;
                ctx.respond(report_response(&report));
                Ok(())
            }
        });

        let live = handler(|ctx: &mut Ctx| async move {
            ctx.respond(Response::text(StatusCode::OK, "OK"));
            Ok(())
        });

        let for_ready = shared.clone();
        let ready = handler(move |ctx: &mut Ctx| {
            let shared = for_ready.clone();
            async move {
                let report = shared.aggregate(true).await;
                ctx.respond(report_response(&report));
                Ok(())
            }
        });

        (health, live, ready)
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn report_response(report: &AggregateReport) -> Response {
    let status = match report.status {
        ReportStatus::Up => StatusCode::OK,
        ReportStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };
    Response::json(status, report)
}
