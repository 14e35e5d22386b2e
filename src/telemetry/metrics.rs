//! Prometheus metrics setup and metric definitions

use crate::domain::PassReport;
use crate::error::{AppError, Result};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder with a scrape listener on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn install_prometheus_exporter(addr: &str) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid METRICS_ADDR '{}': {}", addr, e)))?;

    // Admin API latencies are dominated by network round trips
    let buckets = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(&buckets)
        .map_err(|e| AppError::Config(format!("Invalid histogram buckets: {}", e)))?
        .install()
        .map_err(|e| AppError::Config(format!("Failed to install Prometheus exporter: {}", e)))
}

/// Register metric descriptions and emit initial zero values so HELP/TYPE
/// lines are present before the first reconcile pass.
pub fn describe_metrics() {
    describe_counter!(
        "kcsync_admin_requests_total",
        "Keycloak admin API requests by method and status"
    );
    describe_histogram!(
        "kcsync_admin_request_duration_seconds",
        "Keycloak admin API request duration in seconds"
    );
    describe_counter!(
        "kcsync_reauthentications_total",
        "Admin token acquisitions (initial login and renewals)"
    );
    describe_counter!(
        "kcsync_reconcile_passes_total",
        "Reconcile passes by resource kind and outcome"
    );
    describe_counter!(
        "kcsync_reconcile_mutations_total",
        "Remote writes issued by reconcile passes"
    );

    counter!("kcsync_reauthentications_total").absolute(0);
    counter!("kcsync_reconcile_passes_total", "kind" => "client", "outcome" => "reconciled")
        .absolute(0);
    counter!("kcsync_reconcile_passes_total", "kind" => "client", "outcome" => "failing")
        .absolute(0);
}

pub fn record_admin_request(method: &str, status: &str, elapsed: Duration) {
    counter!(
        "kcsync_admin_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "kcsync_admin_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_authentication() {
    counter!("kcsync_reauthentications_total").increment(1);
}

/// `outcome` is `reconciled` or `failing`
pub fn record_reconcile_pass(kind: &'static str, outcome: &'static str) {
    counter!("kcsync_reconcile_passes_total", "kind" => kind, "outcome" => outcome).increment(1);
}

/// Mutating admin calls of one pass, by operation
pub fn record_mutations(report: &PassReport) {
    let operations = [
        ("create", report.created),
        ("update", report.updated),
        ("delete", report.deleted),
        ("link", report.linked),
        ("unlink", report.unlinked),
    ];
    for (operation, count) in operations {
        if count > 0 {
            counter!("kcsync_reconcile_mutations_total", "operation" => operation)
                .increment(count);
        }
    }
}
