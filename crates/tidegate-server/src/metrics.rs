//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup
/// before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Chat completions served (counter, labels: model, stream).
pub const COMPLETIONS_TOTAL: &str = "completions_total";
/// Upstream failures (counter, labels: kind).
pub const UPSTREAM_ERRORS_TOTAL: &str = "upstream_errors_total";
/// Tool calls returned to clients (counter).
pub const TOOL_CALLS_TOTAL: &str = "tool_calls_total";
/// Streams abandoned by the client or an idle timeout (counter, labels: reason).
pub const STREAM_CANCELLATIONS_TOTAL: &str = "stream_cancellations_total";
