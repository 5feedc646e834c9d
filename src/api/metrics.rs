//! `GET /metrics`

use axum::{Router, http::header, response::IntoResponse, routing::get};
use prometheus::{Encoder, TextEncoder};

use crate::error::AppError;
use crate::metrics::REGISTRY;

/// Flow counters in the Prometheus text format
async fn render_metrics() -> Result<impl IntoResponse, AppError> {
    let encoder = TextEncoder::new();
    let text = encoder
        .encode_to_string(&REGISTRY.gather())
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], text))
}

/// Stateless, so it is merged after `with_state`.
pub fn metrics_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/metrics", get(render_metrics))
}
