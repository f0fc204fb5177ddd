//! HTTP surface of the analysis pipeline.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info};

use crate::{error::AnalysisError, pipeline::AnalysisService};

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

/// Router exposing `POST`/`OPTIONS` on `path` plus `GET /health`.
pub fn router(service: AnalysisService, path: &str) -> Router {
    Router::new()
        .route(path, post(analyze).options(preflight))
        .route("/health", get(|| async { "ok" }))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(ALLOW_ORIGIN),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
        .with_state(service)
}

pub async fn serve(listener: tokio::net::TcpListener, router: Router) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "analysis endpoint listening");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn analyze(State(service): State<AnalysisService>, body: Bytes) -> Response {
    let body: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(err) => {
            error!(error = %err, "analysis request body is not JSON");
            return AnalysisError::Internal(err.to_string()).into_response();
        }
    };

    match service.analyze_json(body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.envelope())).into_response()
    }
}
