//! HTTP surface for operators.
//!
//! - `GET /v1/package/{package}/info` - version report
//! - `POST /v1/package/{package}/updatetoversion/{version}` - swap to a release
//!
//! Browsers may call both routes from the origins listed in `server.allowed_origins`.

mod server;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::warn;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::application::{UpgradeService, VersionReport};
use crate::error::UpgradeError;
use crate::runtime::Runtime;

pub use server::{serve, serve_with_shutdown};

/// Successful response envelope.
#[derive(Debug, Serialize)]
pub struct SystemResponse<T: Serialize> {
    pub message: String,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl IntoResponse for UpgradeError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            message: format!("Error: {}", self),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

pub fn router<R: Runtime + 'static>(
    service: Arc<UpgradeService<R>>,
    allowed_origins: &[String],
) -> Router {
    Router::new()
        .route("/v1/package/{package}/info", get(version_info::<R>))
        .route(
            "/v1/package/{package}/updatetoversion/{version}",
            post(update_to_version::<R>),
        )
        .with_state(service)
        .layer(cors_layer(allowed_origins))
}

/// `*` admits any origin by echoing it back, which keeps credentialed
/// requests valid.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.iter().any(|origin| origin.trim() == "*") {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(allowed_origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin.trim())
                .inspect_err(|_| warn!("Ignoring invalid allowed origin '{}'", origin))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::HEAD])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
}

async fn version_info<R: Runtime + 'static>(
    State(service): State<Arc<UpgradeService<R>>>,
    Path(package): Path<String>,
) -> Result<Json<SystemResponse<VersionReport>>, UpgradeError> {
    let report = service.version_info(&package).await?;
    Ok(Json(SystemResponse {
        message: "Version data fetched".to_string(),
        data: report,
    }))
}

async fn update_to_version<R: Runtime + 'static>(
    State(service): State<Arc<UpgradeService<R>>>,
    Path((package, version)): Path<(String, String)>,
) -> Result<Json<SystemResponse<String>>, UpgradeError> {
    let confirmation = service.update_to_version(&package, &version).await?;
    Ok(Json(SystemResponse {
        message: "Package updated".to_string(),
        data: confirmation,
    }))
}
