#![forbid(unsafe_code)]

//! Axum routes. Every request runs normalize → extract → select → shape in a
//! single pass; nothing is shared between requests except configuration and
//! the outbound HTTP client.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, Request, State, rejection::QueryRejection},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::Value;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::{ExtractorKind, ServiceConfig};
use crate::diagnostics::collect_debug_report;
use crate::extractor::{ExtractError, Extractor, build_extractor};
use crate::formats::{ExtractionResult, FormatRecord, select_best_audio};
use crate::normalize::normalize_video_url;
use crate::relay::{build_http_client, relay_audio};
use crate::response::{
    DebugReport, ExtractFailure, HealthStatus, OutputMode, ServiceStatus,
    VideoMetadataResponse, shape_audio, shape_metadata,
};

const MISSING_URL: &str = "Missing url parameter";
const FALLBACK_FILENAME: &str = "audio";

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub extractor: Arc<dyn Extractor>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let http = build_http_client(&config).context("building outbound HTTP client")?;
        let extractor = build_extractor(&config);
        Ok(Self {
            config: Arc::new(config),
            extractor,
            http,
        })
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }
}

/// `/download` and `/info` report extraction failures as server errors,
/// except for a video that simply has no audio.
impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        let status = match err {
            ExtractError::NoAudio => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// `/extract` failures carry availability hints next to the message.
impl IntoResponse for ExtractError {
    fn into_response(self) -> Response {
        (self.status(), Json(ExtractFailure::from(&self))).into_response()
    }
}

/// Raw query pairs. Repeated keys are allowed; the first occurrence wins.
type QueryPairs = Result<Query<Vec<(String, String)>>, QueryRejection>;

#[derive(Debug, Default)]
struct VideoParams {
    url: Option<String>,
    format: Option<String>,
}

impl VideoParams {
    fn from_query(query: QueryPairs) -> ApiResult<Self> {
        let Query(pairs) = query.map_err(|rejection| {
            ApiError::bad_request(format!("Invalid query string: {}", rejection.body_text()))
        })?;
        let first = |key: &str| {
            pairs
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
        };
        Ok(Self {
            url: first("url"),
            format: first("format"),
        })
    }

    /// Each field is read on its own, so a bad `format` never hides a good
    /// `url`. Non-string values count as absent.
    fn from_json(body: &[u8]) -> Self {
        let value = serde_json::from_slice::<Value>(body).unwrap_or_default();
        let field = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            url: field("url"),
            format: field("format"),
        }
    }

    fn video(&self) -> ApiResult<&str> {
        self.url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ApiError::bad_request(MISSING_URL))
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(service_status))
        .route("/health", get(health))
        .route("/extract", get(extract_audio).post(extract_audio))
        .route("/download", get(download_audio))
        .route("/info", get(video_info));
    // Only the subprocess strategy has a binary and plugin worth inspecting.
    if state.config.extractor == ExtractorKind::Process {
        app = app.route("/debug", get(debug_info));
    }

    let cors = cors_layer(&state.config.allowed_origins);
    app.fallback(fallback)
        .layer(cors)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            reject_foreign_origin,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins = origins.iter().filter_map(|origin| {
        HeaderValue::from_str(origin)
            .inspect_err(|_| warn!(origin = %origin, "skipping unparsable CORS origin"))
            .ok()
    });
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Browsers send `Origin` on cross-site requests; anything outside the
/// allow-list is refused before it reaches a handler. Requests without the
/// header (curl, server-to-server) pass.
async fn reject_foreign_origin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(origin) = request.headers().get(header::ORIGIN)
        && !origin_allowed(&state.config.allowed_origins, origin)
    {
        warn!(origin = ?origin, "rejecting request from unlisted origin");
        return ApiError::forbidden("origin not allowed").into_response();
    }
    next.run(request).await
}

fn origin_allowed(allowed: &[String], origin: &HeaderValue) -> bool {
    allowed
        .iter()
        .any(|candidate| candidate.as_bytes() == origin.as_bytes())
}

async fn fallback() -> ApiError {
    ApiError::not_found("endpoint not found")
}

async fn service_status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        extractor: state.extractor.name(),
        pot_server: state.config.pot_server.clone(),
    })
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus { status: "healthy" })
}

/// GET reads the query string, POST reads a JSON body. A POST body that is
/// missing or not JSON is treated like an empty object.
async fn extract_audio(
    State(state): State<AppState>,
    method: Method,
    query: QueryPairs,
    body: Bytes,
) -> Response {
    let params = if method == Method::POST {
        VideoParams::from_json(&body)
    } else {
        match VideoParams::from_query(query) {
            Ok(params) => params,
            Err(err) => return err.into_response(),
        }
    };
    let video = match params.video() {
        Ok(video) => video,
        Err(err) => return err.into_response(),
    };
    let mode = OutputMode::parse(params.format.as_deref());

    match extract_with_audio(state.extractor.as_ref(), video).await {
        Ok((info, best)) => Json(shape_audio(&info, &best, mode)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn download_audio(
    State(state): State<AppState>,
    query: QueryPairs,
) -> ApiResult<Response> {
    let params = VideoParams::from_query(query)?;
    let video = params.video()?;
    let (info, best) = extract_with_audio(state.extractor.as_ref(), video).await?;
    let filename = info.id.as_deref().unwrap_or(FALLBACK_FILENAME);
    relay_audio(&state.http, &best, filename)
        .await
        .map_err(|err| {
            warn!(video, error = %err, "audio relay failed");
            ApiError::bad_gateway(err.to_string())
        })
}

async fn video_info(
    State(state): State<AppState>,
    query: QueryPairs,
) -> ApiResult<Json<VideoMetadataResponse>> {
    let params = VideoParams::from_query(query)?;
    let url = normalize_video_url(params.video()?);
    let info = state.extractor.extract(&url).await.inspect_err(|err| {
        warn!(url = %url, kind = err.kind(), error = %err, "metadata extraction failed");
    })?;
    Ok(Json(shape_metadata(&info)))
}

async fn debug_info(State(state): State<AppState>) -> Json<DebugReport> {
    Json(collect_debug_report(&state.config, &state.http).await)
}

/// Runs the extractor for `video` and picks its best audio format.
async fn extract_with_audio(
    extractor: &dyn Extractor,
    video: &str,
) -> Result<(ExtractionResult, FormatRecord), ExtractError> {
    let url = normalize_video_url(video);
    let info = extractor.extract(&url).await.inspect_err(|err| {
        warn!(url = %url, kind = err.kind(), error = %err, "extraction failed");
    })?;
    let best = select_best_audio(&info.formats)
        .inspect_err(|_| warn!(url = %url, "no audio formats available"))?
        .clone();
    info!(
        url = %url,
        format_id = best.format_id.as_deref().unwrap_or("?"),
        "selected audio format"
    );
    Ok((info, best))
}
