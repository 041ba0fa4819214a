#![forbid(unsafe_code)]

//! Pass-through of the selected audio stream for clients that cannot fetch
//! the media origin themselves (CORS, signed URLs bound to our IP).

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::formats::FormatRecord;

const DEFAULT_CONTENT_TYPE: &str = "audio/webm";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("selected format has no media URL")]
    MissingUrl,
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

/// Shared outbound client. Only connecting is bounded; the transfer itself
/// runs for as long as the caller keeps reading.
pub fn build_http_client(config: &ServiceConfig) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(config.relay_connect_timeout)
        .build()
}

/// Fetches the format's media URL and streams the body back unmodified as an
/// attachment named `<video_id>.webm`.
pub async fn relay_audio(
    client: &Client,
    format: &FormatRecord,
    video_id: &str,
) -> Result<Response, RelayError> {
    let url = format.url.as_deref().ok_or(RelayError::MissingUrl)?;

    let mut request = client.get(url);
    for (name, value) in &format.http_headers {
        request = request.header(name.as_str(), value.as_str());
    }
    let upstream = request.send().await?;

    let status = upstream.status();
    if status.is_success() {
        info!(video_id, %status, "relaying audio stream");
    } else {
        warn!(video_id, %status, "media origin answered with an error status; relaying anyway");
    }

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    let disposition = HeaderValue::try_from(format!("attachment; filename=\"{video_id}.webm\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"audio.webm\""));

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type);
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}
