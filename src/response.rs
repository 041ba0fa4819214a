#![forbid(unsafe_code)]

//! JSON bodies returned by the HTTP layer. Keys are camelCase and `null`
//! values are kept so clients always see the same shape.

use serde::Serialize;
use serde_json::Number;

use crate::extractor::ExtractError;
use crate::formats::{ExtractionResult, FormatRecord};

pub const DESCRIPTION_LIMIT: usize = 500;
const DEFAULT_AUDIO_EXT: &str = "webm";

/// Requested `/extract` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Url,
    Info,
}

impl OutputMode {
    /// Anything other than `info` means the default URL shape.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("info") => Self::Info,
            _ => Self::Url,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioUrlResponse {
    pub video_id: Option<String>,
    pub available: bool,
    pub audio_url: Option<String>,
    pub mime_type: String,
    pub duration: Option<Number>,
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInfoResponse {
    pub video_id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<Number>,
    pub thumbnail: Option<String>,
    pub audio_url: Option<String>,
    pub mime_type: Option<String>,
    pub bitrate: Option<Number>,
    pub filesize: Option<Number>,
    pub available: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AudioResponse {
    Url(AudioUrlResponse),
    Info(AudioInfoResponse),
}

/// `/info` body. Never carries an audio URL.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadataResponse {
    pub video_id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<Number>,
    pub thumbnail: Option<String>,
    pub channel: Option<String>,
    pub description: String,
    pub view_count: Option<Number>,
    pub upload_date: Option<String>,
}

/// `/extract` failure body.
#[derive(Debug, Serialize)]
pub struct ExtractFailure {
    pub error: String,
    pub available: bool,
    pub suggestion: Option<&'static str>,
    pub blocked: bool,
}

impl From<&ExtractError> for ExtractFailure {
    fn from(err: &ExtractError) -> Self {
        Self {
            error: err.public_message(),
            available: false,
            suggestion: err.suggestion(),
            blocked: err.is_blocked(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub extractor: &'static str,
    pub pot_server: String,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

/// Either the HTTP status of the provider's ping or the reason it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProbeStatus {
    Code(u16),
    Error(String),
}

#[derive(Debug, Serialize)]
pub struct DebugReport {
    pub ytdlp_version: String,
    pub bgutil_installed: bool,
    pub pot_server_url: String,
    pub pot_server_status: ProbeStatus,
}

/// Builds the `/extract` body for the chosen output mode.
pub fn shape_audio(
    info: &ExtractionResult,
    format: &FormatRecord,
    mode: OutputMode,
) -> AudioResponse {
    match mode {
        OutputMode::Url => AudioResponse::Url(AudioUrlResponse {
            video_id: info.id.clone(),
            available: true,
            audio_url: format.url.clone(),
            mime_type: format!(
                "audio/{}",
                format.ext.as_deref().unwrap_or(DEFAULT_AUDIO_EXT)
            ),
            duration: info.duration.clone(),
            title: info.title.clone(),
        }),
        OutputMode::Info => AudioResponse::Info(AudioInfoResponse {
            video_id: info.id.clone(),
            title: info.title.clone(),
            duration: info.duration.clone(),
            thumbnail: info.thumbnail.clone(),
            audio_url: format.url.clone(),
            mime_type: format.ext.clone(),
            bitrate: format.reported_bitrate().cloned(),
            filesize: format.filesize.clone(),
            available: true,
        }),
    }
}

pub fn shape_metadata(info: &ExtractionResult) -> VideoMetadataResponse {
    VideoMetadataResponse {
        video_id: info.id.clone(),
        title: info.title.clone(),
        duration: info.duration.clone(),
        thumbnail: info.thumbnail.clone(),
        channel: info.uploader.clone(),
        description: info
            .description
            .as_deref()
            .map(|text| text.chars().take(DESCRIPTION_LIMIT).collect())
            .unwrap_or_default(),
        view_count: info.view_count.clone(),
        upload_date: info.upload_date.clone(),
    }
}
