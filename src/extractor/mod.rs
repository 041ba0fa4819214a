#![forbid(unsafe_code)]

//! Extraction adapter. Both strategies hand back the same
//! [`ExtractionResult`] and classify failures with the same heuristics, so
//! the HTTP layer never needs to know which one is configured.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use thiserror::Error;

use crate::config::{ExtractorKind, ServiceConfig};
use crate::formats::ExtractionResult;

pub mod library;
pub mod process;

pub use library::YtDlpLibrary;
pub use process::YtDlpProcess;

/// Shown to callers when the platform demands a signed-in session.
pub const BLOCKED_SUGGESTION: &str = "This video requires authentication. Try using YouTube captions instead, or upload audio directly for Whisper transcription.";
pub const BLOCKED_MESSAGE: &str =
    "Audio extraction blocked by YouTube. Use captions or Whisper transcription.";
const PROVIDER_PREFIX: &str = "POT provider issue: ";

/// Resolves a canonical video URL into the extractor's metadata.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short label used in logs and the status endpoint.
    fn name(&self) -> &'static str;

    async fn extract(&self, url: &str) -> Result<ExtractionResult, ExtractError>;
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Private(String),
    #[error("{0}")]
    Blocked(String),
    #[error("{0}")]
    Provider(String),
    #[error("Request timed out")]
    Timeout,
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    Failed(String),
    #[error("No audio formats available")]
    NoAudio,
}

impl ExtractError {
    /// Maps raw extractor error text onto a failure kind.
    ///
    /// Token-provider errors keep their kind if another rule matches first,
    /// but the message is always prefixed so operators can spot them.
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        let provider = lower.contains("pot") || lower.contains("provider");
        let message = if provider {
            format!("{PROVIDER_PREFIX}{raw}")
        } else {
            raw.to_string()
        };

        if raw.contains("Video unavailable") {
            Self::Unavailable(message)
        } else if raw.contains("Private video") {
            Self::Private(message)
        } else if mentions_bot_check(raw) {
            Self::Blocked(message)
        } else if provider {
            Self::Provider(message)
        } else {
            Self::Failed(message)
        }
    }

    /// Status used by `/extract`.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unavailable(_) | Self::NoAudio => StatusCode::NOT_FOUND,
            Self::Private(_) | Self::Blocked(_) => StatusCode::FORBIDDEN,
            Self::Provider(_) | Self::Timeout | Self::Parse(_) | Self::Failed(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "not-found",
            Self::Private(_) | Self::Blocked(_) => "forbidden",
            Self::Provider(_) => "provider-error",
            Self::Timeout => "timeout",
            Self::Parse(_) => "parse-error",
            Self::Failed(_) => "upstream-generic",
            Self::NoAudio => "no-audio",
        }
    }

    /// Whether the extractor reported a bot check or login wall. This looks
    /// at the text, not the kind: an unavailable video whose log also
    /// mentions the bot check keeps its 404 but is still flagged.
    pub fn is_blocked(&self) -> bool {
        match self {
            Self::Blocked(_) => true,
            Self::Unavailable(message) | Self::Private(message) => mentions_bot_check(message),
            _ => false,
        }
    }

    /// Only failures classified as blocked carry the suggestion.
    pub fn suggestion(&self) -> Option<&'static str> {
        matches!(self, Self::Blocked(_)).then_some(BLOCKED_SUGGESTION)
    }

    /// Caller-facing error text. Blocked videos get a fixed explanation
    /// instead of the extractor's log output.
    pub fn public_message(&self) -> String {
        if matches!(self, Self::Blocked(_)) {
            BLOCKED_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

fn mentions_bot_check(text: &str) -> bool {
    text.contains("LOGIN_REQUIRED") || text.to_lowercase().contains("not a bot")
}

/// Builds the strategy selected in the configuration.
pub fn build_extractor(config: &ServiceConfig) -> Arc<dyn Extractor> {
    match config.extractor {
        ExtractorKind::Process => Arc::new(YtDlpProcess::from_config(config)),
        ExtractorKind::Library => Arc::new(YtDlpLibrary::from_config(config)),
    }
}

/// First `max` characters of `text`, never splitting a code point.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
