#![forbid(unsafe_code)]

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{info, warn};
use youtube_dl::{Error as LibraryError, YoutubeDl};

use super::{ExtractError, Extractor};
use crate::config::ServiceConfig;
use crate::formats::ExtractionResult;

const AUDIO_FORMAT: &str = "bestaudio/best";
/// Head start for the crate's own deadline, which kills the child, before
/// the outer one drops the call.
const KILL_GRACE: Duration = Duration::from_secs(1);

/// Extraction through the `youtube_dl` crate's builder API. The crate runs
/// quietly in JSON mode, so only the format selector and deadlines are set.
///
/// The crate owns the child process. Its own deadline only starts once the
/// child closes stdout, and it kills the child when that deadline passes.
/// yt-dlp's socket timeout bounds network stalls before that point. A child
/// that is still writing when the outer deadline fires cannot be reached
/// from here and is left to finish.
#[derive(Debug, Clone)]
pub struct YtDlpLibrary {
    binary: PathBuf,
    timeout: Duration,
}

impl YtDlpLibrary {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.ytdlp_bin.clone(), config.extract_timeout)
    }

    fn library_error(&self, err: LibraryError) -> ExtractError {
        match err {
            LibraryError::ExitCode { stderr, .. } if stderr.trim().is_empty() => {
                ExtractError::classify("Unknown error")
            }
            LibraryError::ExitCode { stderr, .. } => ExtractError::classify(&stderr),
            LibraryError::Json(err) => {
                ExtractError::Parse(format!("Failed to parse yt-dlp output: {err}"))
            }
            LibraryError::ProcessTimeout => ExtractError::Timeout,
            LibraryError::Io(err) => {
                ExtractError::Failed(format!("failed to run {}: {err}", self.binary.display()))
            }
            #[allow(unreachable_patterns)]
            other => ExtractError::Failed(other.to_string()),
        }
    }
}

#[async_trait]
impl Extractor for YtDlpLibrary {
    fn name(&self) -> &'static str {
        "library"
    }

    async fn extract(&self, url: &str) -> Result<ExtractionResult, ExtractError> {
        info!(url, binary = %self.binary.display(), "extracting through library");

        let mut request = YoutubeDl::new(url);
        request
            .youtube_dl_path(&self.binary)
            .format(AUDIO_FORMAT)
            .socket_timeout(self.timeout.as_secs().max(1).to_string())
            .process_timeout(self.timeout);

        let output = match timeout(self.timeout + KILL_GRACE, request.run_async()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!(url, error = %err, "library extraction failed");
                return Err(self.library_error(err));
            }
            Err(_) => {
                warn!(url, timeout_secs = self.timeout.as_secs(), "library extraction timed out");
                return Err(ExtractError::Timeout);
            }
        };

        let video = output
            .into_single_video()
            .ok_or_else(|| ExtractError::Unavailable("Could not extract video info".to_string()))?;

        // Re-read the crate's model through our own so both strategies share
        // one set of selection and shaping rules.
        let value = serde_json::to_value(&video)
            .map_err(|err| ExtractError::Parse(format!("Failed to read library output: {err}")))?;
        serde_json::from_value(value)
            .map_err(|err| ExtractError::Parse(format!("Failed to read library output: {err}")))
    }
}
