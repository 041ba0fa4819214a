#![forbid(unsafe_code)]

use std::{path::PathBuf, process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::{process::Command, time::timeout};
use tracing::{debug, info, warn};

use super::{ExtractError, Extractor, truncate_chars};
use crate::config::ServiceConfig;
use crate::formats::ExtractionResult;

const AUDIO_FORMAT: &str = "bestaudio/best";
const STDERR_LOG_LIMIT: usize = 2000;
const STDOUT_ERROR_LIMIT: usize = 500;

/// Runs the extractor binary once per request and parses its `--dump-json`
/// output.
#[derive(Debug, Clone)]
pub struct YtDlpProcess {
    binary: PathBuf,
    player_clients: Vec<String>,
    pot_server: String,
    timeout: Duration,
}

impl YtDlpProcess {
    pub fn new(
        binary: PathBuf,
        player_clients: Vec<String>,
        pot_server: String,
        timeout: Duration,
    ) -> Self {
        Self {
            binary,
            player_clients,
            pot_server,
            timeout,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.ytdlp_bin.clone(),
            config.player_clients.clone(),
            config.pot_server.clone(),
            config.extract_timeout,
        )
    }

    /// Player clients are tried in order; the provider plugin hands out
    /// proof-of-origin tokens for the clients that need one.
    pub fn command_args(&self, url: &str) -> Vec<String> {
        vec![
            "--dump-json".to_string(),
            "-f".to_string(),
            AUDIO_FORMAT.to_string(),
            "--verbose".to_string(),
            "--extractor-args".to_string(),
            format!("youtube:player_client={}", self.player_clients.join(",")),
            "--extractor-args".to_string(),
            format!("youtubepot-bgutilhttp:base_url={}", self.pot_server),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl Extractor for YtDlpProcess {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn extract(&self, url: &str) -> Result<ExtractionResult, ExtractError> {
        let args = self.command_args(url);
        info!(
            command = %format!("{} {}", self.binary.display(), args.join(" ")),
            "running extractor"
        );

        let mut command = Command::new(&self.binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!(binary = %self.binary.display(), error = %err, "failed to launch extractor");
                return Err(ExtractError::Failed(format!(
                    "failed to run {}: {err}",
                    self.binary.display()
                )));
            }
            Err(_) => {
                warn!(url, timeout_secs = self.timeout.as_secs(), "extractor timed out");
                return Err(ExtractError::Timeout);
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            debug!(stderr = truncate_chars(&stderr, STDERR_LOG_LIMIT), "extractor stderr");
        }

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let message = if !stderr.is_empty() {
                &*stderr
            } else if !stdout.is_empty() {
                &*stdout
            } else {
                "Unknown error"
            };
            warn!(
                url,
                status = %output.status,
                stderr = truncate_chars(message, STDERR_LOG_LIMIT),
                "extractor failed"
            );
            return Err(ExtractError::classify(message));
        }

        parse_output(&output.stdout)
    }
}

pub(crate) fn parse_output(stdout: &[u8]) -> Result<ExtractionResult, ExtractError> {
    serde_json::from_slice(stdout).map_err(|err| {
        let text = String::from_utf8_lossy(stdout);
        let preview = if text.is_empty() {
            "empty"
        } else {
            truncate_chars(&text, STDOUT_ERROR_LIMIT)
        };
        ExtractError::Parse(format!(
            "Failed to parse yt-dlp output: {err}. stdout: {preview}"
        ))
    })
}
