#![forbid(unsafe_code)]

use std::{path::Path, time::Duration};

use reqwest::Client;
use tokio::process::Command;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::response::{DebugReport, ProbeStatus};

const PROVIDER_PACKAGE: &str = "bgutil-ytdlp-pot-provider";
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const NOT_FOUND: &str = "Not found";

/// Checks the extractor binary, the token-provider plugin and the provider
/// service concurrently.
pub async fn collect_debug_report(config: &ServiceConfig, client: &Client) -> DebugReport {
    let (ytdlp_version, bgutil_installed, pot_server_status) = tokio::join!(
        extractor_version(&config.ytdlp_bin),
        provider_plugin_installed(&config.pip_bin),
        probe_pot_server(client, &config.pot_server),
    );
    DebugReport {
        ytdlp_version,
        bgutil_installed,
        pot_server_url: config.pot_server.clone(),
        pot_server_status,
    }
}

async fn extractor_version(binary: &Path) -> String {
    match Command::new(binary).arg("--version").output().await {
        Ok(output) => String::from_utf8_lossy(&output.stdout).trim().to_string(),
        Err(err) => {
            debug!(binary = %binary.display(), error = %err, "extractor version check failed");
            NOT_FOUND.to_string()
        }
    }
}

async fn provider_plugin_installed(pip: &Path) -> bool {
    match Command::new(pip).arg("list").output().await {
        Ok(output) => String::from_utf8_lossy(&output.stdout).contains(PROVIDER_PACKAGE),
        Err(err) => {
            debug!(pip = %pip.display(), error = %err, "package listing failed");
            false
        }
    }
}

async fn probe_pot_server(client: &Client, base_url: &str) -> ProbeStatus {
    match client
        .get(format!("{base_url}/ping"))
        .timeout(PROBE_TIMEOUT)
        .send()
        .await
    {
        Ok(response) => ProbeStatus::Code(response.status().as_u16()),
        Err(err) => ProbeStatus::Error(format!("Error: {err}")),
    }
}
