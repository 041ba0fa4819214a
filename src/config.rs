#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use std::{
    collections::HashMap,
    env, fs,
    net::IpAddr,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_YTDLP_BIN: &str = "yt-dlp";
pub const DEFAULT_PIP_BIN: &str = "pip";
pub const DEFAULT_POT_SERVER: &str = "http://127.0.0.1:4416";
pub const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_RELAY_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PLAYER_CLIENTS: &[&str] = &["tv_embedded", "mweb", "ios", "android", "web"];
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://jeranaias.github.io",
    "https://tanaghum.github.io",
    "https://tanaghum-worker.jmathdog.workers.dev",
    "http://localhost:8000",
    "http://localhost:8080",
    "http://localhost:3000",
    "http://127.0.0.1:8000",
    "http://127.0.0.1:8080",
];

/// Which extraction strategy serves requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    /// Spawn the extractor binary for every request.
    Process,
    /// Drive the extractor through the `youtube_dl` library API.
    Library,
}

impl ExtractorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Library => "library",
        }
    }
}

impl FromStr for ExtractorKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "process" | "subprocess" | "cli" => Ok(Self::Process),
            "library" | "embedded" | "lib" => Ok(Self::Library),
            other => bail!("unknown extractor strategy: {other} (expected process or library)"),
        }
    }
}

/// Everything the service needs at runtime. Built once in `main` and shared
/// through the Axum state.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: IpAddr,
    pub port: u16,
    pub extractor: ExtractorKind,
    pub ytdlp_bin: PathBuf,
    pub pip_bin: PathBuf,
    pub pot_server: String,
    pub player_clients: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub extract_timeout: Duration,
    pub relay_connect_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            extractor: ExtractorKind::Process,
            ytdlp_bin: PathBuf::from(DEFAULT_YTDLP_BIN),
            pip_bin: PathBuf::from(DEFAULT_PIP_BIN),
            pot_server: DEFAULT_POT_SERVER.to_string(),
            player_clients: to_owned_list(DEFAULT_PLAYER_CLIENTS),
            allowed_origins: to_owned_list(DEFAULT_ALLOWED_ORIGINS),
            extract_timeout: Duration::from_secs(DEFAULT_EXTRACT_TIMEOUT_SECS),
            relay_connect_timeout: Duration::from_secs(DEFAULT_RELAY_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Values supplied on the command line. They win over both the environment
/// and the `.env` file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub extractor: Option<String>,
    pub ytdlp_bin: Option<PathBuf>,
    pub pot_server: Option<String>,
    pub extract_timeout_secs: Option<u64>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_config(overrides: ConfigOverrides) -> Result<ServiceConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_config_with_overrides(&file_vars, env_var_string, overrides)
}

#[cfg(test)]
fn build_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<ServiceConfig> {
    build_config_with_overrides(file_vars, env_lookup, ConfigOverrides::default())
}

fn build_config_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: ConfigOverrides,
) -> Result<ServiceConfig> {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let host_raw = non_blank(overrides.host)
        .or_else(|| lookup("YTAUDIO_HOST"))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let host = host_raw
        .parse::<IpAddr>()
        .with_context(|| format!("expected a valid IPv4 or IPv6 address, got {host_raw}"))?;
    let port = overrides
        .port
        .or_else(|| lookup("PORT").and_then(|value| value.parse::<u16>().ok()))
        .unwrap_or(DEFAULT_PORT);
    let extractor = match non_blank(overrides.extractor).or_else(|| lookup("YTAUDIO_EXTRACTOR")) {
        Some(value) => value.parse()?,
        None => ExtractorKind::Process,
    };
    let ytdlp_bin = overrides
        .ytdlp_bin
        .or_else(|| lookup("YTAUDIO_YTDLP_BIN").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_YTDLP_BIN));
    let pip_bin = lookup("YTAUDIO_PIP_BIN")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PIP_BIN));
    let pot_server = non_blank(overrides.pot_server)
        .or_else(|| lookup("YTAUDIO_POT_SERVER"))
        .unwrap_or_else(|| DEFAULT_POT_SERVER.to_string())
        .trim_end_matches('/')
        .to_string();
    let player_clients = lookup("YTAUDIO_PLAYER_CLIENTS")
        .map(|value| split_list(&value))
        .filter(|list| !list.is_empty())
        .unwrap_or_else(|| to_owned_list(DEFAULT_PLAYER_CLIENTS));
    let allowed_origins = lookup("YTAUDIO_ALLOWED_ORIGINS")
        .map(|value| split_list(&value))
        .filter(|list| !list.is_empty())
        .unwrap_or_else(|| to_owned_list(DEFAULT_ALLOWED_ORIGINS));
    let extract_timeout = overrides
        .extract_timeout_secs
        .or_else(|| parse_secs(lookup("YTAUDIO_EXTRACT_TIMEOUT")))
        .unwrap_or(DEFAULT_EXTRACT_TIMEOUT_SECS);
    let relay_connect_timeout = parse_secs(lookup("YTAUDIO_RELAY_CONNECT_TIMEOUT"))
        .unwrap_or(DEFAULT_RELAY_CONNECT_TIMEOUT_SECS);

    Ok(ServiceConfig {
        host,
        port,
        extractor,
        ytdlp_bin,
        pip_bin,
        pot_server,
        player_clients,
        allowed_origins,
        extract_timeout: Duration::from_secs(extract_timeout),
        relay_connect_timeout: Duration::from_secs(relay_connect_timeout),
    })
}

fn parse_secs(value: Option<String>) -> Option<u64> {
    value
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn to_owned_list(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn env_var_string(key: &str) -> Option<String> {
    non_blank(env::var(key).ok())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| non_blank(file_vars.get(key).cloned()))
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn config_from(contents: &str) -> ServiceConfig {
        let cfg = make_config(contents);
        let vars = read_env_file(cfg.path()).unwrap();
        build_config(&vars, |_| None).unwrap()
    }

    #[test]
    fn empty_sources_use_defaults() {
        let config = build_config(&HashMap::new(), |_| None).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, "0.0.0.0".parse::<IpAddr>().unwrap());
        assert_eq!(config.extractor, ExtractorKind::Process);
        assert_eq!(config.ytdlp_bin, PathBuf::from("yt-dlp"));
        assert_eq!(config.pot_server, DEFAULT_POT_SERVER);
        assert_eq!(config.extract_timeout, Duration::from_secs(120));
        assert_eq!(config.allowed_origins.len(), DEFAULT_ALLOWED_ORIGINS.len());
        assert_eq!(
            config.player_clients,
            vec!["tv_embedded", "mweb", "ios", "android", "web"]
        );
    }

    #[test]
    fn env_file_values_are_applied() {
        let config = config_from(
            "PORT=\"8081\"\nYTAUDIO_EXTRACTOR=library\nYTAUDIO_POT_SERVER=\"http://pot:4416/\"\n",
        );
        assert_eq!(config.port, 8081);
        assert_eq!(config.extractor, ExtractorKind::Library);
        assert_eq!(config.pot_server, "http://pot:4416");
    }

    #[test]
    fn origin_and_client_lists_are_split_and_trimmed() {
        let config = config_from(
            "YTAUDIO_ALLOWED_ORIGINS=\"https://a.example, https://b.example ,\"\nYTAUDIO_PLAYER_CLIENTS=web,ios\n",
        );
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.player_clients, vec!["web", "ios"]);
    }

    #[test]
    fn env_wins_over_file() {
        let vars = read_env_file(make_config("PORT=\"7000\"\n").path()).unwrap();
        let config = build_config(&vars, |key| (key == "PORT").then(|| "7100".to_string())).unwrap();
        assert_eq!(config.port, 7100);
    }

    #[test]
    fn overrides_win_over_env_and_file() {
        let mut vars = HashMap::new();
        vars.insert("PORT".to_string(), "7000".to_string());
        vars.insert("YTAUDIO_HOST".to_string(), "127.0.0.1".to_string());
        vars.insert("YTAUDIO_EXTRACT_TIMEOUT".to_string(), "60".to_string());

        let config = build_config_with_overrides(
            &vars,
            |key| (key == "YTAUDIO_EXTRACTOR").then(|| "library".to_string()),
            ConfigOverrides {
                host: Some("::1".into()),
                port: Some(9000),
                extractor: Some("process".into()),
                ytdlp_bin: Some(PathBuf::from("/opt/yt-dlp")),
                extract_timeout_secs: Some(5),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();

        assert_eq!(config.host, "::1".parse::<IpAddr>().unwrap());
        assert_eq!(config.port, 9000);
        assert_eq!(config.extractor, ExtractorKind::Process);
        assert_eq!(config.ytdlp_bin, PathBuf::from("/opt/yt-dlp"));
        assert_eq!(config.extract_timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = config_from("PORT=nope\nYTAUDIO_EXTRACT_TIMEOUT=0\n");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.extract_timeout, Duration::from_secs(120));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let vars = read_env_file(make_config("YTAUDIO_EXTRACTOR=carrier-pigeon\n").path()).unwrap();
        let err = build_config(&vars, |_| None).unwrap_err();
        assert!(err.to_string().contains("unknown extractor strategy"));
    }

    #[test]
    fn invalid_host_is_rejected() {
        let err = build_config_with_overrides(
            &HashMap::new(),
            |_| None,
            ConfigOverrides {
                host: Some("not-an-ip".into()),
                ..ConfigOverrides::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("valid IPv4 or IPv6"));
    }

    #[test]
    fn blank_override_host_is_ignored() {
        let config = build_config_with_overrides(
            &HashMap::new(),
            |_| None,
            ConfigOverrides {
                host: Some("   ".into()),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.host, "0.0.0.0".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn read_env_file_handles_export_and_quotes() {
        let cfg = make_config(
            r#"
            export PORT="9090"
            YTAUDIO_HOST='127.0.0.1'
            YTAUDIO_YTDLP_BIN =  "/usr/local/bin/yt-dlp"
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(cfg.path()).unwrap();
        assert_eq!(vars.get("PORT").unwrap(), "9090");
        assert_eq!(vars.get("YTAUDIO_HOST").unwrap(), "127.0.0.1");
        assert_eq!(vars.get("YTAUDIO_YTDLP_BIN").unwrap(), "/usr/local/bin/yt-dlp");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn read_env_file_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join("missing.env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn strategy_names_parse() {
        assert_eq!("Process".parse::<ExtractorKind>().unwrap(), ExtractorKind::Process);
        assert_eq!("embedded".parse::<ExtractorKind>().unwrap(), ExtractorKind::Library);
        assert_eq!(ExtractorKind::Library.as_str(), "library");
    }
}
