#![forbid(unsafe_code)]

//! Fixtures shared by the unit tests: fake extractor binaries and throwaway
//! HTTP servers on loopback.

use std::{fs, net::SocketAddr, os::unix::fs::PermissionsExt, path::Path, path::PathBuf};

use axum::Router;

pub const SAMPLE_INFO: &str = r#"{
  "id": "dQw4w9WgXcQ",
  "title": "Sample Title",
  "duration": 213,
  "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg",
  "uploader": "Sample Channel",
  "description": "Sample description",
  "view_count": 42,
  "upload_date": "20091025",
  "formats": [
    {"format_id": "sb0", "acodec": "none", "vcodec": "none", "ext": "mhtml", "url": "https://media.example/sb0"},
    {"format_id": "139", "acodec": "mp4a.40.5", "vcodec": "none", "abr": 48.8, "ext": "m4a", "url": "https://media.example/139"},
    {"format_id": "251", "acodec": "opus", "vcodec": "none", "abr": 135.2, "ext": "webm", "filesize": 3437753, "url": "https://media.example/251"},
    {"format_id": "18", "acodec": "mp4a.40.2", "vcodec": "avc1.42001E", "tbr": 503.1, "ext": "mp4", "url": "https://media.example/18"}
  ]
}"#;

/// Writes an executable bash script named `name` into `dir`.
pub fn install_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let script_path = dir.join(name);
    fs::write(&script_path, format!("#!/usr/bin/env bash\nset -u\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&script_path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&script_path, perms).unwrap();
    script_path
}

/// Stand-in for the extractor binary.
pub fn install_stub(dir: &Path, body: &str) -> PathBuf {
    install_script(dir, "yt-dlp", body)
}

/// Extractor stub that records its arguments to `args.txt` and prints
/// [`SAMPLE_INFO`].
pub fn success_stub(dir: &Path) -> PathBuf {
    install_stub(
        dir,
        &format!(
            "printf '%s\\n' \"$@\" > \"$(dirname \"$0\")/args.txt\"\necho 'debug noise' >&2\ncat <<'JSON'\n{SAMPLE_INFO}\nJSON"
        ),
    )
}

/// Serves `app` on an ephemeral loopback port for the rest of the test.
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
