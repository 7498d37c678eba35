#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[allow(dead_code)]
pub const CMD_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a `folio` command isolated from the user's config and data.
#[allow(dead_code)]
pub fn folio_cmd(config: &Path, data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("folio"));
    cmd.timeout(CMD_TIMEOUT);
    cmd.env("FOLIO_CONFIG", config);
    cmd.env("FOLIO_DATA_DIR", data_dir);
    cmd.env_remove("FOLIO_ORIGIN");
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Write a config for a small document served by `origin`.
#[allow(dead_code)]
pub fn write_config(dir: &Path, origin: &str, total_pages: usize, extra: &str) -> PathBuf {
    let path = dir.join("config.toml");
    let content = format!(
        r#"[source]
origin = "{origin}"
timeout_secs = 5

[prefetch]
pause_ms = 0

[document]
total_pages = {total_pages}
chapters = [
    {{ title = "Cover", page = 1 }},
    {{ title = "Letters", page = 5 }},
    {{ title = "Writing rules", page = 9 }},
]

{extra}
"#
    );
    std::fs::write(&path, content).expect("write test config");
    path
}

/// Bytes served for a 1-based page number.
#[allow(dead_code)]
pub fn scan_bytes(page: usize) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend(format!("scan-{page}").into_bytes());
    bytes
}

/// Serve every `/scan/<n>.jpg` with [`scan_bytes`].
#[allow(dead_code)]
pub async fn serve_scans() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/scan/\d+\.jpg$"))
        .respond_with(|request: &Request| {
            let page: usize = request
                .url
                .path()
                .trim_start_matches("/scan/")
                .trim_end_matches(".jpg")
                .parse()
                .unwrap();
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(scan_bytes(page))
        })
        .mount(&server)
        .await;
    server
}

/// Parse a command's stdout as JSON.
#[allow(dead_code)]
pub fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON")
}
