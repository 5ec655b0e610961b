use std::fs;
use std::io::Read;
use std::path::Path;

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::{LauncherError, Result};
use crate::updater::{METADATA_TIMEOUT, USER_AGENT};

/// Downloads release artifacts and checks them against their detached checksum.
#[derive(Clone)]
pub struct NetworkClient {
    metadata: Client,
    transfer: Client,
}

impl NetworkClient {
    pub fn new() -> Self {
        let metadata = Client::builder()
            .timeout(METADATA_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|err| {
                warn!("fetch: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        // No overall timeout: large archives must be allowed to take as long as they need.
        let transfer = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|err| {
                warn!("fetch: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self { metadata, transfer }
    }

    /// Fetch a small text document such as a checksum file.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        debug!("fetch: GET {url}");
        self.metadata
            .get(url)
            .send()
            .await
            .map_err(|e| LauncherError::DownloadFailed(format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| LauncherError::DownloadFailed(format!("status error: {e}")))?
            .text()
            .await
            .map_err(|e| LauncherError::DownloadFailed(format!("body error: {e}")))
    }

    /// Stream `url` into `dest`, drawing a progress bar on stderr.
    pub async fn download_to_path(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("fetch: downloading {} to {}", url, dest.display());
        let response = self
            .transfer
            .get(url)
            .send()
            .await
            .map_err(|e| LauncherError::DownloadFailed(format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| LauncherError::DownloadFailed(format!("status error: {e}")))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                LauncherError::DownloadFailed(format!("failed to create download dir: {e}"))
            })?;
        }
        let mut file = File::create(dest)
            .await
            .map_err(|e| LauncherError::DownloadFailed(format!("failed to create file: {e}")))?;

        let total = response.content_length();
        let bar = progress_bar(total);
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| LauncherError::DownloadFailed(format!("stream error: {e}")))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| LauncherError::DownloadFailed(format!("write error: {e}")))?;
            downloaded += chunk.len() as u64;
            bar.set_position(downloaded);
        }
        bar.finish_and_clear();

        file.flush()
            .await
            .map_err(|e| LauncherError::DownloadFailed(format!("flush error: {e}")))?;

        if let Some(total) = total
            && downloaded < total
        {
            return Err(LauncherError::DownloadFailed(format!(
                "download incomplete: received {downloaded} of {total} bytes"
            )));
        }

        debug!("fetch: wrote {downloaded} bytes");
        Ok(downloaded)
    }
}

fn progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::with_template(
                "{bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            ) {
                bar.set_style(style);
            }
            bar
        }
        None => ProgressBar::new_spinner(),
    }
}

/// The expected digest is the first whitespace-delimited token of a checksum file.
pub fn parse_checksum(contents: &str) -> Result<String> {
    contents
        .split_whitespace()
        .next()
        .map(str::to_owned)
        .ok_or_else(|| LauncherError::IntegrityViolation("checksum file is empty".into()))
}

/// Hex SHA-256 of the file at `path`.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .map_err(|e| LauncherError::FilesystemFailure(format!("checksum open error: {e}")))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file
            .read(&mut buf)
            .map_err(|e| LauncherError::FilesystemFailure(format!("checksum read error: {e}")))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Compare the file's digest to `expected`, ignoring case.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    let expected = expected.trim();
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(LauncherError::IntegrityViolation(format!(
            "sha256 mismatch: got {actual} expected {expected}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // sha256("hello world")
    const HELLO_SHA: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn parses_first_token_of_checksum_file() {
        assert_eq!(
            parse_checksum(&format!("{HELLO_SHA}  project-v2.zip\n")).unwrap(),
            HELLO_SHA
        );
        assert_eq!(parse_checksum("  ABCDEF\n").unwrap(), "ABCDEF");
        assert!(matches!(
            parse_checksum(" \n\t"),
            Err(LauncherError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn verifies_digest_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("payload.zip");
        fs::write(&file, b"hello world").unwrap();

        verify_sha256(&file, HELLO_SHA).unwrap();
        verify_sha256(&file, &HELLO_SHA.to_uppercase()).unwrap();

        let err = verify_sha256(&file, &"0".repeat(64)).unwrap_err();
        assert!(matches!(err, LauncherError::IntegrityViolation(_)));
    }

    #[tokio::test]
    async fn downloads_artifact_to_disk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/project-v2.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("project-v2.zip");
        let written = NetworkClient::new()
            .download_to_path(&format!("{}/project-v2.zip", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(written, 11);
        assert_eq!(sha256_file(&dest).unwrap(), HELLO_SHA);
    }

    #[tokio::test]
    async fn failed_download_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = NetworkClient::new();
        let err = client
            .download_to_path(&format!("{}/x.zip", server.uri()), &dir.path().join("x.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::DownloadFailed(_)));

        let err = client
            .fetch_text(&format!("{}/x.zip.sha256", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::DownloadFailed(_)));
    }
}
