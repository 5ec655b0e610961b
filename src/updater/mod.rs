use std::time::Duration;

use log::{debug, info, warn};
use reqwest::Client;

use crate::config::LauncherConfig;
use crate::engine::models::{Asset, Release};
use crate::error::{LauncherError, Result};

/// Metadata requests fail fast; artifact transfers use their own unbounded client.
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(60);
pub const USER_AGENT: &str = concat!("moodinho-launcher/", env!("CARGO_PKG_VERSION"));

/// Looks up the latest release of the payload on the registry.
#[derive(Clone)]
pub struct ReleaseResolver {
    client: Client,
}

impl ReleaseResolver {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(METADATA_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|err| {
                warn!("resolve: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self { client }
    }

    /// Fetch and parse the latest release record.
    ///
    /// # Errors
    /// `RegistryUnavailable` on transport failure or a non-2xx status,
    /// `MalformedManifest` when the body is not a release record.
    pub async fn latest(&self, config: &LauncherConfig) -> Result<Release> {
        let url = config.latest_release_url();
        info!("resolve: checking releases for {}/{}", config.owner, config.repo);
        debug!("resolve: GET {url}");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| LauncherError::RegistryUnavailable(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(LauncherError::RegistryUnavailable(format!(
                "http status {} for {url}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LauncherError::RegistryUnavailable(format!("body error: {e}")))?;
        let release = parse_release(&body)?;
        info!("resolve: found release {}", release.tag_name);
        Ok(release)
    }
}

/// Parse a release record, rejecting ones without a usable tag.
pub fn parse_release(body: &str) -> Result<Release> {
    let release: Release = serde_json::from_str(body)
        .map_err(|e| LauncherError::MalformedManifest(e.to_string()))?;
    if release.tag_name.trim().is_empty() {
        return Err(LauncherError::MalformedManifest(
            "release has an empty tag_name".into(),
        ));
    }
    Ok(release)
}

impl Release {
    /// First asset, in registry order, whose name starts with `prefix`.
    pub fn select_payload(&self, prefix: &str) -> Result<&Asset> {
        self.assets
            .iter()
            .find(|asset| asset.name.starts_with(prefix))
            .ok_or_else(|| LauncherError::NoMatchingAsset(prefix.to_owned()))
    }

    /// Detached checksum published alongside `payload` as `<name>.sha256`.
    pub fn checksum_for(&self, payload: &Asset) -> Option<&Asset> {
        let wanted = format!("{}.sha256", payload.name);
        self.assets.iter().find(|asset| asset.name == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cli;
    use clap::Parser;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RELEASE_JSON: &str = r#"{
        "tag_name": "v2.0.0",
        "name": "Second release",
        "assets": [
            {"name": "notes.txt", "browser_download_url": "https://example.invalid/notes.txt"},
            {"name": "project-v2.zip", "browser_download_url": "https://example.invalid/project-v2.zip"},
            {"name": "project-v2.zip.sha256", "browser_download_url": "https://example.invalid/project-v2.zip.sha256"},
            {"name": "project-v2-alt.zip", "browser_download_url": "https://example.invalid/alt.zip"}
        ]
    }"#;

    fn config_for(server: &MockServer) -> LauncherConfig {
        let uri = server.uri();
        let cli = Cli::parse_from([
            "moodinho-launcher",
            "--owner",
            "acme",
            "--repo",
            "app",
            "--api-base",
            uri.as_str(),
        ]);
        LauncherConfig::from_cli(&cli).unwrap()
    }

    #[test]
    fn selects_first_matching_asset_and_its_checksum() {
        let release = parse_release(RELEASE_JSON).unwrap();
        let payload = release.select_payload("project-").unwrap();
        assert_eq!(payload.name, "project-v2.zip");
        let checksum = release.checksum_for(payload).unwrap();
        assert_eq!(checksum.name, "project-v2.zip.sha256");
    }

    #[test]
    fn missing_prefix_is_no_matching_asset() {
        let release = parse_release(RELEASE_JSON).unwrap();
        let err = release.select_payload("installer-").unwrap_err();
        assert!(matches!(err, LauncherError::NoMatchingAsset(prefix) if prefix == "installer-"));
    }

    #[test]
    fn checksum_absence_is_not_an_error() {
        let release = parse_release(
            r#"{"tag_name":"v1","assets":[{"name":"project-v1.zip","browser_download_url":"u"}]}"#,
        )
        .unwrap();
        let payload = release.select_payload("project-").unwrap();
        assert!(release.checksum_for(payload).is_none());
    }

    #[test]
    fn rejects_malformed_manifests() {
        assert!(matches!(
            parse_release("not json"),
            Err(LauncherError::MalformedManifest(_))
        ));
        assert!(matches!(
            parse_release(r#"{"assets": []}"#),
            Err(LauncherError::MalformedManifest(_))
        ));
        assert!(matches!(
            parse_release(r#"{"tag_name": " ", "assets": []}"#),
            Err(LauncherError::MalformedManifest(_))
        ));
    }

    #[tokio::test]
    async fn fetches_latest_release_from_registry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/releases/latest"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RELEASE_JSON))
            .expect(1)
            .mount(&server)
            .await;

        let release = ReleaseResolver::new()
            .latest(&config_for(&server))
            .await
            .unwrap();
        assert_eq!(release.tag_name, "v2.0.0");
        assert_eq!(release.assets.len(), 4);
    }

    #[tokio::test]
    async fn non_success_status_is_registry_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = ReleaseResolver::new()
            .latest(&config_for(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::RegistryUnavailable(_)));
    }

    #[tokio::test]
    async fn garbage_body_is_malformed_manifest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
            .mount(&server)
            .await;

        let err = ReleaseResolver::new()
            .latest(&config_for(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::MalformedManifest(_)));
    }
}
