use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

/// A published release as returned by the registry's "latest release" endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// What the project directory currently has installed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalState {
    pub tag: String,
}
