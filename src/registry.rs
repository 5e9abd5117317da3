use crate::error::{ModError, ModResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fs::File, io, path::Path, time::Duration};
use tracing::debug;

pub const DEFAULT_REGISTRY_URL: &str = "https://thunderstore.io/api/experimental/package";
pub const USER_AGENT: &str = concat!("marrow/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub versions: Vec<Version>,
    /// Detail responses carry only the newest version here.
    #[serde(default, skip_serializing)]
    pub latest: Option<Version>,
}

impl Package {
    /// Fills the fields the two registry listing shapes disagree on.
    pub fn normalize(mut self) -> Self {
        if self.namespace.is_empty() {
            self.namespace = self.owner.clone();
        }
        if self.full_name.is_empty() {
            self.full_name = format!("{}-{}", self.namespace, self.name);
        }
        if self.versions.is_empty() {
            if let Some(latest) = self.latest.take() {
                self.versions.push(latest);
            }
        }
        self.latest = None;
        self
    }

    pub fn newest(&self) -> Option<&Version> {
        self.versions.first()
    }

    pub fn display_name(&self) -> String {
        self.display_name
            .clone()
            .filter(|value| !value.is_empty())
            .or_else(|| self.newest().and_then(|version| version.name.clone()))
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.name.clone())
    }

    pub fn description(&self) -> String {
        self.description
            .clone()
            .or_else(|| self.newest().map(|version| version.description.clone()))
            .unwrap_or_default()
    }

    pub fn icon(&self) -> Option<String> {
        self.icon
            .clone()
            .or_else(|| self.newest().and_then(|version| version.icon.clone()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default)]
    pub name: Option<String>,
    pub version_number: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Read-only view of the package registry.
pub trait Registry: Send + Sync {
    fn fetch_catalog(&self) -> ModResult<Vec<Package>>;

    fn fetch_package(&self, namespace: &str, name: &str) -> ModResult<Package>;

    /// Streams the archive at `url` into `dest`.
    fn download(&self, url: &str, dest: &Path) -> ModResult<()>;
}

#[derive(Debug, Clone)]
pub struct HttpRegistryOptions {
    pub base_url: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub download_timeout: Duration,
}

impl Default for HttpRegistryOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REGISTRY_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(120),
        }
    }
}

/// Blocking registry client.
pub struct HttpRegistry {
    base_url: String,
    user_agent: String,
    api: ureq::Agent,
    downloads: ureq::Agent,
}

impl HttpRegistry {
    pub fn new(options: HttpRegistryOptions) -> Self {
        let api = ureq::AgentBuilder::new()
            .timeout_connect(options.connect_timeout)
            .timeout_read(options.read_timeout)
            .timeout_write(options.read_timeout)
            .build();
        let downloads = ureq::AgentBuilder::new()
            .timeout_connect(options.connect_timeout)
            .timeout_read(options.download_timeout)
            .timeout_write(options.download_timeout)
            .build();
        Self {
            base_url: options.base_url.trim_end_matches('/').to_string(),
            user_agent: options.user_agent,
            api,
            downloads,
        }
    }

    fn catalog_url(&self) -> String {
        format!("{}/", self.base_url)
    }

    fn package_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/{namespace}/{name}/", self.base_url)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> ModResult<T> {
        debug!(url, "registry request");
        let response = self
            .api
            .get(url)
            .set("User-Agent", &self.user_agent)
            .call()
            .map_err(registry_error)?;
        response.into_json().map_err(|err| ModError::Registry {
            status: None,
            detail: format!("decode {url}: {err}"),
        })
    }
}

impl Registry for HttpRegistry {
    fn fetch_catalog(&self) -> ModResult<Vec<Package>> {
        let packages: Vec<Package> = self.get_json(&self.catalog_url())?;
        Ok(packages.into_iter().map(Package::normalize).collect())
    }

    fn fetch_package(&self, namespace: &str, name: &str) -> ModResult<Package> {
        let package: Package = self.get_json(&self.package_url(namespace, name))?;
        Ok(package.normalize())
    }

    fn download(&self, url: &str, dest: &Path) -> ModResult<()> {
        debug!(url, dest = ?dest, "downloading archive");
        let download_error = |detail: String| ModError::Download {
            url: url.to_string(),
            detail,
        };
        let response = self
            .downloads
            .get(url)
            .set("User-Agent", &self.user_agent)
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => download_error(format!("HTTP {code}")),
                ureq::Error::Transport(transport) => download_error(transport.to_string()),
            })?;
        let mut reader = response.into_reader();
        let mut file = File::create(dest).map_err(|err| ModError::io(dest, err))?;
        io::copy(&mut reader, &mut file).map_err(|err| download_error(err.to_string()))?;
        Ok(())
    }
}

fn registry_error(err: ureq::Error) -> ModError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            ModError::Registry {
                status: Some(code),
                detail: body.trim().to_string(),
            }
        }
        ureq::Error::Transport(transport) => ModError::Registry {
            status: None,
            detail: transport.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn package_listing_with_versions_parses() {
        let raw = r#"{
            "name": "Fusion",
            "full_name": "Lakatrazz-Fusion",
            "owner": "Lakatrazz",
            "versions": [
                {
                    "name": "Fusion",
                    "version_number": "1.9.2",
                    "download_url": "https://example.test/Fusion-1.9.2.zip",
                    "dependencies": ["LavaGang-MelonLoader-0.6.1"],
                    "downloads": 1200,
                    "description": "Multiplayer",
                    "icon": "https://example.test/icon.png"
                },
                { "version_number": "1.9.1" }
            ]
        }"#;
        let package: Package = serde_json::from_str(raw).unwrap();
        let package = package.normalize();
        assert_eq!(package.namespace, "Lakatrazz");
        assert_eq!(package.versions.len(), 2);
        assert_eq!(package.display_name(), "Fusion");
        assert_eq!(package.description(), "Multiplayer");
        assert_eq!(package.icon().as_deref(), Some("https://example.test/icon.png"));
        assert_eq!(package.versions[1].downloads, 0);
    }

    #[test]
    fn package_detail_with_only_latest_gets_one_version() {
        let raw = r#"{
            "namespace": "Lakatrazz",
            "name": "Fusion",
            "owner": "Lakatrazz",
            "latest": { "version_number": "2.0.0", "description": "New" }
        }"#;
        let package: Package = serde_json::from_str(raw).unwrap();
        let package = package.normalize();
        assert_eq!(package.full_name, "Lakatrazz-Fusion");
        assert_eq!(package.versions.len(), 1);
        assert_eq!(package.versions[0].version_number, "2.0.0");
    }

    #[test]
    fn urls_are_built_from_trimmed_base() {
        let registry = HttpRegistry::new(HttpRegistryOptions {
            base_url: "https://registry.test/api/".to_string(),
            ..HttpRegistryOptions::default()
        });
        assert_eq!(registry.catalog_url(), "https://registry.test/api/");
        assert_eq!(
            registry.package_url("Lakatrazz", "Fusion"),
            "https://registry.test/api/Lakatrazz/Fusion/"
        );
    }
}
