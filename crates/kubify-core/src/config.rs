use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::resolver::{HostStrategyKind, dns_label};

/// kubify.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubifyConfig {
    #[serde(default)]
    pub manifest: ManifestConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub resolve: ResolveConfig,
    /// Values supplied for parameter inputs, keyed by `<parameter>` or
    /// `<parameter>.<input>`.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub secrets: SecretsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Manifest file, relative to the project directory
    #[serde(default = "default_manifest_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory generated documents are written to
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Namespace stamped on every generated object
    pub namespace: Option<String>,
    /// Replicas for scalable (volume-less) workloads
    #[serde(default = "default_replicas")]
    pub replicas: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry host images are pushed to; no push when unset
    pub url: Option<String>,
    /// Repository prefix inside the registry
    pub prefix: Option<String>,
    /// Image tag for built resources
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Registry requires credentials to pull
    #[serde(default)]
    pub private: bool,
    /// Name of the image pull secret referenced by workloads
    #[serde(default = "default_pull_secret")]
    pub pull_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Container builder binary
    #[serde(default = "default_builder")]
    pub builder: String,
    /// Tool that publishes project resources as images
    #[serde(default = "default_publish_command")]
    pub publish_command: String,
    /// Images built at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Never prompt; retry recoverable failures automatically
    #[serde(default)]
    pub non_interactive: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// How binding hosts are resolved
    #[serde(default)]
    pub host_strategy: HostStrategyKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Where generated parameter values are kept between runs.
    /// Set `persist = false` to keep them in memory only.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_persist")]
    pub persist: bool,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: default_manifest_path(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            namespace: None,
            replicas: default_replicas(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: None,
            prefix: None,
            tag: default_tag(),
            private: false,
            pull_secret: default_pull_secret(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            builder: default_builder(),
            publish_command: default_publish_command(),
            max_concurrency: default_max_concurrency(),
            non_interactive: false,
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            persist: default_persist(),
        }
    }
}

impl KubifyConfig {
    /// Load from kubify.toml at the given path, or return defaults if not found.
    pub fn load(project_dir: &std::path::Path) -> crate::Result<Self> {
        let config_path = project_dir.join("kubify.toml");
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            Ok(Self::default())
        }
    }
}

impl RegistryConfig {
    /// `[<registry>/][<prefix>/]<name>` for a built resource. The name is
    /// normalized to a lowercase DNS label.
    pub fn repository_for(&self, resource: &str) -> String {
        let name = dns_label(resource);
        let mut parts: Vec<&str> = Vec::new();
        if let Some(url) = self.url.as_deref() {
            parts.push(url.trim_end_matches('/'));
        }
        if let Some(prefix) = self.prefix.as_deref() {
            parts.push(prefix.trim_matches('/'));
        }
        parts.push(&name);
        parts.join("/")
    }

    /// Full image reference including the tag.
    pub fn image_for(&self, resource: &str) -> String {
        format!("{}:{}", self.repository_for(resource), self.tag)
    }
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("aspire-manifest.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("kubify-output")
}

fn default_replicas() -> u32 {
    1
}

fn default_tag() -> String {
    "latest".to_owned()
}

fn default_pull_secret() -> String {
    "image-pull-secret".to_owned()
}

fn default_builder() -> String {
    "docker".to_owned()
}

fn default_publish_command() -> String {
    "dotnet".to_owned()
}

fn default_max_concurrency() -> usize {
    4
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".kubify/secrets.json")
}

fn default_persist() -> bool {
    true
}
