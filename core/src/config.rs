//! Configuration for mail processing
use crate::error::Result;
use crate::images::ALLOWED_IMAGE_EXTENSIONS;
use crate::sanitizer::DEFAULT_ALLOWED_SCHEMES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Options for link detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkifyOptions {
    /// Schemes a detected link may use. Empty means the built-in list.
    #[serde(default = "default_schemes")]
    pub allowed_schemes: Vec<String>,
}

fn default_schemes() -> Vec<String> {
    DEFAULT_ALLOWED_SCHEMES
        .iter()
        .map(|scheme| scheme.to_string())
        .collect()
}

impl Default for LinkifyOptions {
    fn default() -> Self {
        Self {
            allowed_schemes: default_schemes(),
        }
    }
}

/// Options for embedding same-site images as attachments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOptions {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// File extensions eligible for embedding, compared case-insensitively.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    ALLOWED_IMAGE_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            extensions: default_extensions(),
        }
    }
}

/// The site the mail is sent from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    /// Absolute base URL, e.g. `https://example.com/`.
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub name: String,

    /// Filesystem directory that `base_url` is served from.
    #[serde(default)]
    pub root: PathBuf,
}

impl SiteConfig {
    pub fn new(base_url: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            name: String::new(),
            root: root.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Base URL without trailing slashes.
    pub fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMagicConfig {
    /// Template file name, looked up in `template_root`.
    #[serde(default = "default_template")]
    pub template: String,

    #[serde(default)]
    pub template_root: Option<PathBuf>,

    /// Derive a plain-text alternate body for HTML mail that lacks one.
    #[serde(default = "default_true")]
    pub html2text: bool,

    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub linkify: LinkifyOptions,

    #[serde(default)]
    pub images: ImageOptions,
}

fn default_template() -> String {
    "default.html".to_string()
}

impl Default for MailMagicConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
            template_root: None,
            html2text: true,
            site: SiteConfig::default(),
            linkify: LinkifyOptions::default(),
            images: ImageOptions::default(),
        }
    }
}

impl MailMagicConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
