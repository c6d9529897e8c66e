//! Optional defaults file.
//!
//! `pakr.toml` in the working directory (or a file named with `--config`)
//! can carry the metadata that rarely changes between invocations, so build
//! scripts only pass what varies:
//!
//! ```toml
//! [defaults]
//! maintainer = "Jane Doe <jane@example.org>"
//! license = "MIT"
//! homepage = "https://example.org/tool"
//! section = "utils"
//! output-type = "deb"
//! ```
//!
//! Command-line flags always win over file defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::serializer::OutputFormat;

/// File name probed in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "pakr.toml";

/// Metadata defaults merged under the CLI flags.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Defaults {
    /// Default `--maintainer`.
    pub maintainer: Option<String>,
    /// Default `--license`.
    pub license: Option<String>,
    /// Default `--url`.
    pub homepage: Option<String>,
    /// Default `--category`.
    pub section: Option<String>,
    /// Default `--output-type`.
    pub output_type: Option<OutputFormat>,
}

/// Parsed defaults file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The `[defaults]` table.
    #[serde(default)]
    pub defaults: Defaults,
}

impl Config {
    /// Load a config file from an explicit path. The file must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Load `pakr.toml` from the working directory if present, otherwise
    /// return empty defaults.
    pub fn load_default() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
