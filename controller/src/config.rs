use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use concord_diff::{GrantDiffMode, SizeUnits};
use concord_resource::DiffOptions;
use serde::Deserialize;
use thiserror::Error;
use tokio::fs::read_to_string;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read engine config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse engine config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindConfig {
    pub min_resize_increment: Option<SizeUnits>,
}

/// Engine settings, usually loaded from `concord.toml`:
///
/// ```toml
/// grant_diff = "symmetric"
/// min_resize_increment = 1
///
/// [kinds.instance]
/// min_resize_increment = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub grant_diff: GrantDiffMode,
    pub min_resize_increment: SizeUnits,
    pub kinds: BTreeMap<String, KindConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grant_diff: GrantDiffMode::Symmetric,
            min_resize_increment: SizeUnits(1),
            kinds: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let path = if path.is_dir() {
            path.join("concord.toml")
        } else {
            path.to_owned()
        };
        let string = read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_owned(),
                source,
            })?;
        let config = Self::from_toml_str(&string).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    pub fn from_toml_str(string: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(string)
    }

    /// Effective diff options for one resource kind.
    pub fn diff_options(&self, kind: &str) -> DiffOptions {
        let min_resize_increment = self
            .kinds
            .get(kind)
            .and_then(|kind| kind.min_resize_increment)
            .unwrap_or(self.min_resize_increment);
        DiffOptions {
            grant_diff: self.grant_diff,
            min_resize_increment,
        }
    }
}
