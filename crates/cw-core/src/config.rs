use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::facts::HostFacts;
use crate::reconcile::DesiredChain;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/chainwarden/config.yaml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extra directories searched before `PATH`
    pub search_paths: Vec<PathBuf>,
    pub facts: FactsOverride,
    /// Fixed tool paths, bypassing the search
    pub tools: BTreeMap<String, PathBuf>,
    pub resources: Vec<DesiredChain>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactsOverride {
    pub kernel: Option<String>,
    pub operatingsystem: Option<String>,
}

impl FactsOverride {
    pub fn apply(&self, mut facts: HostFacts) -> HostFacts {
        if let Some(kernel) = &self.kernel {
            facts.kernel = kernel.clone();
        }
        if let Some(os) = &self.operatingsystem {
            facts.operatingsystem = os.clone();
        }
        facts
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load `path`, or the default location if it exists, or an empty config
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Host facts with configured overrides applied
    pub fn host_facts(&self) -> HostFacts {
        self.facts.apply(HostFacts::gather())
    }

    /// Apply a `NAME=PATH` tool override
    pub fn add_tool_override(&mut self, spec: &str) -> Result<(), ConfigError> {
        let (name, path) = spec
            .split_once('=')
            .filter(|(name, path)| !name.is_empty() && !path.is_empty())
            .ok_or_else(|| ConfigError::InvalidToolOverride(spec.to_string()))?;
        self.tools.insert(name.to_string(), PathBuf::from(path));
        Ok(())
    }
}
