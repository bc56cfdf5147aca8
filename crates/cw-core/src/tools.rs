use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::chain::Family;

/// Resolved paths of the firewall tools, computed once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolAvailability {
    tools: BTreeMap<String, Option<PathBuf>>,
}

impl ToolAvailability {
    /// Every tool name the families need
    pub fn tool_names() -> impl Iterator<Item = &'static str> {
        Family::ALL.into_iter().flat_map(Family::tools)
    }

    /// Query `lookup` once for each tool name
    pub fn probe<F>(mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<PathBuf>,
    {
        let tools = Self::tool_names()
            .map(|name| (name.to_string(), lookup(name)))
            .collect();
        Self { tools }
    }

    pub fn path(&self, name: &str) -> Option<&Path> {
        self.tools.get(name).and_then(|p| p.as_deref())
    }

    pub fn save_tool(&self, family: Family) -> Option<&Path> {
        self.path(family.save_tool())
    }

    /// Tools of `family` that did not resolve
    pub fn missing(&self, family: Family) -> Vec<&'static str> {
        family
            .tools()
            .into_iter()
            .filter(|name| self.path(name).is_none())
            .collect()
    }

    pub fn family_available(&self, family: Family) -> bool {
        self.missing(family).is_empty()
    }

    pub fn available_families(&self) -> Vec<Family> {
        Family::ALL
            .into_iter()
            .filter(|family| self.family_available(*family))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Path>)> {
        self.tools.iter().map(|(name, path)| (name.as_str(), path.as_deref()))
    }
}
