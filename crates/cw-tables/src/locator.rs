use cw_core::ToolAvailability;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directories searched after `PATH`
pub const FIXED_SEARCH_PATHS: [&str; 6] = [
    "/usr/local/sbin",
    "/usr/local/bin",
    "/usr/sbin",
    "/usr/bin",
    "/sbin",
    "/bin",
];

pub trait ToolLocator {
    fn locate(&self, name: &str) -> Option<PathBuf>;
}

/// Searches a list of directories for executables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLocator {
    dirs: Vec<PathBuf>,
}

impl PathLocator {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        let mut unique: Vec<PathBuf> = Vec::with_capacity(dirs.len());
        for dir in dirs {
            if !unique.contains(&dir) {
                unique.push(dir);
            }
        }
        Self { dirs: unique }
    }

    /// `extra` directories, then `PATH`, then [`FIXED_SEARCH_PATHS`]
    pub fn system(extra: &[PathBuf]) -> Self {
        let mut dirs = extra.to_vec();
        if let Some(path) = std::env::var_os("PATH") {
            dirs.extend(std::env::split_paths(&path));
        }
        dirs.extend(FIXED_SEARCH_PATHS.iter().map(PathBuf::from));
        Self::new(dirs)
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl ToolLocator for PathLocator {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Fixed name to path table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticLocator {
    tools: BTreeMap<String, PathBuf>,
}

impl StaticLocator {
    pub fn new(tools: BTreeMap<String, PathBuf>) -> Self {
        Self { tools }
    }

    pub fn with(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.tools.insert(name.into(), path.into());
        self
    }
}

impl ToolLocator for StaticLocator {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.tools.get(name).cloned()
    }
}

/// Asks `primary` first and `fallback` for anything it does not know
#[derive(Debug, Clone)]
pub struct FallbackLocator<P, F> {
    pub primary: P,
    pub fallback: F,
}

impl<P: ToolLocator, F: ToolLocator> ToolLocator for FallbackLocator<P, F> {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.primary
            .locate(name)
            .or_else(|| self.fallback.locate(name))
    }
}

/// Resolve every firewall tool once
pub fn probe_tools(locator: &dyn ToolLocator) -> ToolAvailability {
    ToolAvailability::probe(|name| {
        let path = locator.locate(name);
        match &path {
            Some(path) => debug!(tool = name, path = %path.display(), "found tool"),
            None => debug!(tool = name, "tool not found"),
        }
        path
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_core::Family;
    use std::fs;

    #[cfg(unix)]
    fn write_tool(dir: &Path, name: &str, mode: u32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn finds_executables_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_tool(first.path(), "iptables", 0o644);
        let expected = write_tool(second.path(), "iptables", 0o755);
        let save = write_tool(first.path(), "iptables-save", 0o755);

        let locator = PathLocator::new(vec![first.path().into(), second.path().into()]);
        assert_eq!(locator.locate("iptables"), Some(expected));
        assert_eq!(locator.locate("iptables-save"), Some(save));
        assert_eq!(locator.locate("ebtables"), None);
    }

    #[test]
    fn ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("ip6tables")).unwrap();
        let locator = PathLocator::new(vec![dir.path().into()]);
        assert_eq!(locator.locate("ip6tables"), None);
    }

    #[test]
    fn system_locator_includes_fixed_paths_once() {
        let locator = PathLocator::system(&[PathBuf::from("/opt/fw/sbin")]);
        assert_eq!(locator.dirs()[0], PathBuf::from("/opt/fw/sbin"));
        let sbin_count = locator
            .dirs()
            .iter()
            .filter(|d| d.as_path() == Path::new("/sbin"))
            .count();
        assert_eq!(sbin_count, 1);
    }

    #[test]
    fn fallback_prefers_primary() {
        let locator = FallbackLocator {
            primary: StaticLocator::default().with("ebtables-save", "/opt/ebtables-legacy-save"),
            fallback: StaticLocator::default()
                .with("ebtables", "/sbin/ebtables")
                .with("ebtables-save", "/sbin/ebtables-save"),
        };

        let tools = probe_tools(&locator);
        assert_eq!(
            tools.save_tool(Family::Ebtables),
            Some(Path::new("/opt/ebtables-legacy-save"))
        );
        assert!(tools.family_available(Family::Ebtables));
        assert!(!tools.family_available(Family::Iptables));
    }
}
