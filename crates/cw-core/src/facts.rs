use serde::{Deserialize, Serialize};
use std::path::Path;

/// Kernel name providers are confined to
pub const LINUX: &str = "Linux";

/// Host properties used to confine providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFacts {
    pub kernel: String,
    pub operatingsystem: String,
}

impl HostFacts {
    pub fn new(kernel: impl Into<String>, operatingsystem: impl Into<String>) -> Self {
        Self {
            kernel: kernel.into(),
            operatingsystem: operatingsystem.into(),
        }
    }

    /// Collect facts for the running host
    pub fn gather() -> Self {
        let kernel = kernel_name(std::env::consts::OS);
        let operatingsystem = std::fs::read_to_string(Path::new("/etc/os-release"))
            .ok()
            .and_then(|content| os_release_name(&content))
            .unwrap_or_else(|| kernel.clone());

        Self {
            kernel,
            operatingsystem,
        }
    }

    pub fn is_linux(&self) -> bool {
        self.kernel == LINUX
    }
}

/// Map a Rust target OS to the kernel name `uname -s` would report
pub fn kernel_name(os: &str) -> String {
    match os {
        "linux" | "android" => "Linux".to_string(),
        "windows" => "Windows".to_string(),
        "macos" | "ios" => "Darwin".to_string(),
        "freebsd" => "FreeBSD".to_string(),
        "openbsd" => "OpenBSD".to_string(),
        "netbsd" => "NetBSD".to_string(),
        "solaris" | "illumos" => "SunOS".to_string(),
        other => other.to_string(),
    }
}

fn os_release_name(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let value = line.trim().strip_prefix("NAME=")?;
        let value = value.trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}
