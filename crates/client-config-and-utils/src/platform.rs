//! Host platform detection.

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target platform of a client build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    #[serde(rename = "osx")]
    Mac,
    Windows,
}

impl Platform {
    /// Wire name as used in version announcements (`linux`, `osx`, `windows`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Mac => "osx",
            Platform::Windows => "windows",
        }
    }

    /// File name of the installed application for this platform.
    pub fn app_name(&self) -> &'static str {
        match self {
            Platform::Linux => "chainprox",
            Platform::Mac => "chainprox.app",
            Platform::Windows => "chainprox.exe",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(Platform::Linux),
            "osx" | "mac" | "macos" | "darwin" => Ok(Platform::Mac),
            "windows" => Ok(Platform::Windows),
            other => Err(CoreError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// Operating system and architecture marker of the running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub platform: Platform,
    /// `"64"` or `"32"`; matched as a substring of a binary's arch label.
    pub arch_marker: String,
}

impl HostPlatform {
    pub fn new(platform: Platform, arch_marker: impl Into<String>) -> Self {
        Self {
            platform,
            arch_marker: arch_marker.into(),
        }
    }

    /// Detect the platform this binary was built for.
    pub fn detect() -> CoreResult<Self> {
        let platform = Platform::from_str(std::env::consts::OS)?;
        let arch_marker = if cfg!(target_pointer_width = "64") {
            "64"
        } else {
            "32"
        };
        Ok(Self::new(platform, arch_marker))
    }

    /// Whether a binary advertised for `platform`/`arch` runs on this host.
    ///
    /// Comparison is case-insensitive. Mac builds are universal, so the
    /// architecture is only checked on the other platforms.
    pub fn matches(&self, platform: &str, arch: &str) -> bool {
        if platform.trim().to_ascii_lowercase() != self.platform.as_str() {
            return false;
        }
        if self.platform == Platform::Mac {
            return true;
        }
        arch.to_ascii_lowercase()
            .contains(&self.arch_marker.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parse_is_case_insensitive() {
        assert_eq!("Linux".parse::<Platform>().unwrap(), Platform::Linux);
        assert_eq!("OSX".parse::<Platform>().unwrap(), Platform::Mac);
        assert_eq!("darwin".parse::<Platform>().unwrap(), Platform::Mac);
        assert_eq!("WINDOWS".parse::<Platform>().unwrap(), Platform::Windows);
        assert!("beos".parse::<Platform>().is_err());
    }

    #[test]
    fn platform_serde_names() {
        assert_eq!(serde_json::to_string(&Platform::Mac).unwrap(), "\"osx\"");
        let p: Platform = serde_json::from_str("\"linux\"").unwrap();
        assert_eq!(p, Platform::Linux);
    }

    #[test]
    fn app_names() {
        assert_eq!(Platform::Linux.app_name(), "chainprox");
        assert_eq!(Platform::Mac.app_name(), "chainprox.app");
        assert_eq!(Platform::Windows.app_name(), "chainprox.exe");
    }

    #[test]
    fn linux_host_requires_arch_marker() {
        let host = HostPlatform::new(Platform::Linux, "64");
        assert!(host.matches("linux", "x86_64"));
        assert!(host.matches("LINUX", "AMD64"));
        assert!(!host.matches("linux", "i386"));
        assert!(!host.matches("windows", "64bit"));
    }

    #[test]
    fn mac_host_ignores_arch() {
        let host = HostPlatform::new(Platform::Mac, "64");
        assert!(host.matches("osx", ""));
        assert!(host.matches("OSX", "universal"));
        assert!(!host.matches("linux", "x86_64"));
    }

    #[test]
    fn detect_matches_build_target() {
        let host = HostPlatform::detect().unwrap();
        assert!(host.arch_marker == "64" || host.arch_marker == "32");
    }
}
