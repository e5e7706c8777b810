//! File system paths for the client.

use crate::{CoreError, CoreResult, Platform};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Data directory name under the user's home.
const DATA_DIR_NAME: &str = ".chainprox";

/// Manages per-user file system paths.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for client data (~/.chainprox)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a Paths instance rooted at `~/.chainprox`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(DATA_DIR_NAME),
        })
    }

    /// Create a Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// ~/.chainprox/config.json
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// ~/.chainprox/db.sqlite3
    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join("db.sqlite3")
    }

    /// ~/.chainprox/logs
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// ~/.chainprox/logs/client.jsonl
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("client.jsonl")
    }

    /// ~/.chainprox/downloads, parent of the per-attempt update directories.
    pub fn downloads_dir(&self) -> PathBuf {
        self.base_dir.join("downloads")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.downloads_dir())?;
        Ok(())
    }
}

/// Where the installed application lives on disk.
///
/// On Mac the running executable sits inside
/// `<app_dir>/chainprox.app/Contents/MacOS/`, and the whole bundle is what
/// gets replaced. Elsewhere the executable sits directly in `app_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub platform: Platform,
    pub app_dir: PathBuf,
    pub executable_path: PathBuf,
}

impl InstallLayout {
    /// Layout for an application installed in `app_dir`.
    pub fn new(platform: Platform, app_dir: PathBuf) -> Self {
        let executable_path = app_dir.join(platform.app_name());
        Self {
            platform,
            app_dir,
            executable_path,
        }
    }

    /// Derive the layout from the path of a running executable.
    pub fn from_executable(platform: Platform, executable: &Path) -> CoreResult<Self> {
        let exe_dir = executable
            .parent()
            .ok_or_else(|| CoreError::Path(format!("{} has no parent", executable.display())))?;

        let app_dir = match platform {
            // chainprox.app/Contents/MacOS -> directory holding chainprox.app
            Platform::Mac => exe_dir
                .ancestors()
                .nth(3)
                .ok_or_else(|| {
                    CoreError::Path(format!(
                        "{} is not inside an application bundle",
                        executable.display()
                    ))
                })?
                .to_path_buf(),
            Platform::Linux | Platform::Windows => exe_dir.to_path_buf(),
        };

        Ok(Self::new(platform, app_dir))
    }

    /// Layout of the currently running executable.
    pub fn current(platform: Platform) -> CoreResult<Self> {
        let exe = std::env::current_exe()?;
        Self::from_executable(platform, &exe)
    }

    /// The `.tmp` sibling the old executable is renamed to during install.
    pub fn staged_old_path(&self) -> PathBuf {
        let mut name = OsString::from(self.executable_path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}
