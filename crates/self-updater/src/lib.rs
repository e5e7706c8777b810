//! Self-update for the Chainprox client.
//!
//! This crate provides:
//! - The update state machine (`Idle -> Checking -> Downloading ->
//!   Downloaded -> Installing -> Installed`, with `Failed` reachable from
//!   downloading and installing)
//! - Binary selection for the host platform from a version announcement
//! - Streaming HTTP download on a background worker
//! - Archive extraction that rejects path traversal before writing anything
//! - One [`Installer`] per platform, chosen once at startup

mod archive;
mod catalog;
mod download;
mod error;
mod install;
mod manager;
mod update_fsm;

pub use archive::{extract_tar, extract_zip, validate_tar, validate_zip};
pub use catalog::{select_binary, BinaryEntry};
pub use download::{Downloader, HttpDownloader};
pub use error::{UpdateError, UpdateResult};
pub use install::{
    installer_for, move_path, remove_stale_executable, Installer, LinuxInstaller, MacInstaller,
    WindowsInstaller,
};
pub use manager::UpdateManager;
pub use update_fsm::{UpdateMachine, UpdateMachineInput, UpdateMachineState, UpdatePhase};
