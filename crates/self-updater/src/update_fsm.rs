//! Update state machine using rust-fsm.
//!
//! ```text
//!   Idle / Installed ── VersionAnnounced ──► Checking
//!          │                                   │
//!          │ StartDownload / AlreadyDownloaded │ (same inputs)
//!          ▼                                   ▼
//!    Downloading ── DownloadSucceeded ──► Downloaded ── BeginInstall ──► Installing
//!          │                                                              │
//!          │ DownloadFailed                        InstallSucceeded ──────┤──► Installed
//!          ▼                                                              │
//!       Failed ◄────────────────────── InstallFailed ─────────────────────┘
//!          │
//!          │ Reset
//!          ▼
//!        Idle
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub update_machine(Idle)

    Idle => {
        VersionAnnounced => Checking,
        StartDownload => Downloading,
        AlreadyDownloaded => Downloaded
    },
    Checking => {
        VersionAnnounced => Checking,
        StartDownload => Downloading,
        AlreadyDownloaded => Downloaded,
        Reset => Idle
    },
    Downloading => {
        DownloadSucceeded => Downloaded,
        DownloadFailed => Failed
    },
    Downloaded => {
        BeginInstall => Installing
    },
    Installing => {
        InstallSucceeded => Installed,
        InstallFailed => Failed
    },
    Installed => {
        VersionAnnounced => Checking,
        StartDownload => Downloading,
        AlreadyDownloaded => Downloaded
    },
    Failed => {
        Reset => Idle
    }
}

pub use update_machine::Input as UpdateMachineInput;
pub use update_machine::State as UpdateMachineState;
pub use update_machine::StateMachine as UpdateMachine;

/// Update progress as reported to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePhase {
    Idle,
    Checking,
    Downloading,
    Downloaded,
    Installing,
    Installed,
    Failed,
}

impl UpdatePhase {
    /// Whether an upgrade is currently running.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            UpdatePhase::Downloading | UpdatePhase::Downloaded | UpdatePhase::Installing
        )
    }
}

impl From<&UpdateMachineState> for UpdatePhase {
    fn from(state: &UpdateMachineState) -> Self {
        match state {
            UpdateMachineState::Idle => UpdatePhase::Idle,
            UpdateMachineState::Checking => UpdatePhase::Checking,
            UpdateMachineState::Downloading => UpdatePhase::Downloading,
            UpdateMachineState::Downloaded => UpdatePhase::Downloaded,
            UpdateMachineState::Installing => UpdatePhase::Installing,
            UpdateMachineState::Installed => UpdatePhase::Installed,
            UpdateMachineState::Failed => UpdatePhase::Failed,
        }
    }
}
