//! Command implementations for the `chainprox` binary.

mod init;
mod lifecycle;

pub use init::{build_runtime, run_client};
pub use lifecycle::{logout, show_status, upgrade};
