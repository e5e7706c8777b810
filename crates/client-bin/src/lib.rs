//! # Chainprox client
//!
//! Session lifecycle, message consumers, and runtime wiring for the
//! Chainprox desktop client. The `chainprox` binary in this crate is a thin
//! command-line front end over [`ClientRuntime`].
//!
//! ```text
//! SessionManager::start ─► ConnectionSupervisor (manager + fetcher)
//!                                   │ Inbound{epoch, message}
//!                                   ▼
//!                            event loop ─► MessageDispatcher ─► consumers
//!                                                                 │
//!                              ClientEvent ◄── Notifier ◄─────────┘
//! ```

pub mod app;
pub mod consumers;
mod error;
mod events;
mod runtime;
mod session;

pub use error::{SessionError, SessionResult};
pub use events::{ClientEvent, Notifier};
pub use runtime::{ClientRuntime, RuntimeParts};
pub use session::SessionManager;
