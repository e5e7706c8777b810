//! Kind-keyed routing of inbound service messages to consumers.

mod dispatcher;
mod error;

pub use dispatcher::{Consumer, DispatchOutcome, MessageDispatcher};
pub use error::{DispatchError, DispatchResult};
