//! Connection lifecycle: status, retry policy and the pure state machine
//! the connection manager drives.

mod policy;
mod state;
mod status;

pub use policy::ReconnectPolicy;
pub use state::{ConnectionState, RetryDecision};
pub use status::ConnectionStatus;
