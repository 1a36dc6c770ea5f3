//! Client for the server-control wrapper's line-oriented TCP protocol.
//!
//! The wrapper sits in front of the game server's stdin/stdout and exposes a
//! password-authenticated TCP endpoint: after a successful handshake the
//! client may send console commands as single lines and receives server
//! console output as asynchronous lines. There are no per-command replies.

pub mod config;
pub mod session;

pub use config::{AuthConfig, AuthMethod, ControlConfig, ControlConfigError};
pub use session::{ControlSession, SessionError, SessionState};
