//! SSH module — the SSH Client Factory and its supporting pieces.
//!
//! Uses `russh` for the protocol, verifies host keys against
//! `~/.ssh/known_hosts`, and accepts password or private-key authentication.

mod client;
mod config;
mod error;
pub mod keys;
pub mod known_hosts;
mod session;

pub use client::{connect, ClientHandler};
pub use config::{parse_port, require_field, AuthMethod, SshConfig, CONNECT_TIMEOUT_SECS, TERM_TYPE};
pub use error::SshError;
pub use known_hosts::{get_known_hosts, HostKeyVerification, KnownHostsStore};
pub use session::{Msg, SshSession};
