//! The bridging engine: the Session/Worker and its Pending-Session
//! Registry, together realizing the gateway's core duty of shuttling bytes
//! between an SSH channel and a browser WebSocket.

pub mod registry;
pub mod session;

pub use registry::Registry;
pub use session::{LiveSshChannel, Mode, Session, SshChannel, WsSink, WsSinkError, BUF_SIZE};
