//! sshgate - a browser-accessible SSH gateway
//!
//! Bridges an authenticated SSH shell channel and a browser WebSocket, byte
//! for byte, full duplex, non-blocking.

pub mod bridge;
pub mod cli;
pub mod http;
pub mod reactor;
pub mod ssh;
