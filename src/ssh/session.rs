//! A connected, authenticated SSH handle ready to open its interactive
//! shell channel.

use russh::{client, Channel, ChannelMsg};

use super::client::ClientHandler;
use super::config::TERM_TYPE;
use super::error::SshError;

pub struct SshSession {
    handle: client::Handle<ClientHandler>,
    cols: u32,
    rows: u32,
}

impl SshSession {
    pub fn new(handle: client::Handle<ClientHandler>, cols: u32, rows: u32) -> Self {
        Self { handle, cols, rows }
    }

    /// Opens a channel, requests a PTY, and starts the interactive shell.
    /// The returned channel is the byte pipe the bridge pumps in both
    /// directions.
    pub async fn open_shell(self) -> Result<Channel<client::Msg>, SshError> {
        let mut channel = self.handle.channel_open_session().await?;
        channel
            .request_pty(false, TERM_TYPE, self.cols, self.rows, 0, 0, &[])
            .await?;
        channel.request_shell(false).await?;
        Ok(channel)
    }
}

/// Re-exported so callers matching on channel events don't need to depend
/// on `russh` directly.
pub type Msg = ChannelMsg;
