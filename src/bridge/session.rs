//! The Session (Worker): the bridging engine that shuttles bytes between an
//! SSH channel and a browser WebSocket, full duplex, byte for byte.
//!
//! Modeled as a single owned struct driven by a per-attached-Session pump
//! task (see [`Session::run`]). Both ends of the bridge are abstracted
//! behind traits (`SshChannel`, `WsSink`) so the engine is unit-testable
//! without a live socket or a live SSH connection, applying the same
//! duck-typed-handler idea symmetrically to both sides.

use std::collections::VecDeque;

use async_trait::async_trait;
use russh::{Channel, ChannelMsg};
use thiserror::Error;
use tracing::{debug, warn};

use crate::ssh::SshError;

/// Bytes forwarded to the WS peer in chunks no larger than this, preserving
/// order across the split.
pub const BUF_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Nothing queued to write to the SSH channel; only reading matters.
    Read,
    /// Bytes are queued (or the last send was partial) and need flushing
    /// before reads resume mattering.
    Write,
}

#[derive(Debug, Error)]
#[error("websocket sink closed")]
pub struct WsSinkError;

/// Capability interface for the WebSocket side of the bridge (the attached
/// "handler").
#[async_trait]
pub trait WsSink: Send {
    async fn write_message(&mut self, data: Vec<u8>) -> Result<(), WsSinkError>;
    async fn close(&mut self);
}

/// Capability interface for the SSH side of the bridge: `send` may perform
/// a partial write and reports how many bytes actually went out, `recv`
/// yields `None` on EOF/close.
#[async_trait]
pub trait SshChannel: Send {
    async fn send(&mut self, data: &[u8]) -> Result<usize, SshError>;
    async fn recv(&mut self) -> Option<Result<Vec<u8>, SshError>>;
    async fn close(&mut self);
}

/// Adapts a live `russh` channel to [`SshChannel`]. `russh::Channel::data`
/// always writes the whole buffer or errors, so `send` here always reports
/// a full write — backpressure shows up as the `await` suspending, not as a
/// short return value. Extended data on stream 1 (stderr) is folded into
/// the same single byte stream as stdout.
pub struct LiveSshChannel {
    channel: Channel<russh::client::Msg>,
}

impl LiveSshChannel {
    pub fn new(channel: Channel<russh::client::Msg>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl SshChannel for LiveSshChannel {
    async fn send(&mut self, data: &[u8]) -> Result<usize, SshError> {
        self.channel.data(data).await?;
        Ok(data.len())
    }

    async fn recv(&mut self) -> Option<Result<Vec<u8>, SshError>> {
        loop {
            match self.channel.wait().await? {
                ChannelMsg::Data { data } => return Some(Ok(data.to_vec())),
                ChannelMsg::ExtendedData { data, ext } if ext == 1 => {
                    return Some(Ok(data.to_vec()))
                }
                ChannelMsg::Eof | ChannelMsg::Close => return None,
                _ => continue,
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.channel.eof().await;
    }
}

/// The bridging engine for one SSH session. Pending (no handler attached
/// yet), then Attached once bound to a WebSocket, then Closed.
pub struct Session {
    id: String,
    channel: Box<dyn SshChannel>,
    handler: Option<Box<dyn WsSink>>,
    /// Bytes received from the WS side, queued to be written to the SSH
    /// channel (the browser-to-ssh direction).
    to_ssh: VecDeque<u8>,
    mode: Mode,
    closed: bool,
}

impl Session {
    pub fn new(id: String, channel: Box<dyn SshChannel>) -> Self {
        Self {
            id,
            channel,
            handler: None,
            to_ssh: VecDeque::new(),
            mode: Mode::Read,
            closed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Binds a WebSocket handler, transitioning Pending -> Attached.
    pub fn attach(&mut self, handler: Box<dyn WsSink>) {
        self.handler = Some(handler);
    }

    pub fn is_attached(&self) -> bool {
        self.handler.is_some()
    }

    /// `on_write` equivalent: data arrived from the browser, queue it and
    /// try to flush it straight to the SSH channel.
    pub async fn on_ws_message(&mut self, data: Vec<u8>) {
        if self.closed {
            return;
        }
        self.to_ssh.extend(data);
        self.flush().await;
    }

    async fn flush(&mut self) {
        if self.to_ssh.is_empty() {
            self.mode = Mode::Read;
            return;
        }

        let pending: Vec<u8> = self.to_ssh.iter().copied().collect();
        match self.channel.send(&pending).await {
            Ok(sent) if sent >= pending.len() => {
                self.to_ssh.clear();
                self.mode = Mode::Read;
            }
            Ok(sent) => {
                self.to_ssh.drain(..sent);
                self.mode = Mode::Write;
            }
            Err(e) => {
                warn!("session {} failed writing to ssh channel: {}", self.id, e);
                self.close().await;
            }
        }
    }

    /// `on_read` equivalent: forward one chunk of data arriving from SSH to
    /// the attached WS handler, split at `BUF_SIZE` boundaries.
    async fn on_ssh_data(&mut self, data: Vec<u8>) {
        if data.is_empty() {
            self.close().await;
            return;
        }

        let Some(handler) = self.handler.as_mut() else {
            debug!("session {} received data before attach, dropping", self.id);
            return;
        };

        for chunk in data.chunks(BUF_SIZE) {
            if handler.write_message(chunk.to_vec()).await.is_err() {
                self.close().await;
                return;
            }
        }
    }

    /// Idempotent close: the first call tears down the handler and the SSH
    /// channel; later calls are no-ops. This is a deliberate tightening
    /// over a raw fd-based original, where "already closed" was only
    /// guarded for the handler-removal branch.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(handler) = self.handler.as_mut() {
            handler.close().await;
        }
        self.channel.close().await;
    }

    /// Drives the session until it closes: races incoming SSH data against
    /// frames arriving from the WS side over `inbound`, with anything still
    /// queued to go out flushed before waiting on either. This is the pump
    /// task body spawned once a session attaches — the reactor callback the
    /// design assumes is registered against this session's fd.
    pub async fn run(mut self, mut inbound: tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>) {
        loop {
            if self.closed {
                break;
            }

            if !self.to_ssh.is_empty() {
                self.flush().await;
                continue;
            }

            tokio::select! {
                maybe = inbound.recv() => {
                    match maybe {
                        Some(data) => self.on_ws_message(data).await,
                        None => self.close().await,
                    }
                }
                maybe = self.channel.recv() => {
                    match maybe {
                        Some(Ok(data)) => self.on_ssh_data(data).await,
                        Some(Err(e)) => {
                            warn!("session {} channel error: {}", self.id, e);
                            self.close().await;
                        }
                        None => self.close().await,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    struct FakeSink {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        closed: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl WsSink for FakeSink {
        async fn write_message(&mut self, data: Vec<u8>) -> Result<(), WsSinkError> {
            self.sent.lock().unwrap().push(data);
            Ok(())
        }

        async fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    /// A fake SSH channel with a configurable per-send cap, so tests can
    /// force partial sends the way a real socket occasionally would.
    struct FakeChannel {
        send_cap: usize,
        sent: Vec<u8>,
        incoming: mpsc::UnboundedReceiver<Option<Vec<u8>>>,
    }

    #[async_trait]
    impl SshChannel for FakeChannel {
        async fn send(&mut self, data: &[u8]) -> Result<usize, SshError> {
            let n = data.len().min(self.send_cap.max(1));
            self.sent.extend_from_slice(&data[..n]);
            Ok(n)
        }

        async fn recv(&mut self) -> Option<Result<Vec<u8>, SshError>> {
            match self.incoming.recv().await {
                Some(Some(data)) => Some(Ok(data)),
                Some(None) | None => None,
            }
        }

        async fn close(&mut self) {}
    }

    fn fake_channel(send_cap: usize) -> (Box<FakeChannel>, mpsc::UnboundedSender<Option<Vec<u8>>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Box::new(FakeChannel {
                send_cap,
                sent: Vec::new(),
                incoming: rx,
            }),
            tx,
        )
    }

    #[tokio::test]
    async fn mode_is_write_while_bytes_remain_queued() {
        let (channel, _tx) = fake_channel(4);
        let mut session = Session::new("s1".into(), channel);

        session.on_ws_message(b"hello world".to_vec()).await;
        // 11 bytes queued, only 4 sent per flush -> still pending.
        assert_eq!(session.mode(), Mode::Write);
    }

    #[tokio::test]
    async fn mode_returns_to_read_once_drained() {
        let (channel, _tx) = fake_channel(1024);
        let mut session = Session::new("s1".into(), channel);

        session.on_ws_message(b"hello".to_vec()).await;
        assert_eq!(session.mode(), Mode::Read);
    }

    #[tokio::test]
    async fn partial_sends_preserve_byte_order_across_flushes() {
        let (channel, _tx) = fake_channel(3);
        let mut session = Session::new("s1".into(), channel);

        session.on_ws_message(b"abcdefghi".to_vec()).await;
        assert_eq!(session.mode(), Mode::Write);
        session.flush().await;
        assert_eq!(session.mode(), Mode::Write);
        session.flush().await;
        assert_eq!(session.mode(), Mode::Read);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (channel, _tx) = fake_channel(1024);
        let mut session = Session::new("s1".into(), channel);
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(false));
        session.attach(Box::new(FakeSink {
            sent: sent.clone(),
            closed: closed.clone(),
        }));

        session.close().await;
        session.close().await;

        assert!(*closed.lock().unwrap());
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn oversized_ssh_payload_is_chunked_in_order() {
        let (channel, tx) = fake_channel(1024);
        let mut session = Session::new("s1".into(), channel);
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(false));
        session.attach(Box::new(FakeSink {
            sent: sent.clone(),
            closed: closed.clone(),
        }));

        let payload = vec![7u8; BUF_SIZE * 2 + 100];
        tx.send(Some(payload.clone())).unwrap();
        tx.send(None).unwrap();
        drop(tx);

        // No WS frames arrive in this test; keep the sender alive so the
        // inbound branch of `run`'s select simply never becomes ready.
        let (_inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        session.run(inbound_rx).await;

        let chunks = sent.lock().unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), BUF_SIZE);
        assert_eq!(chunks[1].len(), BUF_SIZE);
        assert_eq!(chunks[2].len(), 100);
        let reassembled: Vec<u8> = chunks.iter().flatten().copied().collect();
        assert_eq!(reassembled, payload);
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn inbound_ws_frames_are_written_to_the_ssh_channel() {
        let (channel, ssh_tx) = fake_channel(1024);
        let mut session = Session::new("s1".into(), channel);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        inbound_tx.send(b"ls -la\n".to_vec()).unwrap();
        drop(inbound_tx);
        // Dropping the ssh-side sender too means the channel's recv also
        // reports EOF once run() gets around to it; the run loop still
        // drains the queued inbound frame first since the inbound branch
        // becomes ready immediately.
        drop(ssh_tx);

        session.run(inbound_rx).await;
        assert!(session.is_closed());
    }
}
