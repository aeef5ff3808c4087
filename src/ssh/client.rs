//! SSH client factory: resolves, connects, authenticates, and opens the
//! interactive shell channel the bridge pumps bytes through.

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::PublicKey;
use russh::*;
use tracing::{debug, info, warn};

use super::config::{AuthMethod, SshConfig, CONNECT_TIMEOUT_SECS};
use super::error::SshError;
use super::known_hosts::{get_known_hosts, HostKeyVerification};
use super::session::SshSession;

/// Opens an authenticated SSH connection and returns a ready-to-attach
/// session. This is the gateway's SSH Client Factory.
pub async fn connect(config: SshConfig) -> Result<SshSession, SshError> {
    let dest_addr = format!("{}:{}", config.host, config.port);

    info!("Connecting to SSH server at {}", dest_addr);

    let socket_addr = dest_addr
        .to_socket_addrs()
        .ok()
        .and_then(|mut it| it.next())
        .ok_or_else(|| SshError::ConnectionFailed(dest_addr.clone()))?;

    let ssh_config = client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        ..Default::default()
    };

    let handler = ClientHandler::new(config.host.clone(), config.port);

    let mut handle = tokio::time::timeout(
        Duration::from_secs(CONNECT_TIMEOUT_SECS),
        client::connect(Arc::new(ssh_config), socket_addr, handler),
    )
    .await
    .map_err(|_| SshError::ConnectionFailed(dest_addr.clone()))?
    .map_err(|_| SshError::ConnectionFailed(dest_addr.clone()))?;

    debug!("SSH handshake completed with {}", dest_addr);

    let authenticated = match &config.auth {
        AuthMethod::Password { password } => handle
            .authenticate_password(&config.username, password)
            .await
            .map_err(|_| SshError::AuthenticationFailed)?,
        AuthMethod::PrivateKey { key_data, password } => {
            let key = super::keys::parse_private_key(key_data, password.as_deref())?;
            let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key), None);
            handle
                .authenticate_publickey(&config.username, key_with_hash)
                .await
                .map_err(|_| SshError::AuthenticationFailed)?
        }
    };

    if !authenticated.success() {
        return Err(SshError::AuthenticationFailed);
    }

    info!("SSH authentication successful for {}@{}", config.username, dest_addr);

    Ok(SshSession::new(handle, config.cols, config.rows))
}

/// Handles server-initiated callbacks, the most important of which is host
/// key verification against `~/.ssh/known_hosts`.
pub struct ClientHandler {
    host: String,
    port: u16,
}

impl ClientHandler {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }
}

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        let known_hosts = get_known_hosts();
        let verification = known_hosts.verify(&self.host, self.port, server_public_key);

        match verification {
            HostKeyVerification::Verified => {
                info!("Host key verified for {}:{}", self.host, self.port);
                Ok(true)
            }
            HostKeyVerification::Unknown { fingerprint } => {
                info!(
                    "New host {}:{}, auto-adding to known_hosts (fingerprint: {})",
                    self.host, self.port, fingerprint
                );
                if let Err(e) = known_hosts.add_host(&self.host, self.port, server_public_key) {
                    warn!("Failed to save host key: {}", e);
                }
                Ok(true)
            }
            HostKeyVerification::Changed {
                expected_fingerprint,
                actual_fingerprint,
            } => {
                warn!(
                    "HOST KEY CHANGED for {}:{}! Expected {}, got {}. Possible MITM.",
                    self.host, self.port, expected_fingerprint, actual_fingerprint
                );
                Err(SshError::ConnectionFailed(format!("{}:{}", self.host, self.port)))
            }
        }
    }
}
