//! SSH error types.
//!
//! Variants and their `Display` strings are deliberately the exact,
//! fixed set of wire-visible error messages the gateway's HTTP front
//! returns (see `http::setup`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SshError {
    #[error("Unable to connect to {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed.")]
    AuthenticationFailed,

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SSH protocol error: {0}")]
    ProtocolError(String),

    #[error("Need password to decrypt the private key.")]
    PasswordRequired,

    #[error("Not a valid private key file or wrong password for decrypting the private key.")]
    InvalidPrivateKey,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid port {0}")]
    InvalidPort(String),

    #[error("Empty {0}")]
    EmptyField(&'static str),

    #[error("Disconnected")]
    Disconnected,
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        SshError::ProtocolError(err.to_string())
    }
}

impl serde::Serialize for SshError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
