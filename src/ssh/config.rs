//! SSH connection configuration and request-field validation.

use super::error::SshError;

/// Default terminal type requested when invoking the remote shell.
///
/// Fixed at `"xterm"`, matching the gateway's HTTP contract; there is no
/// per-request override.
pub const TERM_TYPE: &str = "xterm";

/// Fixed connect + auth timeout.
pub const CONNECT_TIMEOUT_SECS: u64 = 6;

const DEFAULT_COLS: u32 = 80;
const DEFAULT_ROWS: u32 = 24;

/// SSH connection configuration built from an incoming HTTP request.
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
    pub cols: u32,
    pub rows: u32,
}

/// Authentication methods the gateway accepts.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    Password {
        password: String,
    },
    PrivateKey {
        /// Raw key material (PEM text), not a filesystem path — the key is
        /// uploaded as part of the request, never read off the server disk.
        key_data: String,
        password: Option<String>,
    },
}

impl SshConfig {
    pub fn new(host: String, port: u16, username: String, auth: AuthMethod) -> Self {
        Self {
            host,
            port,
            username,
            auth,
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
        }
    }
}

/// Validate a required, non-empty text field.
///
/// A present-but-blank field is treated as invalid as a missing one.
pub fn require_field(name: &'static str, value: Option<&str>) -> Result<String, SshError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(SshError::EmptyField(name)),
    }
}

/// Parse and range-check a port value (the original handler's `get_port`).
///
/// Accepts a textual value so callers can pass through whatever the request
/// carried, defaulting to 22 when absent.
pub fn parse_port(value: Option<&str>) -> Result<u16, SshError> {
    let raw = match value.map(str::trim) {
        None | Some("") => return Ok(22),
        Some(v) => v,
    };

    match raw.parse::<u32>() {
        Ok(p) if p >= 1 && p <= 65535 => Ok(p as u16),
        _ => Err(SshError::InvalidPort(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_default_port_when_absent() {
        assert_eq!(parse_port(None).unwrap(), 22);
        assert_eq!(parse_port(Some("")).unwrap(), 22);
    }

    #[test]
    fn rejects_out_of_range_port() {
        assert!(parse_port(Some("0")).is_err());
        assert!(parse_port(Some("65536")).is_err());
        assert!(parse_port(Some("not-a-number")).is_err());
    }

    #[test]
    fn rejects_blank_required_field() {
        assert!(require_field("hostname", Some("   ")).is_err());
        assert!(require_field("hostname", None).is_err());
        assert_eq!(require_field("hostname", Some(" host ")).unwrap(), "host");
    }
}
