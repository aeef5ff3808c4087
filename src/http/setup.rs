//! `POST /`: establishes the SSH connection and parks it in the Pending
//! Session Registry, returning the id a browser presents to `GET /ws`.
//!
//! Accepts both `multipart/form-data` (with `privatekey` as an optional
//! file part) and `application/json` / `application/x-www-form-urlencoded`
//! bodies with the same field names, dispatched manually by `Content-Type`
//! rather than through axum's competing `FromRequest` extractors, so one
//! handler serves both shapes the way the original Tornado handler's
//! `get_argument`/`request.files` transparently did.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::bridge::{LiveSshChannel, Registry, Session};
use crate::ssh::{self, parse_port, require_field, AuthMethod, SshConfig, SshError};

#[derive(Debug, Default, Deserialize)]
struct ConnectFields {
    hostname: Option<String>,
    port: Option<String>,
    username: Option<String>,
    password: Option<String>,
    privatekey: Option<String>,
}

pub async fn connect(
    State(registry): State<Arc<Registry>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let fields = if content_type.starts_with("multipart/form-data") {
        match parse_multipart(&content_type, body).await {
            Ok(fields) => fields,
            Err(resp) => return resp,
        }
    } else if content_type.starts_with("application/json") {
        match serde_json::from_slice::<ConnectFields>(&body) {
            Ok(fields) => fields,
            Err(_) => return bad_request("Invalid request body"),
        }
    } else {
        match serde_urlencoded::from_bytes::<ConnectFields>(&body) {
            Ok(fields) => fields,
            Err(_) => return bad_request("Invalid request body"),
        }
    };

    status_response(establish(&registry, fields).await)
}

async fn establish(registry: &Registry, fields: ConnectFields) -> Result<String, SshError> {
    let config = build_config(fields)?;
    let dest = format!("{}:{}", config.host, config.port);

    let ssh_session = ssh::connect(config).await?;
    let channel = ssh_session.open_shell().await?;

    let id = Registry::new_id();
    let session = Session::new(id.clone(), Box::new(LiveSshChannel::new(channel)));
    let id = registry.insert(session);

    info!("session {} established for {}", id, dest);
    Ok(id)
}

fn build_config(fields: ConnectFields) -> Result<SshConfig, SshError> {
    let host = require_field("hostname", fields.hostname.as_deref())?;
    let username = require_field("username", fields.username.as_deref())?;
    let port = parse_port(fields.port.as_deref())?;

    let auth = match fields.privatekey.filter(|k| !k.trim().is_empty()) {
        Some(key_data) => AuthMethod::PrivateKey {
            key_data,
            password: fields.password.filter(|p| !p.is_empty()),
        },
        None => AuthMethod::Password {
            password: fields.password.unwrap_or_default(),
        },
    };

    Ok(SshConfig::new(host, port, username, auth))
}

/// The gateway always answers `POST /` with HTTP 200; failures are carried
/// in the JSON body's `status` field, matching the original handler. Exactly
/// one of `id`/`status` is ever non-null.
fn status_response(result: Result<String, SshError>) -> Response {
    match result {
        Ok(id) => Json(json!({ "id": id, "status": null })).into_response(),
        Err(e) => {
            warn!("connect request failed: {}", e);
            Json(json!({ "id": null, "status": e.to_string() })).into_response()
        }
    }
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, message.to_string()).into_response()
}

async fn parse_multipart(content_type: &str, body: Bytes) -> Result<ConnectFields, Response> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| bad_request("Invalid multipart boundary"))?;

    let stream = futures_util::stream::once(async move { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut fields = ConnectFields::default();
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|_| bad_request("Malformed multipart body"))?;
        let Some(field) = field else { break };

        let name = field.name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|_| bad_request("Malformed multipart body"))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();

        match name.as_str() {
            "hostname" => fields.hostname = Some(text),
            "port" => fields.port = Some(text),
            "username" => fields.username = Some(text),
            "password" => fields.password = Some(text),
            "privatekey" => fields.privatekey = Some(text),
            _ => {}
        }
    }

    Ok(fields)
}
