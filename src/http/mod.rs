//! HTTP/WS Front: the browser-facing half of the gateway.

mod assets;
mod front;
mod setup;
mod ws;

pub use front::router;
