//! `GET /`: a minimal placeholder page.
//!
//! HTML templating and static asset serving are out of scope for this
//! gateway — a real deployment fronts it with its own web server or a
//! bundled JS terminal client. This stands in for that external
//! collaborator just far enough to prove the route exists.

use axum::response::Html;

pub async fn index() -> Html<&'static str> {
    Html("<!doctype html><html><body><p>sshgate is running.</p></body></html>")
}
