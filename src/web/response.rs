//! Response helpers: JSON form views and redirects.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::accounts::MaintenanceNotice;
use crate::error::Error;
use crate::validation::FormErrors;

/// A form as the client should render it.
#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    /// Which form this is (`login`, `set_password`, `change_password`, ...).
    pub form: &'static str,
    /// Whether the view reflects a submission.
    pub bound: bool,
    /// Whether the submitted fields passed validation.
    pub valid: bool,
    pub errors: FormErrors,
    pub initial: serde_json::Value,
    /// Message not tied to a field (e.g. failed login). Empty when none.
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notices: Option<Vec<MaintenanceNotice>>,
}

impl FormView {
    /// An empty, unsubmitted form.
    pub fn unbound(form: &'static str, initial: serde_json::Value) -> Self {
        Self {
            form,
            bound: false,
            valid: false,
            errors: FormErrors::new(),
            initial,
            error: String::new(),
            notices: None,
        }
    }

    /// A submitted form that failed validation.
    pub fn invalid(form: &'static str, errors: FormErrors) -> Self {
        Self {
            form,
            bound: true,
            valid: false,
            errors,
            initial: serde_json::json!({}),
            error: String::new(),
            notices: None,
        }
    }

    pub fn with_notices(mut self, notices: Vec<MaintenanceNotice>) -> Self {
        self.notices = Some(notices);
        self
    }
}

impl IntoResponse for FormView {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Generic 500 for store failures. Details go to the log, not the client.
pub fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": "An internal error occurred. Please try again later."})),
    )
        .into_response()
}

/// Handler failure. Logged and rendered as [`internal_error`].
#[derive(Debug)]
pub struct ServerError(Error);

impl<E> From<E> for ServerError
where
    E: Into<Error>,
{
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "Request failed");
        internal_error()
    }
}

pub type HandlerResult = Result<Response, ServerError>;

/// Login URL that returns to `next` after authentication.
pub fn login_redirect_url(next: &str) -> String {
    format!("{}?next={}", super::paths::INDEX, encode_next(next))
}

/// Percent-encode a local path for use as the `next` query value, keeping
/// `/` readable.
fn encode_next(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for b in path.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Accept `next` only when it is a local absolute path.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}
