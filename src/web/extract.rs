//! Session extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use tracing::error;

use super::AppState;
use super::response::{found, internal_error, login_redirect_url};
use crate::session::{self, SESSION_COOKIE, SessionContext};

/// An authenticated request. Rejects by redirecting to the login page with
/// the requested path as `next`.
#[derive(Debug, Clone)]
pub struct Authenticated(pub SessionContext);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let next = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        let jar = CookieJar::from_headers(&parts.headers);

        let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
            return Err(found(&login_redirect_url(&next)));
        };

        match session::resolve(state.db.as_ref(), &token, state.config.session_max_age).await {
            Ok(Some(ctx)) => Ok(Authenticated(ctx)),
            Ok(None) => Err((
                jar.remove(session::removal_cookie()),
                found(&login_redirect_url(&next)),
            )
                .into_response()),
            Err(e) => {
                error!(error = %e, "Failed to resolve session");
                Err(internal_error())
            }
        }
    }
}
