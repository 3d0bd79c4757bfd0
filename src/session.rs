//! Login sessions.
//!
//! A session is an opaque random token stored server-side and carried in a
//! cookie. Handlers receive an explicit [`SessionContext`] holding the
//! authenticated account instead of reading request-global state.

use std::sync::Arc;
use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::accounts::Account;
use crate::error::DatabaseError;
use crate::store::{Database, StoredSession};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "myinfo_session";

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// The authenticated identity behind a request.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub token: String,
    pub account: Account,
}

/// Generate a fresh 256-bit session token.
pub fn new_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Open a session for `account`.
pub async fn start_session(
    db: &dyn Database,
    account: &Account,
) -> Result<SessionContext, DatabaseError> {
    let session = StoredSession {
        token: new_token(),
        account_id: account.id.clone(),
        created_at: Utc::now(),
    };
    db.create_session(&session).await?;
    info!(account_id = %account.id, "Session started");
    Ok(SessionContext {
        token: session.token,
        account: account.clone(),
    })
}

/// Resolve a token to its session and freshly loaded account.
///
/// Returns `None` for unknown tokens, including sessions removed by a
/// credential change elsewhere. Sessions older than `max_age` are deleted
/// and treated as unknown.
pub async fn resolve(
    db: &dyn Database,
    token: &str,
    max_age: Duration,
) -> Result<Option<SessionContext>, DatabaseError> {
    let Some(session) = db.get_session(token).await? else {
        debug!("Unknown or invalidated session token");
        return Ok(None);
    };
    let age = (Utc::now() - session.created_at)
        .to_std()
        .unwrap_or_default();
    if age > max_age {
        db.delete_session(token).await?;
        info!(account_id = %session.account_id, "Expired session rejected");
        return Ok(None);
    }
    let Some(account) = db.get_account(&session.account_id).await? else {
        db.delete_session(token).await?;
        return Ok(None);
    };
    Ok(Some(SessionContext {
        token: session.token,
        account,
    }))
}

/// End a session.
pub async fn end_session(db: &dyn Database, ctx: &SessionContext) -> Result<(), DatabaseError> {
    db.delete_session(&ctx.token).await?;
    info!(account_id = %ctx.account.id, "Session ended");
    Ok(())
}

/// Delete every session older than `max_age`.
pub async fn sweep_expired(db: &dyn Database, max_age: Duration) -> Result<usize, DatabaseError> {
    let max_age = chrono::Duration::from_std(max_age)
        .map_err(|e| DatabaseError::Query(format!("session max age out of range: {e}")))?;
    let removed = db.delete_expired_sessions(Utc::now() - max_age).await?;
    if removed > 0 {
        info!(removed, "Expired sessions swept");
    }
    Ok(removed)
}

/// Spawn a background task that sweeps expired sessions every few minutes.
pub fn spawn_session_sweep_task(
    db: Arc<dyn Database>,
    max_age: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = sweep_expired(db.as_ref(), max_age).await {
                warn!(error = %e, "Session sweep failed");
            }
        }
    })
}

/// Cookie carrying `token`.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Cookie that clears the session on the client.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}
