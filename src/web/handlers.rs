//! Portal request handlers.
//!
//! GETs render a [`FormView`]; successful POSTs redirect to the next-step
//! resolver, which decides where the account goes from there.

use axum::Json;
use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::paths;
use super::response::{FormView, HandlerResult, found, safe_next};
use super::{AppState, Authenticated};
use crate::accounts::credentials::{
    hash_password_async, verify_password_async, verify_unknown_account,
};
use crate::accounts::{Account, DirectoryInformation};
use crate::error::CredentialError;
use crate::onboarding::ProvisioningStatus;
use crate::session::{self, SessionContext};
use crate::validation::contact::ContactInitial;
use crate::validation::{
    ContactForm, DirectoryForm, FormErrors, PasswordForm, PasswordFormKind, REQUIRED,
};

pub const BAD_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextParam {
    pub next: Option<String>,
}

// ── Login ───────────────────────────────────────────────────────────

/// GET / — login form plus any active maintenance notices.
pub async fn login_form(State(state): State<AppState>) -> HandlerResult {
    let notices = state.db.active_notices(Utc::now()).await?;
    Ok(FormView::unbound("login", json!({"username": ""}))
        .with_notices(notices)
        .into_response())
}

/// POST / — authenticate by Odin username or PSU ID number.
pub async fn login(
    State(state): State<AppState>,
    Query(params): Query<NextParam>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> HandlerResult {
    let notices = state.db.active_notices(Utc::now()).await?;

    let mut errors = FormErrors::new();
    let username = form
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    let password = form.password.as_deref().filter(|p| !p.is_empty());
    if username.is_none() {
        errors.add("username", REQUIRED);
    }
    if password.is_none() {
        errors.add("password", REQUIRED);
    }
    let (Some(username), Some(password)) = (username, password) else {
        return Ok(FormView::invalid("login", errors)
            .with_notices(notices)
            .into_response());
    };

    let account = state.db.find_account_by_login(username).await?;
    let authenticated = match &account {
        Some(account) => check_password(account, password).await?,
        None => verify_unknown_account(password.to_string()).await?,
    };
    let account = match account {
        Some(account) if authenticated => account,
        _ => {
            info!(login = %username, "Rejected login");
            let mut view = FormView::invalid("login", FormErrors::new()).with_notices(notices);
            view.valid = true;
            view.initial = json!({"username": username});
            view.error = BAD_LOGIN.to_string();
            return Ok(view.into_response());
        }
    };

    let ctx = session::start_session(state.db.as_ref(), &account).await?;
    let jar = jar.add(session::session_cookie(ctx.token, state.config.secure_cookies));
    let target = safe_next(params.next.as_deref()).unwrap_or(paths::NEXT_STEP);
    info!(account_id = %account.id, "Login succeeded");
    Ok((jar, found(target)).into_response())
}

/// A corrupt stored hash fails the login instead of the request.
async fn check_password(account: &Account, password: &str) -> Result<bool, CredentialError> {
    match verify_password_async(
        account.id.clone(),
        password.to_string(),
        account.password_hash.clone(),
    )
    .await
    {
        Err(CredentialError::MalformedHash { account_id }) => {
            warn!(account_id = %account_id, "Stored password hash is malformed");
            Ok(false)
        }
        other => other,
    }
}

// ── Onboarding / profile steps ──────────────────────────────────────

/// GET /AccountPickup/next_step/ — send the account to its next step.
pub async fn next_step(Authenticated(ctx): Authenticated) -> HandlerResult {
    let account = &ctx.account;
    let destination = account
        .provisioning_status
        .destination(account.directory_published);
    Ok(found(paths::for_destination(destination)))
}

pub async fn password_form(Authenticated(ctx): Authenticated) -> HandlerResult {
    let kind = PasswordFormKind::for_account(&ctx.account);
    Ok(FormView::unbound(kind.name(), json!({})).into_response())
}

/// POST /MyInfo/set_password/ — set the first password or change it.
///
/// A change signs out every other session of the account.
pub async fn set_password(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Form(form): Form<PasswordForm>,
) -> HandlerResult {
    let account = &ctx.account;
    let kind = PasswordFormKind::for_account(account);
    let new_password = match state.credentials.validate(kind, &form, account).await {
        Ok(password) => password,
        Err(errors) => return Ok(FormView::invalid(kind.name(), errors).into_response()),
    };

    let hash = hash_password_async(new_password).await?;
    state.db.update_password_hash(&account.id, &hash).await?;
    let revoked = state
        .db
        .delete_other_sessions(&account.id, &ctx.token)
        .await?;
    info!(account_id = %account.id, revoked, "Password updated");

    complete_step(&state, &ctx, ProvisioningStatus::NeedsPassword).await?;
    Ok(found(paths::NEXT_STEP))
}

/// GET /MyInfo/set_directory/ — only for accounts published in the directory.
pub async fn directory_form(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
) -> HandlerResult {
    if !ctx.account.directory_published {
        return Ok(found(paths::NEXT_STEP));
    }
    let stored = state.db.get_directory(&ctx.account.id).await?;
    let initial = DirectoryForm::from(stored.as_ref());
    Ok(FormView::unbound("directory", json!(initial)).into_response())
}

pub async fn set_directory(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Form(form): Form<DirectoryForm>,
) -> HandlerResult {
    if !ctx.account.directory_published {
        return Ok(found(paths::NEXT_STEP));
    }
    let departments = state.db.list_departments().await?;
    let info: DirectoryInformation =
        match state.directory.validate(&ctx.account.id, &form, &departments) {
            Ok(info) => info,
            Err(errors) => return Ok(FormView::invalid("directory", errors).into_response()),
        };

    let outcome = state.db.upsert_directory(&info).await?;
    info!(account_id = %ctx.account.id, %outcome, "Directory information saved");

    complete_step(&state, &ctx, ProvisioningStatus::NeedsDirectory).await?;
    Ok(found(paths::NEXT_STEP))
}

pub async fn contact_form(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
) -> HandlerResult {
    let stored = state.db.get_contact(&ctx.account.id).await?;
    let initial = ContactInitial::from(stored.as_ref());
    Ok(FormView::unbound("contact", json!(initial)).into_response())
}

/// POST /MyInfo/set_contact/ — replace the password-reset contact methods.
pub async fn set_contact(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Form(form): Form<ContactForm>,
) -> HandlerResult {
    let contact = match state.contact.validate(&ctx.account.id, &form) {
        Ok(contact) => contact,
        Err(errors) => return Ok(FormView::invalid("contact", errors).into_response()),
    };

    let outcome = state.db.upsert_contact(&contact).await?;
    info!(account_id = %ctx.account.id, %outcome, "Contact information saved");

    complete_step(&state, &ctx, ProvisioningStatus::NeedsContact).await?;
    Ok(found(paths::NEXT_STEP))
}

/// Persist the status change, if any, after `step` was submitted.
async fn complete_step(
    state: &AppState,
    ctx: &SessionContext,
    step: ProvisioningStatus,
) -> Result<(), crate::error::DatabaseError> {
    let account = &ctx.account;
    let current = account.provisioning_status;
    let next = current.complete_step(step, account.directory_published);
    if next != current {
        state.db.set_provisioning_status(&account.id, next).await?;
        info!(account_id = %account.id, from = %current, to = %next, "Provisioning advanced");
    }
    Ok(())
}

// ── Landing pages ───────────────────────────────────────────────────

/// GET /MyInfo/pick_action/ — menu for accounts that finished onboarding.
pub async fn pick_action(Authenticated(ctx): Authenticated) -> HandlerResult {
    let account = &ctx.account;
    if !account.effective_status().is_terminal() {
        return Ok(found(paths::NEXT_STEP));
    }

    let mut actions = vec![
        json!({"name": "change_password", "path": paths::SET_PASSWORD}),
        json!({"name": "update_contact", "path": paths::SET_CONTACT}),
    ];
    if account.directory_published {
        actions.push(json!({"name": "update_directory", "path": paths::SET_DIRECTORY}));
    }

    Ok(Json(json!({
        "username": account.username,
        "psu_id": account.psu_id,
        "actions": actions,
    }))
    .into_response())
}

/// GET /MyInfo/welcome/ — end of the flow. Logs the session out.
pub async fn welcome(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    jar: CookieJar,
) -> HandlerResult {
    session::end_session(state.db.as_ref(), &ctx).await?;
    let jar = jar.remove(session::removal_cookie());
    Ok((
        jar,
        Json(json!({
            "username": ctx.account.username,
            "message": "Your account is ready. You have been signed out."
        })),
    )
        .into_response())
}

/// GET /MyInfo/ping/ — health check against the department table.
pub async fn ping(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.count_departments().await {
        Ok(n) if n > 0 => "Success",
        Ok(_) => "Database not available!",
        Err(e) => {
            warn!(error = %e, "Health check query failed");
            "Database not available!"
        }
    }
}

/// GET /rate_limited/ — where throttled requests are sent.
pub async fn rate_limited() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "error": "Too many requests. Please wait a minute and try again."
        })),
    )
}
