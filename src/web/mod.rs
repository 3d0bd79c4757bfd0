//! HTTP surface of the portal.

pub mod extract;
pub mod handlers;
pub mod response;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::PortalConfig;
use crate::rate_limit::{RateLimitKey, RateLimiter, VerbClass};
use crate::store::Database;
use crate::validation::{ContactInfoValidator, CredentialValidator, DirectoryInfoValidator};

pub use extract::Authenticated;

/// Route paths.
pub mod paths {
    pub const INDEX: &str = "/";
    pub const SET_PASSWORD: &str = "/MyInfo/set_password/";
    pub const SET_DIRECTORY: &str = "/MyInfo/set_directory/";
    pub const SET_CONTACT: &str = "/MyInfo/set_contact/";
    pub const PICK_ACTION: &str = "/MyInfo/pick_action/";
    pub const WELCOME: &str = "/MyInfo/welcome/";
    pub const PING: &str = "/MyInfo/ping/";
    pub const NEXT_STEP: &str = "/AccountPickup/next_step/";
    pub const RATE_LIMITED: &str = "/rate_limited/";

    use crate::onboarding::Destination;

    /// Page serving an onboarding destination.
    pub fn for_destination(destination: Destination) -> &'static str {
        match destination {
            Destination::SetPassword => SET_PASSWORD,
            Destination::SetDirectory => SET_DIRECTORY,
            Destination::SetContact => SET_CONTACT,
            Destination::PickAction => PICK_ACTION,
        }
    }
}

/// Shared state for all portal handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub config: Arc<PortalConfig>,
    pub limiter: Arc<RateLimiter>,
    pub credentials: CredentialValidator,
    pub contact: Arc<ContactInfoValidator>,
    pub directory: Arc<DirectoryInfoValidator>,
}

impl AppState {
    /// Build state from configuration. The limiter is created from
    /// `config.rate_limit`.
    pub fn new(db: Arc<dyn Database>, config: PortalConfig) -> Self {
        let limiter = RateLimiter::new(config.rate_limit.clone());
        Self {
            db,
            contact: Arc::new(ContactInfoValidator::new(&config.email_suffix)),
            directory: Arc::new(DirectoryInfoValidator::new(
                config.allowed_companies.clone(),
            )),
            credentials: CredentialValidator::new(),
            config: Arc::new(config),
            limiter,
        }
    }
}

/// Build the portal router.
///
/// Every user-facing route is rate limited. The health check and the
/// rate-limited landing page are not.
pub fn portal_routes(state: AppState) -> Router {
    Router::new()
        .route(
            paths::INDEX,
            get(handlers::login_form).post(handlers::login),
        )
        .route(
            paths::SET_PASSWORD,
            get(handlers::password_form).post(handlers::set_password),
        )
        .route(
            paths::SET_DIRECTORY,
            get(handlers::directory_form).post(handlers::set_directory),
        )
        .route(
            paths::SET_CONTACT,
            get(handlers::contact_form).post(handlers::set_contact),
        )
        .route(paths::PICK_ACTION, get(handlers::pick_action))
        .route(paths::WELCOME, get(handlers::welcome))
        .route(paths::NEXT_STEP, get(handlers::next_step))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_rate_limit,
        ))
        .route(paths::PING, get(handlers::ping))
        .route(paths::RATE_LIMITED, get(handlers::rate_limited))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Count the request against its (client, route, verb class) window and
/// divert to the rate-limited page once the window is exhausted.
async fn enforce_rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let client = client_ip(&req, state.limiter.config().trust_forwarded_for);
    let verb = VerbClass::of(req.method());

    let key = RateLimitKey::new(client, route, verb);
    if state.limiter.check(key).await.is_allowed() {
        next.run(req).await
    } else {
        response::found(paths::RATE_LIMITED)
    }
}

/// Client address: first `X-Forwarded-For` hop when the proxy is trusted,
/// else the socket peer.
fn client_ip(req: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
