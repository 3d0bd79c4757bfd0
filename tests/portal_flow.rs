//! End-to-end tests of the portal router.
//!
//! Each test builds the full router over an in-memory database and drives it
//! with `oneshot` requests, carrying the session cookie by hand.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use chrono::{Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;

use myinfo::accounts::credentials::hash_password;
use myinfo::accounts::{Account, ContactInformation, MaintenanceNotice};
use myinfo::config::PortalConfig;
use myinfo::onboarding::ProvisioningStatus;
use myinfo::store::{Database, LibSqlBackend, StoredSession};
use myinfo::web::{AppState, paths, portal_routes};

const PASSWORD: &str = "Summer-2024x";
const NEW_PASSWORD: &str = "Winter-2025y";
const CLIENT_IP: &str = "198.51.100.10";

struct Portal {
    app: Router,
    db: Arc<LibSqlBackend>,
}

fn account(id: &str, username: &str, psu_id: &str, hash: &str) -> Account {
    Account {
        id: id.to_string(),
        username: username.to_string(),
        psu_id: psu_id.to_string(),
        password_hash: hash.to_string(),
        provisioning_status: ProvisioningStatus::Complete,
        directory_published: true,
    }
}

/// Router with three accounts sharing `PASSWORD`:
/// - `jdoe` (111111111): onboarded employee
/// - `newbie` (222222222): fresh employee, needs everything
/// - `student` (333333333): unpublished, stuck before the directory step
async fn portal() -> Portal {
    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let hash = hash_password(PASSWORD).unwrap();

    db.upsert_account(&account("uuid-jdoe", "jdoe", "111111111", &hash))
        .await
        .unwrap();
    db.upsert_account(&Account {
        provisioning_status: ProvisioningStatus::NeedsPassword,
        ..account("uuid-newbie", "newbie", "222222222", &hash)
    })
    .await
    .unwrap();
    db.upsert_account(&Account {
        provisioning_status: ProvisioningStatus::NeedsDirectory,
        directory_published: false,
        ..account("uuid-student", "student", "333333333", &hash)
    })
    .await
    .unwrap();
    db.add_department("Office of Information Technology")
        .await
        .unwrap();

    let mut config = PortalConfig::default();
    config.rate_limit.trust_forwarded_for = true;
    let state = AppState::new(db.clone(), config);
    Portal {
        app: portal_routes(state),
        db,
    }
}

async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

fn get(path: &str, cookie: Option<&str>) -> Request<Body> {
    get_from(path, cookie, CLIENT_IP)
}

fn get_from(path: &str, cookie: Option<&str>, ip: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri(path)
        .header("x-forwarded-for", ip);
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(path: &str, form: &str, cookie: Option<&str>) -> Request<Body> {
    post_from(path, form, cookie, CLIENT_IP)
}

fn post_from(path: &str, form: &str, cookie: Option<&str>, ip: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", ip);
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::from(form.to_string())).unwrap()
}

fn location(resp: &Response<Body>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .expect("redirect has a Location header")
        .to_str()
        .unwrap()
}

/// `name=value` of the session cookie set by a response.
fn session_cookie(resp: &Response<Body>) -> String {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("myinfo_session="))
        .and_then(|v| v.split(';').next())
        .expect("session cookie is set")
        .to_string()
}

async fn json(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn text(resp: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let resp = send(
        app,
        post("/", &format!("username={username}&password={password}"), None),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND, "login for {username}");
    session_cookie(&resp)
}

/// GET the next-step resolver and return where it points.
async fn next_step(app: &Router, cookie: &str) -> String {
    let resp = send(app, get(paths::NEXT_STEP, Some(cookie))).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    location(&resp).to_string()
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn login_then_next_step_reaches_pick_action() {
    let portal = portal().await;

    let resp = send(
        &portal.app,
        post("/", &format!("username=jdoe&password={PASSWORD}"), None),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), paths::NEXT_STEP);
    let cookie = session_cookie(&resp);

    assert_eq!(next_step(&portal.app, &cookie).await, paths::PICK_ACTION);

    let resp = send(&portal.app, get(paths::PICK_ACTION, Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json(resp).await;
    assert_eq!(body["username"], "jdoe");
    let actions: Vec<&str> = body["actions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert!(actions.contains(&"update_directory"));
}

#[tokio::test]
async fn login_by_psu_id_honors_local_next() {
    let portal = portal().await;

    let resp = send(
        &portal.app,
        post(
            "/?next=/MyInfo/set_contact/",
            &format!("username=111111111&password={PASSWORD}"),
            None,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), paths::SET_CONTACT);

    let resp = send(
        &portal.app,
        post(
            "/?next=https://evil.example/",
            &format!("username=jdoe&password={PASSWORD}"),
            None,
        ),
    )
    .await;
    assert_eq!(location(&resp), paths::NEXT_STEP);
}

#[tokio::test]
async fn bad_credentials_keep_the_form_with_an_error() {
    let portal = portal().await;

    let resp = send(&portal.app, post("/", "username=jdoe&password=nope", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    let body = json(resp).await;
    assert_eq!(body["valid"], true);
    assert!(!body["error"].as_str().unwrap().is_empty());

    let resp = send(&portal.app, post("/", "username=ghost&password=nope", None)).await;
    assert!(!json(resp).await["error"].as_str().unwrap().is_empty());

    let resp = send(&portal.app, post("/", "username=jdoe", None)).await;
    let body = json(resp).await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["errors"]["password"][0], "This field is required.");
    assert_eq!(body["error"], "");
}

#[tokio::test]
async fn unauthenticated_requests_go_to_login() {
    let portal = portal().await;

    let resp = send(&portal.app, get(paths::PICK_ACTION, None)).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/?next=/MyInfo/pick_action/");

    let resp = send(
        &portal.app,
        get(paths::NEXT_STEP, Some("myinfo_session=not-a-session")),
    )
    .await;
    assert_eq!(location(&resp), "/?next=/AccountPickup/next_step/");
}

#[tokio::test]
async fn login_page_lists_only_active_notices() {
    let portal = portal().await;
    let now = Utc::now();
    portal
        .db
        .insert_notice(&MaintenanceNotice::new(
            "Maintenance tonight",
            now - Duration::hours(1),
            now + Duration::hours(1),
        ))
        .await
        .unwrap();
    portal
        .db
        .insert_notice(&MaintenanceNotice::new(
            "Old outage",
            now - Duration::days(2),
            now - Duration::days(1),
        ))
        .await
        .unwrap();

    let resp = send(&portal.app, get("/", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json(resp).await;
    assert_eq!(body["form"], "login");
    let notices = body["notices"].as_array().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0]["message"], "Maintenance tonight");
}

// ── Onboarding ──────────────────────────────────────────────────────

#[tokio::test]
async fn new_account_walks_every_step() {
    let portal = portal().await;
    let cookie = login(&portal.app, "newbie", PASSWORD).await;

    // Not onboarded yet, so the menu sends it back to the resolver.
    let resp = send(&portal.app, get(paths::PICK_ACTION, Some(&cookie))).await;
    assert_eq!(location(&resp), paths::NEXT_STEP);

    assert_eq!(next_step(&portal.app, &cookie).await, paths::SET_PASSWORD);
    let resp = send(&portal.app, get(paths::SET_PASSWORD, Some(&cookie))).await;
    assert_eq!(json(resp).await["form"], "set_password");

    let resp = send(
        &portal.app,
        post(
            paths::SET_PASSWORD,
            &format!("new_password={NEW_PASSWORD}&confirm_password={NEW_PASSWORD}"),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(location(&resp), paths::NEXT_STEP);
    assert_eq!(next_step(&portal.app, &cookie).await, paths::SET_DIRECTORY);

    let resp = send(
        &portal.app,
        post(
            paths::SET_DIRECTORY,
            "company=Portland+State+University&department=Office+of+Information+Technology&job_title=Analyst",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(location(&resp), paths::NEXT_STEP);
    assert_eq!(next_step(&portal.app, &cookie).await, paths::SET_CONTACT);

    let resp = send(
        &portal.app,
        post(
            paths::SET_CONTACT,
            "alternate_email=newbie%40example.com&cell_phone=",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(location(&resp), paths::NEXT_STEP);
    assert_eq!(next_step(&portal.app, &cookie).await, paths::PICK_ACTION);

    let stored = portal.db.get_account("uuid-newbie").await.unwrap().unwrap();
    assert_eq!(stored.provisioning_status, ProvisioningStatus::Complete);
    let directory = portal.db.get_directory("uuid-newbie").await.unwrap().unwrap();
    assert_eq!(directory.job_title.as_deref(), Some("Analyst"));
}

#[tokio::test]
async fn invalid_password_submission_rerenders_form() {
    let portal = portal().await;
    let cookie = login(&portal.app, "newbie", PASSWORD).await;

    let resp = send(
        &portal.app,
        post(
            paths::SET_PASSWORD,
            &format!("new_password={NEW_PASSWORD}&confirm_password=Different-1"),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json(resp).await;
    assert_eq!(body["form"], "set_password");
    assert_eq!(body["valid"], false);
    assert!(body["errors"]["confirm_password"].is_array());

    assert_eq!(next_step(&portal.app, &cookie).await, paths::SET_PASSWORD);
}

#[tokio::test]
async fn unpublished_account_skips_directory() {
    let portal = portal().await;
    let cookie = login(&portal.app, "student", PASSWORD).await;

    assert_eq!(next_step(&portal.app, &cookie).await, paths::SET_CONTACT);

    let resp = send(&portal.app, get(paths::SET_DIRECTORY, Some(&cookie))).await;
    assert_eq!(location(&resp), paths::NEXT_STEP);

    let resp = send(
        &portal.app,
        post(
            paths::SET_DIRECTORY,
            "company=Portland+State+University",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(location(&resp), paths::NEXT_STEP);
    assert!(portal.db.get_directory("uuid-student").await.unwrap().is_none());
}

// ── Profile maintenance ─────────────────────────────────────────────

#[tokio::test]
async fn password_change_signs_out_other_sessions() {
    let portal = portal().await;
    let here = login(&portal.app, "jdoe", PASSWORD).await;
    let elsewhere = login(&portal.app, "jdoe", PASSWORD).await;

    let resp = send(&portal.app, get(paths::SET_PASSWORD, Some(&here))).await;
    assert_eq!(json(resp).await["form"], "change_password");

    let resp = send(
        &portal.app,
        post(
            paths::SET_PASSWORD,
            &format!(
                "current_password={PASSWORD}&new_password={NEW_PASSWORD}&confirm_password={NEW_PASSWORD}"
            ),
            Some(&here),
        ),
    )
    .await;
    assert_eq!(location(&resp), paths::NEXT_STEP);

    let resp = send(&portal.app, get(paths::PICK_ACTION, Some(&here))).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&portal.app, get(paths::PICK_ACTION, Some(&elsewhere))).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/?next=/MyInfo/pick_action/");

    // Old password no longer works.
    let resp = send(
        &portal.app,
        post("/", &format!("username=jdoe&password={PASSWORD}"), None),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn first_password_signs_out_other_sessions() {
    let portal = portal().await;
    let here = login(&portal.app, "newbie", PASSWORD).await;
    let elsewhere = login(&portal.app, "newbie", PASSWORD).await;

    let resp = send(
        &portal.app,
        post(
            paths::SET_PASSWORD,
            &format!("new_password={NEW_PASSWORD}&confirm_password={NEW_PASSWORD}"),
            Some(&here),
        ),
    )
    .await;
    assert_eq!(location(&resp), paths::NEXT_STEP);
    assert_eq!(next_step(&portal.app, &here).await, paths::SET_DIRECTORY);

    let resp = send(&portal.app, get(paths::NEXT_STEP, Some(&elsewhere))).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/?next=/AccountPickup/next_step/");
}

#[tokio::test]
async fn contact_round_trip_replaces_both_fields() {
    let portal = portal().await;
    let cookie = login(&portal.app, "jdoe", PASSWORD).await;

    let stored = |cookie: String| {
        let app = portal.app.clone();
        async move {
            let resp = send(&app, get(paths::SET_CONTACT, Some(&cookie))).await;
            json(resp).await["initial"].clone()
        }
    };

    let resp = send(
        &portal.app,
        post(
            paths::SET_CONTACT,
            "alternate_email=jdoe%40example.com",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(location(&resp), paths::NEXT_STEP);
    assert_eq!(
        stored(cookie.clone()).await,
        serde_json::json!({"alternate_email": "jdoe@example.com", "cell_phone": ""})
    );

    // Omitting a field clears it.
    let resp = send(
        &portal.app,
        post(paths::SET_CONTACT, "cell_phone=503-867-5309", Some(&cookie)),
    )
    .await;
    assert_eq!(location(&resp), paths::NEXT_STEP);
    assert_eq!(
        stored(cookie.clone()).await,
        serde_json::json!({"alternate_email": "", "cell_phone": "503-867-5309"})
    );

    let resp = send(
        &portal.app,
        post(
            paths::SET_CONTACT,
            "alternate_email=jdoe%40example.org&cell_phone=%2B1+503+555+0100",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(location(&resp), paths::NEXT_STEP);
    assert_eq!(
        stored(cookie.clone()).await,
        serde_json::json!({"alternate_email": "jdoe@example.org", "cell_phone": "+1 503 555 0100"})
    );

    let contact = portal.db.get_contact("uuid-jdoe").await.unwrap().unwrap();
    assert_eq!(contact.alternate_email.as_deref(), Some("jdoe@example.org"));
    assert_eq!(contact.cell_phone.as_deref(), Some("+1 503 555 0100"));
}

#[tokio::test]
async fn contact_form_shows_stored_values() {
    let portal = portal().await;
    portal
        .db
        .upsert_contact(&ContactInformation {
            account_id: "uuid-jdoe".into(),
            cell_phone: Some("503-867-5309".into()),
            alternate_email: Some("jdoe@example.com".into()),
        })
        .await
        .unwrap();
    let cookie = login(&portal.app, "jdoe", PASSWORD).await;

    let resp = send(&portal.app, get(paths::SET_CONTACT, Some(&cookie))).await;
    let body = json(resp).await;
    assert_eq!(body["form"], "contact");
    assert_eq!(body["bound"], false);
    assert_eq!(body["initial"]["alternate_email"], "jdoe@example.com");
    assert_eq!(body["initial"]["cell_phone"], "503-867-5309");
}

#[tokio::test]
async fn contact_rejects_institutional_email() {
    let portal = portal().await;
    let cookie = login(&portal.app, "jdoe", PASSWORD).await;

    let resp = send(
        &portal.app,
        post(
            paths::SET_CONTACT,
            "alternate_email=someone%40PDX.edu",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json(resp).await;
    assert_eq!(
        body["errors"]["alternate_email"][0],
        "Alternate Email can not be an @pdx.edu address."
    );

    let resp = send(&portal.app, post(paths::SET_CONTACT, "", Some(&cookie))).await;
    let body = json(resp).await;
    assert!(body["errors"]["__all__"].is_array());
}

#[tokio::test]
async fn welcome_ends_the_session() {
    let portal = portal().await;
    let cookie = login(&portal.app, "jdoe", PASSWORD).await;

    let resp = send(&portal.app, get(paths::WELCOME, Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&portal.app, get(paths::PICK_ACTION, Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(location(&resp).starts_with("/?next="));
}

#[tokio::test]
async fn sessions_past_max_age_go_back_to_login() {
    let portal = portal().await;
    portal
        .db
        .create_session(&StoredSession {
            token: "stale-token".into(),
            account_id: "uuid-jdoe".into(),
            created_at: Utc::now() - Duration::days(3650),
        })
        .await
        .unwrap();

    let resp = send(
        &portal.app,
        get(paths::PICK_ACTION, Some("myinfo_session=stale-token")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/?next=/MyInfo/pick_action/");
    assert!(portal.db.get_session("stale-token").await.unwrap().is_none());

    let fresh = login(&portal.app, "jdoe", PASSWORD).await;
    let resp = send(&portal.app, get(paths::PICK_ACTION, Some(&fresh))).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

// ── Health and throttling ───────────────────────────────────────────

#[tokio::test]
async fn ping_reports_database_state() {
    let portal = portal().await;

    let resp = send(&portal.app, get(paths::PING, None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(text(resp).await, "Success");

    portal.db.clear_departments().await.unwrap();
    let resp = send(&portal.app, get(paths::PING, None)).await;
    assert_eq!(text(resp).await, "Database not available!");
}

#[tokio::test]
async fn posts_are_limited_separately_from_gets() {
    let portal = portal().await;
    let ip = "203.0.113.99";

    // Incomplete logins never reach password hashing.
    for i in 0..30 {
        let resp = send(&portal.app, post_from("/", "username=jdoe", None, ip)).await;
        assert_eq!(resp.status(), StatusCode::OK, "POST {}", i + 1);
    }
    let resp = send(&portal.app, post_from("/", "username=jdoe", None, ip)).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), paths::RATE_LIMITED);

    // Reads have their own budget, and other clients are unaffected.
    for i in 0..31 {
        let resp = send(&portal.app, get_from("/", None, ip)).await;
        assert_eq!(resp.status(), StatusCode::OK, "GET {}", i + 1);
    }
    let resp = send(
        &portal.app,
        post_from("/", "username=jdoe", None, "203.0.113.100"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&portal.app, get_from(paths::RATE_LIMITED, None, ip)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
