use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use leornian_api::{create_router, AppState};
use leornian_core::captcha::CaptchaTransport;
use leornian_core::db::open_db;
use leornian_core::mail::OutboxMailer;
use leornian_core::model::note::NewNote;
use leornian_core::model::user::{NewUser, User};
use leornian_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use leornian_core::service::note_service::NoteService;
use leornian_core::{Note, Settings};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct AcceptingCaptcha;

impl CaptchaTransport for AcceptingCaptcha {
    fn siteverify(&self, _form: &[(&str, &str)]) -> Result<Value, String> {
        Ok(json!({ "success": true }))
    }
}

struct Fixture {
    _dir: TempDir,
    router: Router,
    mailer: Arc<OutboxMailer>,
    db_path: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("leornian.sqlite3");
    let lookup_path = db_path.display().to_string();
    let settings = Settings::from_lookup(|key| match key {
        "LEOR_DB_PATH" => Some(lookup_path.clone()),
        "LEOR_SITE_URL" => Some("https://leornian.test".to_string()),
        "LEOR_ADMINS" => Some("admin@example.com".to_string()),
        _ => None,
    })
    .unwrap();
    drop(open_db(&db_path).unwrap());

    let mailer = Arc::new(OutboxMailer::new());
    let state = Arc::new(AppState {
        settings,
        mailer: mailer.clone(),
        captcha: Arc::new(AcceptingCaptcha),
    });
    Fixture {
        _dir: dir,
        router: create_router(state),
        mailer,
        db_path,
    }
}

fn seed_user(db_path: &Path, username: &str) -> User {
    let conn = open_db(db_path).unwrap();
    SqliteUserRepository::try_new(&conn)
        .unwrap()
        .create_user(&NewUser::new(username, format!("{username}@example.com")), 0)
        .unwrap()
}

fn seed_note(db_path: &Path, author: &User, text: &str) -> Note {
    let mut conn = open_db(db_path).unwrap();
    NoteService::new(&mut conn)
        .create_note(author, &NewNote::new(text))
        .unwrap()
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-Remote-User", user);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let fx = fixture();
    let (status, body) = send(&fx.router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn note_resource_has_links_and_rendered_html() {
    let fx = fixture();
    let mary = seed_user(&fx.db_path, "mary");
    let note = seed_note(&fx.db_path, &mary, "Hello *there*");

    let (status, body) = send(&fx.router, "GET", &format!("/api/notes/{}", note.code), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], note.code.as_str());
    assert_eq!(body["url"], format!("https://leornian.test/api/notes/{}", note.code));
    assert_eq!(body["html"], "<p>Hello <em>there</em></p>\n");
    assert_eq!(body["visibility"], 1);
    assert_eq!(body["visibility_label"], "Normal");
    assert_eq!(body["visibility_locked"], false);
    assert_eq!(body["author"], "mary");
    assert_eq!(body["author_url"], "https://leornian.test/api/authors/mary");

    let (status, _) = send(&fx.router, "GET", "/api/notes/ZZZZZZZZZ", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preview_renders_or_rejects_text() {
    let fx = fixture();
    let (status, body) = send(
        &fx.router,
        "POST",
        "/api/notes/preview_html",
        None,
        Some(json!({ "text": "**bold**" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["html"], "<p><strong>bold</strong></p>\n");

    let (status, body) = send(
        &fx.router,
        "POST",
        "/api/notes/preview_html",
        None,
        Some(json!({ "text": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "text");
}

#[tokio::test]
async fn collection_routes_require_a_known_user() {
    let fx = fixture();
    let (status, _) = send(&fx.router, "GET", "/api/collection", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&fx.router, "GET", "/api/collection", Some("ghost"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&fx.router, "GET", "/api/drill", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn save_list_and_unsave() {
    let fx = fixture();
    let mary = seed_user(&fx.db_path, "mary");
    seed_user(&fx.db_path, "bob");
    let note = seed_note(&fx.db_path, &mary, "shared");

    let save_uri = format!("/api/collection/{}/save", note.code);
    let (status, body) = send(&fx.router, "POST", &save_uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    let (_, body) = send(&fx.router, "POST", &save_uri, Some("bob"), None).await;
    assert_eq!(body["changed"], false);

    let (status, body) = send(&fx.router, "GET", "/api/collection?page=3", Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["number"], 1);
    assert_eq!(body["items"][0]["code"], note.code.as_str());

    let unsave_uri = format!("/api/collection/{}/unsave", note.code);
    let (_, body) = send(&fx.router, "POST", &unsave_uri, Some("bob"), None).await;
    assert_eq!(body["saved"], false);
    assert_eq!(body["changed"], true);

    let (status, _) = send(
        &fx.router,
        "POST",
        "/api/collection/ZZZZZZZZZ/save",
        Some("bob"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn author_listing_hides_unknown_authors() {
    let fx = fixture();
    let mary = seed_user(&fx.db_path, "mary");
    seed_note(&fx.db_path, &mary, "one");
    seed_note(&fx.db_path, &mary, "two");

    let (status, body) = send(&fx.router, "GET", "/api/authors/mary", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (status, _) = send(&fx.router, "GET", "/api/authors/nobody", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn drill_peek_and_draw() {
    let fx = fixture();
    let mary = seed_user(&fx.db_path, "mary");
    let first = seed_note(&fx.db_path, &mary, "first");

    let (status, body) = send(&fx.router, "GET", "/api/drill", Some("mary"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "disable_begin": true, "recent_count": 1 }));

    let (status, body) = send(&fx.router, "POST", "/api/drill/draw", Some("mary"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "error": "insufficient-collection" }));

    seed_note(&fx.db_path, &mary, "second");
    let (status, body) = send(
        &fx.router,
        "POST",
        "/api/drill/draw",
        Some("mary"),
        Some(json!({ "promote": first.code.clone() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["note"]["code"], first.code.as_str());
    assert_eq!(body["promoted"], true);
    assert_eq!(body["recent_count"], 2);
}

#[tokio::test]
async fn anonymous_contact_is_stored_and_admins_notified() {
    let fx = fixture();
    let (status, body) = send(
        &fx.router,
        "POST",
        "/api/support/contact",
        None,
        Some(json!({ "subject": "Hi", "message": "Question", "captcha": "token" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].as_str().is_some());
    assert_eq!(fx.mailer.sent().len(), 1);

    let (status, body) = send(
        &fx.router,
        "POST",
        "/api/support/contact",
        None,
        Some(json!({ "subject": "Hi", "message": "Question" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "captcha");
}
