//! End-to-end tests against the router, driven with `oneshot`

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use papervault_common::config::{AppConfig, PasswordHashConfig};
use papervault_common::db::models::Role;
use papervault_common::db::CredentialStore;
use papervault_common::mail::MemoryMailer;
use papervault_common::services::AppServices;
use papervault_gateway::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const PASSWORD: &str = "correct horse battery";
const BOUNDARY: &str = "papervault-test-boundary";

struct TestServer {
    router: Router,
    services: AppServices,
    mailer: MemoryMailer,
    _dir: TempDir,
}

async fn spawn() -> TestServer {
    let dir = tempfile::tempdir().unwrap();

    let mut config = AppConfig::default();
    config.database.url = format!("sqlite://{}?mode=rwc", dir.path().join("api.db").display());
    config.database.max_connections = 4;
    config.storage.upload_root = dir.path().join("uploads");
    config.storage.max_upload_bytes = 4096;
    config.auth.password_hash = PasswordHashConfig {
        memory_kib: 256,
        iterations: 1,
        parallelism: 1,
    };
    config.rate_limit.enabled = false;

    let mailer = MemoryMailer::new();
    let services = AppServices::build(&config, Arc::new(mailer.clone()))
        .await
        .unwrap();

    let router = create_router(AppState {
        config: Arc::new(config),
        services: services.clone(),
    });

    TestServer {
        router,
        services,
        mailer,
        _dir: dir,
    }
}

impl TestServer {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn register(&self, name: &str) -> Value {
        let (status, body) = self
            .send(json_request(
                "POST",
                "/auth/register",
                json!({
                    "username": name,
                    "email": format!("{}@example.com", name),
                    "password": PASSWORD,
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    /// Registers and logs in, returning the session token
    async fn login(&self, name: &str) -> String {
        self.register(name).await;
        let (status, body) = self
            .send(json_request(
                "POST",
                "/auth/login",
                json!({ "email": format!("{}@example.com", name), "password": PASSWORD }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn upload_request(token: &str, title: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in [("title", title), ("subject", "Physics"), ("year", "2021")] {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/papers")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let server = spawn().await;

    let (status, body) = server
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = server
        .send(Request::get("/ready").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"]["status"], "up");
}

#[tokio::test]
async fn test_login_sets_cookie_usable_for_me() {
    let server = spawn().await;
    server.register("alice").await;

    let response = server
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "ALICE@example.com", "password": PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("papervault_session=pvs_"));
    assert!(cookie.contains("HttpOnly"));

    let pair = cookie.split(';').next().unwrap().to_string();
    let (status, body) = server
        .send(
            Request::get("/me")
                .header(header::COOKIE, pair)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn test_bad_login_is_generic() {
    let server = spawn().await;
    server.register("alice").await;

    let (wrong_status, wrong) = server
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "alice@example.com", "password": "not the password" }),
        ))
        .await;
    let (unknown_status, unknown) = server
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "nobody@example.com", "password": PASSWORD }),
        ))
        .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, unknown_status);
    assert_eq!(wrong, unknown);
    assert_eq!(wrong["error"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let server = spawn().await;
    server.register("alice").await;

    let (status, body) = server
        .send(json_request(
            "POST",
            "/auth/register",
            json!({ "username": "alice2", "email": "Alice@Example.com", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["field"], "email");
}

#[tokio::test]
async fn test_anonymous_cannot_browse() {
    let server = spawn().await;

    let (status, body) = server
        .send(Request::get("/papers").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_upload_search_download() {
    let server = spawn().await;
    let token = server.login("alice").await;

    let (status, paper) = server
        .send(upload_request(&token, "Mechanics Final", "exam.pdf", b"%PDF-1.4 exam"))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", paper);
    assert_eq!(paper["filename"], "exam.pdf");
    assert_eq!(paper["year"], "2021");

    let (status, page) = server
        .send(authed("GET", "/papers?title=mechanics", &token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["title"], "Mechanics Final");

    let id = paper["id"].as_i64().unwrap();
    let response = server
        .router
        .clone()
        .oneshot(authed("GET", &format!("/papers/{}/file", id), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"%PDF-1.4 exam");
}

#[tokio::test]
async fn test_upload_rejects_executable() {
    let server = spawn().await;
    let token = server.login("alice").await;

    let (status, body) = server
        .send(upload_request(&token, "Not a paper", "setup.exe", b"MZ"))
        .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["code"], "UNSUPPORTED_TYPE");

    let (_, page) = server.send(authed("GET", "/papers", &token)).await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_upload_too_large() {
    let server = spawn().await;
    let token = server.login("alice").await;

    let (status, body) = server
        .send(upload_request(&token, "Huge", "huge.pdf", &[b'x'; 5000]))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "TOO_LARGE");
}

#[tokio::test]
async fn test_upload_past_body_limit_is_too_large() {
    let server = spawn().await;
    let token = server.login("alice").await;

    // Larger than the request body limit, not just the stored-file limit
    let (status, body) = server
        .send(upload_request(&token, "Huge", "huge.pdf", &vec![b'x'; 200 * 1024]))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "TOO_LARGE");

    let (_, page) = server.send(authed("GET", "/papers", &token)).await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_non_admin_gets_forbidden() {
    let server = spawn().await;
    let token = server.login("mallory").await;

    let (status, _) = server.send(authed("GET", "/admin/users", &token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server
        .send(Request::get("/admin/users").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_ban_revokes_access() {
    let server = spawn().await;
    let admin_token = server.login("root").await;
    let user_token = server.login("bob").await;

    let credentials = CredentialStore::new(server.services.pool.clone());
    let admin = credentials.find_by_email("root@example.com").await.unwrap().unwrap();
    credentials.set_role(admin.id, Role::Admin).await.unwrap();
    let bob = credentials.find_by_email("bob@example.com").await.unwrap().unwrap();

    let (status, body) = server
        .send(authed("POST", &format!("/admin/users/{}/ban", bob.id), &admin_token))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["outcome"], "applied");
    assert_eq!(body["user"]["banned"], true);

    let (status, _) = server.send(authed("GET", "/me", &user_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = server
        .send(authed("POST", &format!("/admin/users/{}/ban", bob.id), &admin_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "unchanged");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let server = spawn().await;
    let token = server.login("alice").await;

    let response = server
        .router
        .clone()
        .oneshot(authed("POST", "/auth/logout", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let (status, _) = server.send(authed("GET", "/me", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let server = spawn().await;
    server.register("alice").await;

    let (status, known) = server
        .send(json_request(
            "POST",
            "/auth/password-reset",
            json!({ "email": "alice@example.com" }),
        ))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, unknown) = server
        .send(json_request(
            "POST",
            "/auth/password-reset",
            json!({ "email": "ghost@example.com" }),
        ))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(known, unknown);
    assert_eq!(server.mailer.sent_count(), 1);

    let token = server.mailer.last_token_for("alice@example.com").unwrap();
    let (status, _) = server
        .send(json_request(
            "POST",
            "/auth/password-reset/confirm",
            json!({ "token": token, "password": "a brand new secret" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server
        .send(json_request(
            "POST",
            "/auth/password-reset/confirm",
            json!({ "token": token, "password": "another new secret" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "RESET_TOKEN_INVALID");

    let (status, _) = server
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "alice@example.com", "password": "a brand new secret" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}
