//! End-to-end verification against a stub Discord.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Form, Json, Router,
    body::{Body, to_bytes},
    extract::{Path, State},
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};

use gatehouse_model::Id;
use gatehouse_server::{
    app::AppState,
    config::{Config, DiscordConfig, Secret, ServerConfig},
    routes, store,
};

use serde_json::{Value, json};

use tower::ServiceExt as _;

const GUILD_ID: u64 = 1200000000000000002;
const ROLE_ID: u64 = 1300000000000000003;
const USER_ID: &str = "80351110224678912";

const CODE: &str = "NhhvTDYsFcdgNLnnLijcl7Ku7bEEeee";
const EXPIRED_CODE: &str = "expiredexpiredexpiredexpiredxx";

const ACCESS_TOKEN: &str = "6qrZcUqja7812RVdnEKjpzOL4CvHBFG";
const BOT_TOKEN: &str = "bot-token";

/// How the stub answers.
#[derive(Clone, Debug)]
struct Scenario {
    /// The roles the user holds, or `None` if they aren't a member.
    roles: Option<Vec<u64>>,
    /// Whether the guild shows up in the user's guild list.
    listed: bool,
    /// Whether the bot may assign roles.
    can_assign: bool,
    /// Whether the user's token is refused for `/users/@me`.
    reject_user: bool,
    /// Whether the user's token is refused for `/users/@me/guilds`.
    reject_guilds: bool,
    /// Whether the member lookup answers with something other than JSON.
    garbled_member: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            roles: Some(Vec::new()),
            listed: true,
            can_assign: true,
            reject_user: false,
            reject_guilds: false,
            garbled_member: false,
        }
    }
}

#[derive(Debug, Default)]
struct Calls {
    token: AtomicUsize,
    user: AtomicUsize,
    member: AtomicUsize,
    role: AtomicUsize,
    guilds: AtomicUsize,
    audit_reason: Mutex<Option<String>>,
}

impl Calls {
    fn total(&self) -> usize {
        self.token.load(Ordering::SeqCst)
            + self.user.load(Ordering::SeqCst)
            + self.member.load(Ordering::SeqCst)
            + self.role.load(Ordering::SeqCst)
            + self.guilds.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct Stub {
    scenario: Scenario,
    calls: Calls,
}

type StubState = State<Arc<Stub>>;

fn authorized(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(expected)
}

fn bearer() -> String {
    format!("Bearer {}", ACCESS_TOKEN)
}

fn bot() -> String {
    format!("Bot {}", BOT_TOKEN)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "401: Unauthorized", "code": 0})),
    )
        .into_response()
}

async fn token(State(stub): StubState, Form(form): Form<HashMap<String, String>>) -> Response {
    stub.calls.token.fetch_add(1, Ordering::SeqCst);

    assert_eq!(form["grant_type"], "authorization_code");
    assert_eq!(form["client_secret"], "hunter2");
    assert_eq!(form["redirect_uri"], "http://localhost:3000/verify/callback");

    if form["code"] != CODE {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid \"code\" in request."
            })),
        )
            .into_response();
    }

    Json(json!({
        "access_token": ACCESS_TOKEN,
        "token_type": "Bearer",
        "expires_in": 604800,
        "refresh_token": "D43f5y0ahjqew82jZ4NViEr2YafMKhue",
        "scope": "identify guilds guilds.members.read"
    }))
    .into_response()
}

async fn current_user(State(stub): StubState, headers: HeaderMap) -> Response {
    stub.calls.user.fetch_add(1, Ordering::SeqCst);

    if stub.scenario.reject_user || !authorized(&headers, &bearer()) {
        return unauthorized();
    }

    Json(json!({
        "id": USER_ID,
        "username": "nelly",
        "discriminator": "1337",
        "global_name": "Nelly",
        "avatar": null
    }))
    .into_response()
}

async fn current_user_guilds(State(stub): StubState, headers: HeaderMap) -> Response {
    stub.calls.guilds.fetch_add(1, Ordering::SeqCst);

    if stub.scenario.reject_guilds || !authorized(&headers, &bearer()) {
        return unauthorized();
    }

    let mut guilds = vec![json!({"id": "613425648685547541", "name": "Discord Developers"})];
    if stub.scenario.listed {
        guilds.push(json!({"id": GUILD_ID.to_string(), "name": "Gatehouse"}));
    }

    Json(Value::Array(guilds)).into_response()
}

async fn guild_member(
    State(stub): StubState,
    Path((guild_id, user_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    stub.calls.member.fetch_add(1, Ordering::SeqCst);

    if !authorized(&headers, &bot()) {
        return unauthorized();
    }

    assert_eq!(guild_id, GUILD_ID.to_string());
    assert_eq!(user_id, USER_ID);

    if stub.scenario.garbled_member {
        return "<html>gateway hiccup</html>".into_response();
    }

    match stub.scenario.roles.as_ref() {
        Some(roles) => Json(json!({
            "roles": roles.iter().map(u64::to_string).collect::<Vec<_>>(),
            "nick": null,
            "joined_at": "2015-04-26T06:26:56.936000+00:00"
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Unknown Member", "code": 10007})),
        )
            .into_response(),
    }
}

async fn add_guild_member_role(
    State(stub): StubState,
    Path((_guild_id, _user_id, role_id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    stub.calls.role.fetch_add(1, Ordering::SeqCst);

    if !authorized(&headers, &bot()) {
        return unauthorized();
    }

    assert_eq!(role_id, ROLE_ID.to_string());

    *stub.calls.audit_reason.lock().unwrap() = headers
        .get("x-audit-log-reason")
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned);

    if stub.scenario.can_assign {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::FORBIDDEN,
            Json(json!({"message": "Missing Permissions", "code": 50013})),
        )
            .into_response()
    }
}

/// Serves a stub Discord on an ephemeral port.
async fn serve_stub(scenario: Scenario) -> (SocketAddr, Arc<Stub>) {
    let stub = Arc::new(Stub {
        scenario,
        calls: Calls::default(),
    });

    let router = Router::new()
        .route("/oauth2/token", post(token))
        .route("/users/@me", get(current_user))
        .route("/users/@me/guilds", get(current_user_guilds))
        .route("/guilds/{guild_id}/members/{user_id}", get(guild_member))
        .route(
            "/guilds/{guild_id}/members/{user_id}/roles/{role_id}",
            put(add_guild_member_role),
        )
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, stub)
}

fn config(addr: SocketAddr) -> Config {
    Config {
        server: ServerConfig::default(),
        discord: DiscordConfig {
            client_id: Id::new(1100000000000000001).unwrap(),
            client_secret: Secret::new("hunter2"),
            bot_token: Secret::new(BOT_TOKEN),
            redirect_uri: "http://localhost:3000/verify/callback".into(),
            guild_id: Id::new(GUILD_ID).unwrap(),
            role_id: Id::new(ROLE_ID).unwrap(),
            scopes: vec!["identify".into(), "guilds".into(), "guilds.members.read".into()],
            api_base: format!("http://{}", addr),
            authorize_base: "https://discord.com/oauth2/authorize".into(),
            always_assign_role: false,
        },
    }
}

async fn app(config: Config) -> Router {
    routes::router(AppState::new(config).await.unwrap())
}

fn verify_json(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/verify/process")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn missing_code_never_reaches_discord() {
    let (addr, stub) = serve_stub(Scenario::default()).await;

    let (status, body) = send(app(config(addr)).await, verify_json(json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 4011);
    assert_eq!(body["message"], "Authorization code missing.");
    assert_eq!(stub.calls.total(), 0);
}

#[tokio::test]
async fn short_code_never_reaches_discord() {
    let (addr, stub) = serve_stub(Scenario::default()).await;

    let (status, body) = send(
        app(config(addr)).await,
        verify_json(json!({"code": "abc123"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 4012);
    assert_eq!(stub.calls.total(), 0);
}

#[tokio::test]
async fn invalid_grant_has_a_distinct_message() {
    let (addr, stub) = serve_stub(Scenario::default()).await;

    let (status, body) = send(
        app(config(addr)).await,
        verify_json(json!({"code": EXPIRED_CODE})),
    )
    .await;

    assert!(status.is_client_error());
    assert_eq!(body["code"], 4013);
    assert_ne!(body["message"], "Failed to exchange code for token.");
    assert_eq!(body["error"]["error"], "invalid_grant");

    assert_eq!(stub.calls.token.load(Ordering::SeqCst), 1);
    assert_eq!(stub.calls.user.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_members_are_forbidden_without_role_call() {
    let (addr, stub) = serve_stub(Scenario {
        roles: None,
        ..Default::default()
    })
    .await;

    let (status, body) = send(
        app(config(addr)).await,
        verify_json(json!({"code": CODE})),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 4017);
    assert_eq!(
        body["message"],
        "You must be a member of our Discord server to verify."
    );
    assert_eq!(body["error"]["code"], 10007);

    assert_eq!(stub.calls.member.load(Ordering::SeqCst), 1);
    assert_eq!(stub.calls.role.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn verification_assigns_role_once() {
    let (addr, stub) = serve_stub(Scenario::default()).await;

    let (status, body) = send(
        app(config(addr)).await,
        verify_json(json!({
            "code": CODE,
            "state": "Gd2yUmnBiCoJ9Lr4",
            "timestamp": 1735689600000u64
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Verification successful and role assigned!");
    assert_eq!(body["username"], "nelly");
    assert_eq!(body["discriminator"], "1337");

    assert_eq!(stub.calls.role.load(Ordering::SeqCst), 1);
    assert_eq!(stub.calls.guilds.load(Ordering::SeqCst), 1);
    assert!(stub.calls.audit_reason.lock().unwrap().is_some());
}

#[tokio::test]
async fn already_verified_members_are_skipped() {
    let (addr, stub) = serve_stub(Scenario {
        roles: Some(vec![ROLE_ID]),
        ..Default::default()
    })
    .await;

    let (status, body) = send(
        app(config(addr)).await,
        verify_json(json!({"code": CODE})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "You are already verified and have the role.");
    assert_eq!(body["username"], "nelly");
    assert_eq!(stub.calls.role.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn always_assign_role_reassigns() {
    let (addr, stub) = serve_stub(Scenario {
        roles: Some(vec![ROLE_ID]),
        ..Default::default()
    })
    .await;

    let mut config = config(addr);
    config.discord.always_assign_role = true;

    let (status, body) = send(app(config).await, verify_json(json!({"code": CODE}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Verification successful and role assigned!");
    assert_eq!(stub.calls.role.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn role_assignment_failure_is_mirrored() {
    let (addr, _stub) = serve_stub(Scenario {
        can_assign: false,
        ..Default::default()
    })
    .await;

    let (status, body) = send(
        app(config(addr)).await,
        verify_json(json!({"code": CODE})),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 4016);
    assert_eq!(body["message"], "Failed to assign role.");
    assert_eq!(body["error"]["code"], 50013);
}

#[tokio::test]
async fn unlisted_guild_is_forbidden() {
    let (addr, _stub) = serve_stub(Scenario {
        listed: false,
        ..Default::default()
    })
    .await;

    let (status, body) = send(
        app(config(addr)).await,
        verify_json(json!({"code": CODE})),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 4017);
}

#[tokio::test]
async fn user_fetch_failure_is_mirrored() {
    let (addr, stub) = serve_stub(Scenario {
        reject_user: true,
        ..Default::default()
    })
    .await;

    let (status, body) = send(
        app(config(addr)).await,
        verify_json(json!({"code": CODE})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 4016);
    assert_eq!(body["message"], "Failed to fetch user information.");
    assert_eq!(body["error"]["message"], "401: Unauthorized");

    assert_eq!(stub.calls.member.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn guild_list_failure_is_mirrored() {
    let (addr, stub) = serve_stub(Scenario {
        reject_guilds: true,
        ..Default::default()
    })
    .await;

    let (status, body) = send(
        app(config(addr)).await,
        verify_json(json!({"code": CODE})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 4016);
    assert_eq!(body["message"], "Failed to confirm guild membership.");
    assert_eq!(body["error"]["code"], 0);

    assert_eq!(stub.calls.guilds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreadable_member_is_not_a_rejection() {
    let (addr, stub) = serve_stub(Scenario {
        garbled_member: true,
        ..Default::default()
    })
    .await;

    let (status, body) = send(
        app(config(addr)).await,
        verify_json(json!({"code": CODE})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 5000);
    assert_eq!(body["message"], "Internal server error during verification.");

    assert_eq!(stub.calls.member.load(Ordering::SeqCst), 1);
    assert_eq!(stub.calls.role.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_discord_is_internal() {
    // bind and release a port so nothing answers on it
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (status, body) = send(
        app(config(addr)).await,
        verify_json(json!({"code": CODE})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 5000);
    assert_eq!(body["message"], "Internal server error during verification.");
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn accepts_form_bodies() {
    let (addr, stub) = serve_stub(Scenario::default()).await;

    let request = Request::builder()
        .method("POST")
        .uri("/verify/process")
        .header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded; charset=utf-8",
        )
        .body(Body::from(format!("code={}&state=abc", CODE)))
        .unwrap();

    let (status, body) = send(app(config(addr)).await, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "nelly");
    assert_eq!(stub.calls.role.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejects_unknown_content_types() {
    let (addr, stub) = serve_stub(Scenario::default()).await;

    let request = Request::builder()
        .method("POST")
        .uri("/verify/process")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(CODE))
        .unwrap();

    let (status, body) = send(app(config(addr)).await, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 4002);
    assert_eq!(stub.calls.total(), 0);
}

#[tokio::test]
async fn verified_users_are_recorded() {
    let (addr, _stub) = serve_stub(Scenario::default()).await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = config(addr);
    config.server.database_url = Some(format!(
        "sqlite://{}",
        dir.path().join("gatehouse.db").display()
    ));

    let state = AppState::new(config).await.unwrap();
    let db = state.db.clone().unwrap();

    let (status, _) = send(routes::router(state), verify_json(json!({"code": CODE}))).await;
    assert_eq!(status, StatusCode::OK);

    let user = store::find_user(&db, USER_ID.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.username, "nelly");
    assert_eq!(user.global_name.as_deref(), Some("Nelly"));
}

#[tokio::test]
async fn responses_are_dumped_without_tokens() {
    let (addr, _stub) = serve_stub(Scenario::default()).await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = config(addr);
    config.server.dump_dir = Some(dir.path().to_owned());

    let (status, _) = send(app(config).await, verify_json(json!({"code": CODE}))).await;
    assert_eq!(status, StatusCode::OK);

    let token_dump = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("token-"))
        })
        .unwrap();

    let contents = std::fs::read_to_string(token_dump).unwrap();
    assert!(!contents.contains(ACCESS_TOKEN));
}

#[tokio::test]
async fn pages_and_health() {
    let (addr, _stub) = serve_stub(Scenario::default()).await;
    let app = app(config(addr)).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/verify/callback?code=abc&state=xyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

    let page = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&page).contains("/verify/process"));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/nowhere").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
