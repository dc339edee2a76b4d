use serde_json::{json, Value};
use session_auth::auth::{AuthServices, SystemClock};
use session_auth::configuration::{HashingSettings, JwtSettings};
use session_auth::startup::run;
use session_auth::store::InMemoryUserStore;
use std::net::TcpListener;
use std::sync::Arc;

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

impl TestApp {
    async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json(
            "/auth/register",
            &json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": email,
                "password": password
            }),
        )
        .await
    }

    async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json("/auth/login", &json!({"email": email, "password": password}))
            .await
    }

    async fn refresh(&self, user_id: &str, refresh_token: &str) -> reqwest::Response {
        self.post_json(
            "/auth/refresh",
            &json!({"user_id": user_id, "refresh_token": refresh_token}),
        )
        .await
    }

    async fn me(&self, access_token: &str) -> reqwest::Response {
        self.client
            .get(&format!("{}/api/me", &self.address))
            .bearer_auth(access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let jwt = JwtSettings {
        secret: "integration-test-secret-at-least-32-bytes".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 604800,
        issuer: "session_auth".to_string(),
    };
    let auth = AuthServices::new(
        &jwt,
        &HashingSettings { cost: 4 },
        Arc::new(InMemoryUserStore::new()),
        Arc::new(SystemClock),
    )
    .expect("Failed to build auth services");

    let server = run(listener, auth).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        client: reqwest::Client::new(),
    }
}

fn field(body: &Value, name: &str) -> String {
    body[name]
        .as_str()
        .unwrap_or_else(|| panic!("missing field {}", name))
        .to_string()
}

// --- Registration Tests ---

#[tokio::test]
async fn register_returns_201_with_token_pair() {
    let app = spawn_app();

    let response = app.register("Ada@Example.com", "Pw1!aaaa").await;
    assert_eq!(201, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.get("access_token").is_some());
    assert_eq!(64, field(&body, "refresh_token").len());
    assert_eq!("Bearer", field(&body, "token_type"));
    assert_eq!(900, body["expires_in"].as_i64().unwrap());

    let me: Value = app.me(&field(&body, "access_token")).await.json().await.unwrap();
    assert_eq!("ada@example.com", field(&me, "email"));
    assert_eq!("local", field(&me, "provider"));
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn register_returns_400_for_invalid_email() {
    let app = spawn_app();

    for invalid_email in ["notanemail", "user@", "@example.com"] {
        let response = app.register(invalid_email, "Pw1!aaaa").await;
        assert_eq!(
            400,
            response.status().as_u16(),
            "Should reject invalid email: {}",
            invalid_email
        );
    }
}

#[tokio::test]
async fn register_returns_400_for_weak_password() {
    let app = spawn_app();

    let too_long = format!("Aa1!{}", "a".repeat(80));
    let weak_passwords = vec![
        ("Pw1!a", "password too short"),
        ("pw1!aaaa", "no uppercase"),
        ("PW1!AAAA", "no lowercase"),
        ("Pw!aaaaa", "no digits"),
        ("Pw1aaaaa", "no symbol"),
        (too_long.as_str(), "password too long"),
    ];

    for (weak_password, reason) in weak_passwords {
        let response = app.register("weak@example.com", weak_password).await;
        assert_eq!(
            400,
            response.status().as_u16(),
            "Should reject weak password: {}",
            reason
        );
    }
}

#[tokio::test]
async fn register_returns_409_for_duplicate_email() {
    let app = spawn_app();

    assert_eq!(201, app.register("john@example.com", "Pw1!aaaa").await.status().as_u16());
    let duplicate = app.register("JOHN@example.com", "Pw1!bbbb").await;
    assert_eq!(409, duplicate.status().as_u16());
}

#[tokio::test]
async fn register_returns_400_for_missing_fields() {
    let app = spawn_app();

    let test_cases = vec![
        (json!({"email": "t@example.com", "password": "Pw1!aaaa"}), "missing names"),
        (json!({"first_name": "Ada", "last_name": "Lovelace", "password": "Pw1!aaaa"}), "missing email"),
        (json!({}), "missing all fields"),
    ];

    for (body, reason) in test_cases {
        let response = app.post_json("/auth/register", &body).await;
        assert_eq!(400, response.status().as_u16(), "Should reject request: {}", reason);
    }
}

// --- Login Tests ---

#[tokio::test]
async fn login_returns_200_for_valid_credentials() {
    let app = spawn_app();
    app.register("john@example.com", "Pw1!aaaa").await;

    let response = app.login("  John@Example.com ", "Pw1!aaaa").await;
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(200, app.me(&field(&body, "access_token")).await.status().as_u16());
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = spawn_app();
    app.register("john@example.com", "Pw1!aaaa").await;

    let wrong_password = app.login("john@example.com", "Pw1!wrong").await;
    let unknown_email = app.login("nobody@example.com", "Pw1!aaaa").await;

    assert_eq!(401, wrong_password.status().as_u16());
    assert_eq!(401, unknown_email.status().as_u16());

    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_email.json().await.unwrap();
    assert_eq!(a["code"], b["code"]);
    assert_eq!(a["message"], b["message"]);
    assert_eq!(a["status"], b["status"]);
}

// --- Refresh Tests ---

#[tokio::test]
async fn refresh_rotates_and_detects_reuse() {
    let app = spawn_app();
    let body: Value = app.register("a@x.com", "Pw1!aaaa").await.json().await.unwrap();
    let user_id = field(&body, "user_id");
    let first_secret = field(&body, "refresh_token");

    let rotated = app.refresh(&user_id, &first_secret).await;
    assert_eq!(200, rotated.status().as_u16());
    let rotated: Value = rotated.json().await.unwrap();
    let second_secret = field(&rotated, "refresh_token");
    assert_ne!(first_secret, second_secret);

    // The old secret is reused: the whole session is revoked
    assert_eq!(401, app.refresh(&user_id, &first_secret).await.status().as_u16());
    assert_eq!(401, app.refresh(&user_id, &second_secret).await.status().as_u16());

    // Access tokens are not affected by revocation
    assert_eq!(200, app.me(&field(&rotated, "access_token")).await.status().as_u16());

    // A fresh login starts a new session
    let relogin: Value = app.login("a@x.com", "Pw1!aaaa").await.json().await.unwrap();
    let fresh = app.refresh(&user_id, &field(&relogin, "refresh_token")).await;
    assert_eq!(200, fresh.status().as_u16());
}

#[tokio::test]
async fn refresh_returns_401_for_unknown_user() {
    let app = spawn_app();

    let response = app
        .refresh(&uuid::Uuid::new_v4().to_string(), "does-not-matter")
        .await;
    assert_eq!(401, response.status().as_u16());
}

// --- Guard Tests ---

#[tokio::test]
async fn protected_route_rejects_missing_or_bad_tokens() {
    let app = spawn_app();

    let missing = app
        .client
        .get(&format!("{}/api/me", &app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(401, missing.status().as_u16());

    let wrong_scheme = app
        .client
        .get(&format!("{}/api/me", &app.address))
        .header("Authorization", "Token abc")
        .send()
        .await
        .unwrap();
    assert_eq!(401, wrong_scheme.status().as_u16());

    let garbage = app.me("not.a.jwt").await;
    assert_eq!(401, garbage.status().as_u16());
    let body: Value = garbage.json().await.unwrap();
    assert_eq!("UNAUTHORIZED", field(&body, "code"));
}

// --- Logout Tests ---

#[tokio::test]
async fn logout_ends_refresh_session() {
    let app = spawn_app();
    let body: Value = app.register("out@example.com", "Pw1!aaaa").await.json().await.unwrap();
    let access = field(&body, "access_token");

    let response = app
        .client
        .post(&format!("{}/api/logout", &app.address))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(204, response.status().as_u16());

    let refresh = app
        .refresh(&field(&body, "user_id"), &field(&body, "refresh_token"))
        .await;
    assert_eq!(401, refresh.status().as_u16());
}
