//! Shared helpers for integration tests
//!
//! Database-backed tests read the same `FISUFBA_DB_*` variables as the
//! service itself and are `#[ignore]`d by default:
//!
//! ```text
//! FISUFBA_DB_HOST=localhost FISUFBA_DB_USER=fisufba FISUFBA_DB_PASSWORD=secret \
//! FISUFBA_DB_NAME=fisufba_test cargo test -p fisufba-server -- --ignored
//! ```

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use rand::Rng;
use tower::ServiceExt;

use fisufba_server::config::{AppConfig, DatabaseConfig, ServerConfig};
use fisufba_server::db::{Gateway, NewUser, SessionRepo, StorageError, User, UserRepo};
use fisufba_server::http::{router, AppState};
use fisufba_server::models::{Cpf, DisplayName, GroupName, Password};

pub const PASSWORD: &str = "correct horse battery";

/// Database settings from the environment.
pub fn database_config() -> DatabaseConfig {
    AppConfig::from_toml_str("", |key| std::env::var(key).ok())
        .expect("FISUFBA_DB_* variables required for database tests")
        .database
}

/// Gateway pointed at a port nothing listens on; never connects.
pub fn unreachable_gateway() -> Gateway {
    Gateway::connect_lazy(&DatabaseConfig {
        host: "127.0.0.1".into(),
        port: 1,
        user: "fisufba".into(),
        password: "secret".into(),
        name: "fisufba".into(),
        max_connections: 1,
        acquire_timeout: Duration::from_millis(100),
        operation_timeout: Duration::from_secs(1),
        connect_retries: 0,
    })
}

/// Provision the test database, then connect a gateway with `max_connections`.
pub async fn provisioned_gateway(max_connections: u32) -> Gateway {
    let mut cfg = database_config();
    fisufba_server::provision(&cfg, None)
        .await
        .expect("provisioning failed");
    cfg.max_connections = max_connections;
    Gateway::connect(&cfg).await.expect("gateway connect failed")
}

pub fn app(gateway: Gateway) -> Router {
    router(Arc::new(AppState { gateway }), &ServerConfig::default())
}

/// A random CPF with valid check digits.
pub fn random_cpf() -> Cpf {
    let mut rng = rand::thread_rng();
    let mut digits: Vec<u32> = (0..9).map(|_| rng.gen_range(0..10)).collect();
    for _ in 0..2 {
        let sum: u32 = digits
            .iter()
            .rev()
            .enumerate()
            .map(|(i, d)| d * (i as u32 + 2))
            .sum();
        let rest = 11 - sum % 11;
        digits.push(if rest <= 9 { rest } else { 0 });
    }
    let text: String = digits.iter().map(|d| char::from_digit(*d, 10).unwrap()).collect();
    Cpf::new(&text).expect("generated cpf must be valid")
}

/// Insert a user in `groups` directly through the gateway.
pub async fn create_user(gateway: &Gateway, name: &str, groups: &[GroupName]) -> User {
    let password = Password::new(PASSWORD).unwrap().hash().unwrap();
    let new = NewUser {
        cpf: random_cpf(),
        password,
        display_name: DisplayName::new(name).unwrap(),
        phone: None,
        email: None,
    };
    let groups: BTreeSet<GroupName> = groups.iter().copied().collect();
    gateway
        .transact(move |conn| {
            Box::pin(async move {
                let mut users = UserRepo::new(conn);
                let user = users.create(&new).await?;
                if !groups.is_empty() {
                    users.add_to_groups(user.id, &groups).await?;
                }
                Ok::<_, StorageError>(user)
            })
        })
        .await
        .expect("create user failed")
}

/// Open a session for `user_id` and return its token.
pub async fn session_for(gateway: &Gateway, user_id: i64) -> String {
    gateway
        .transact(move |conn| {
            Box::pin(async move {
                let session = SessionRepo::new(conn).create(user_id).await?;
                Ok::<_, StorageError>(session.token)
            })
        })
        .await
        .expect("create session failed")
}

/// Send a request through the router and decode the JSON body (if any).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authentication", token);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
