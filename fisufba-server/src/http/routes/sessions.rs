//! Login and logout

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::self_link;
use crate::db::{SessionRepo, UserRepo};
use crate::http::auth::Principal;
use crate::http::error::ApiError;
use crate::http::extractors::{SessionToken, ValidJson};
use crate::http::server::AppState;
use crate::models::{Cpf, PasswordHash, ValidationError};

/// Longest password bcrypt looks at
const MAX_PASSWORD_LEN: usize = 72;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub cpf: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    #[serde(rename = "_links")]
    pub links: Value,
    pub token: String,
    pub user_id: i64,
    pub expire_date: String,
}

#[derive(Serialize)]
pub struct LogoutResponse {
    #[serde(rename = "_links")]
    pub links: Value,
    pub user_id: i64,
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized {
        reason: "invalid cpf or password",
    }
}

/// bcrypt check off the runtime. Without a stored hash the placeholder is
/// checked instead, so unknown cpfs take as long as known ones.
async fn check_password(hash: Option<PasswordHash>, password: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || hash.unwrap_or_else(PasswordHash::placeholder).verify(&password))
        .await
        .map_err(|e| ApiError::internal(format!("password check panicked: {e}")))
}

/// POST /accounts/login - open a session
async fn login(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let cpf = Cpf::new(&req.cpf)?;
    if req.password.is_empty() {
        return Err(ValidationError::Empty { field: "password" }.into());
    }
    if req.password.len() > MAX_PASSWORD_LEN {
        return Err(ValidationError::TooLong {
            field: "password",
            max: MAX_PASSWORD_LEN,
        }
        .into());
    }
    let password = req.password;

    let session = state
        .gateway
        .transact(move |conn| {
            Box::pin(async move {
                let mut users = UserRepo::new(&mut *conn);
                let user = users.find_by_cpf(&cpf).await?;

                let hash = user.as_ref().map(|u| u.password_hash());
                let matches = check_password(hash, password).await?;
                let Some(user) = user else {
                    return Err(invalid_credentials());
                };
                if !matches || !user.is_active {
                    tracing::info!(user_id = user.id, "login rejected");
                    return Err(invalid_credentials());
                }

                users.touch_last_login(user.id).await?;
                let session = SessionRepo::new(&mut *conn).create(user.id).await?;
                Ok::<_, ApiError>(session)
            })
        })
        .await?;

    tracing::info!(user_id = session.user_id, "user logged in");
    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            links: self_link("/accounts/login"),
            token: session.token,
            user_id: session.user_id,
            expire_date: session.expire_date.to_rfc3339(),
        }),
    ))
}

/// POST /accounts/logout - expire the calling session
async fn logout(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
) -> Result<Json<LogoutResponse>, ApiError> {
    let user_id = state
        .gateway
        .transact(move |conn| {
            Box::pin(async move {
                let principal = Principal::authenticate(&mut *conn, &token).await?;
                SessionRepo::new(&mut *conn)
                    .expire(principal.session_id)
                    .await?;
                Ok::<_, ApiError>(principal.user_id)
            })
        })
        .await?;

    tracing::info!(user_id, "user logged out");
    Ok(Json(LogoutResponse {
        links: self_link("/accounts/logout"),
        user_id,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/accounts/login", post(login))
        .route("/accounts/logout", post(logout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn missing_hash_still_costs_a_bcrypt_check() {
        // Warm the placeholder so only the verify is timed
        assert!(!check_password(None, "warm-up".into()).await.unwrap());

        let stored = tokio::task::spawn_blocking(|| {
            crate::models::Password::new("correct horse")
                .unwrap()
                .hash()
                .unwrap()
        })
        .await
        .unwrap();

        let started = Instant::now();
        assert!(check_password(Some(stored), "correct horse".into()).await.unwrap());
        let known = started.elapsed();

        let started = Instant::now();
        assert!(!check_password(None, "correct horse".into()).await.unwrap());
        let unknown = started.elapsed();

        assert!(unknown * 4 > known, "unknown {unknown:?} vs known {known:?}");
    }
}
