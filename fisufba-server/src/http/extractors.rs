//! Custom Axum extractors
//!
//! All of these reject before a handler runs, so malformed requests never
//! reach the gateway.

use axum::extract::{FromRequest, FromRequestParts, Path};
use axum::http::request::Parts;

use super::error::ApiError;
use crate::db::repos::sessions::TOKEN_LEN;
use crate::models::ValidationError;

/// Header carrying the session token
pub const SESSION_HEADER: &str = "Authentication";

/// JSON body; decode failures become a 400 `ApiError`
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ValidJson<T>(pub T);

/// Query string; decode failures become a 400 `ApiError`
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ValidQuery<T>(pub T);

/// Session token from the `Authentication` header.
///
/// Only the shape is checked here; whether the session exists is decided
/// inside the request's transaction.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(SESSION_HEADER)
            .ok_or(ApiError::Unauthorized {
                reason: "missing session token",
            })?;

        let token = value
            .to_str()
            .ok()
            .map(str::trim)
            .filter(|t| t.len() == TOKEN_LEN && t.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or(ApiError::Unauthorized {
                reason: "invalid session token",
            })?;

        Ok(Self(token.to_ascii_lowercase()))
    }
}

/// Positive integer id from the path
#[derive(Debug, Clone, Copy)]
pub struct ValidId(pub i64);

impl<S> FromRequestParts<S> for ValidId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<String> = Path::from_request_parts(parts, state).await?;

        match id.parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(ApiError::Validation(ValidationError::InvalidFormat {
                field: "id",
                reason: "must be a positive integer",
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_header(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/accounts/1");
        if let Some(value) = value {
            builder = builder.header(SESSION_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let mut parts = parts_with_header(None);
        let err = SessionToken::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized { reason: "missing session token" }));
    }

    #[tokio::test]
    async fn malformed_token_is_unauthorized() {
        let mut parts = parts_with_header(Some("not-a-token"));
        let err = SessionToken::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized { reason: "invalid session token" }));
    }

    #[tokio::test]
    async fn well_formed_token_is_accepted() {
        let raw = "AB".repeat(TOKEN_LEN / 2);
        let mut parts = parts_with_header(Some(&raw));
        let token = SessionToken::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(token.as_str(), "ab".repeat(TOKEN_LEN / 2));
    }

    #[derive(Debug, serde::Deserialize)]
    struct Page {
        page: u32,
    }

    fn parts_with_uri(uri: &str) -> Parts {
        Request::builder().uri(uri).body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn query_decodes_from_parts() {
        let mut parts = parts_with_uri("/accounts/search?page=3");
        let ValidQuery(page) = ValidQuery::<Page>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(page.page, 3);
    }

    #[tokio::test]
    async fn bad_query_is_bad_request() {
        let mut parts = parts_with_uri("/accounts/search?page=many");
        let err = ValidQuery::<Page>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
