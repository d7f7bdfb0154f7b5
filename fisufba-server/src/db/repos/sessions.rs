//! Session repository

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;
use sqlx::{FromRow, PgConnection};

use crate::db::StorageError;

/// Length of a session token in hex characters
pub const TOKEN_LEN: usize = 128;

/// How long a session stays valid after login
pub const SESSION_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Session record from `auth_session`
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub last_access: DateTime<Utc>,
    pub expire_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// 64 random bytes, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN / 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Session repository
pub struct SessionRepo<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> SessionRepo<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }

    /// Open a session for `user_id` with a fresh random token.
    pub async fn create(&mut self, user_id: i64) -> Result<Session, StorageError> {
        let lifetime = chrono::Duration::from_std(SESSION_LIFETIME)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        loop {
            let token = generate_token();
            let session = sqlx::query_as::<_, Session>(
                r#"
                INSERT INTO auth_session (user_id, token, last_access, expire_date)
                VALUES ($1, $2, NOW(), NOW() + $3)
                ON CONFLICT (token) DO NOTHING
                RETURNING id, user_id, token, last_access, expire_date, created_at
                "#,
            )
            .bind(user_id)
            .bind(&token)
            .bind(lifetime)
            .fetch_optional(&mut *self.conn)
            .await?;

            match session {
                Some(session) => {
                    tracing::debug!(user_id, session_id = session.id, "session opened");
                    return Ok(session);
                }
                None => tracing::warn!(user_id, "session token collision, regenerating"),
            }
        }
    }

    /// Session for `token`, if one exists and has not expired.
    pub async fn find_active(&mut self, token: &str) -> Result<Option<Session>, StorageError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, token, last_access, expire_date, created_at
            FROM auth_session
            WHERE token = $1 AND expire_date > NOW()
            "#,
        )
        .bind(token)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(session)
    }

    pub async fn touch(&mut self, id: i64) -> Result<(), StorageError> {
        sqlx::query("UPDATE auth_session SET last_access = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    /// Expire a session immediately.
    pub async fn expire(&mut self, id: i64) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE auth_session SET expire_date = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *self.conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("session", id));
        }
        tracing::debug!(session_id = id, "session expired");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }
}
