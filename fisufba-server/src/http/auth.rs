//! Session authentication and permission checks
//!
//! A [`Principal`] is resolved on the request's own transaction connection,
//! so the session, the user's groups and the permissions they grant are read
//! in the same snapshot as the data the handler touches.

use std::collections::{BTreeSet, HashSet};

use sqlx::PgConnection;

use super::error::ApiError;
use super::extractors::SessionToken;
use crate::db::{SessionRepo, StorageError, UserRepo};
use crate::models::{GroupName, Permission};

/// The authenticated user of a request
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: i64,
    pub session_id: i64,
    pub groups: BTreeSet<GroupName>,
    permissions: HashSet<String>,
}

impl Principal {
    /// Resolve `token` to an active session and load what it may do.
    pub async fn authenticate(
        conn: &mut PgConnection,
        token: &SessionToken,
    ) -> Result<Self, ApiError> {
        let session = SessionRepo::new(&mut *conn)
            .find_active(token.as_str())
            .await?
            .ok_or(ApiError::Unauthorized {
                reason: "invalid or expired session",
            })?;

        let mut users = UserRepo::new(&mut *conn);
        let user = match users.get(session.user_id).await {
            Ok(user) => user,
            Err(StorageError::NotFound { .. }) => {
                return Err(ApiError::Unauthorized {
                    reason: "invalid or expired session",
                })
            }
            Err(e) => return Err(e.into()),
        };
        if !user.is_active {
            return Err(ApiError::Unauthorized {
                reason: "account is deactivated",
            });
        }

        let groups = users.group_names(user.id).await?;
        let permissions = users.permissions(user.id).await?;
        SessionRepo::new(&mut *conn).touch(session.id).await?;

        tracing::debug!(user_id = user.id, session_id = session.id, "authenticated");
        Ok(Self {
            user_id: user.id,
            session_id: session.id,
            groups,
            permissions,
        })
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission.codename())
    }

    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        if self.has(permission) {
            Ok(())
        } else {
            tracing::info!(
                user_id = self.user_id,
                permission = %permission.codename(),
                "permission denied"
            );
            Err(ApiError::Forbidden {
                reason: format!("missing permission {}", permission.codename()),
            })
        }
    }

    /// Every permission in `required`, checked in order.
    pub fn require_all(
        &self,
        required: impl IntoIterator<Item = Permission>,
    ) -> Result<(), ApiError> {
        required.into_iter().try_for_each(|p| self.require(p))
    }

    #[cfg(test)]
    pub(crate) fn for_tests(
        user_id: i64,
        groups: BTreeSet<GroupName>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            user_id,
            session_id: 0,
            groups,
            permissions: permissions.into_iter().map(|p| p.codename()).collect(),
        }
    }
}
