//! User repository
//!
//! Accounts, their group memberships and the permissions those groups grant.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

use super::escape_like;
use crate::db::StorageError;
use crate::models::{
    Cpf, DisplayName, Email, GroupName, Paginated, Pagination, PasswordHash, Phone, SearchPrefix,
};

/// User record from `auth_user`
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub cpf: String,
    pub password: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn cpf(&self) -> Cpf {
        Cpf::from_db(self.cpf.clone())
    }

    pub fn password_hash(&self) -> PasswordHash {
        PasswordHash::from_db(self.password.clone())
    }
}

/// Patients matching the search filters `$1`..`$4`
const PATIENT_MATCHES: &str = r#"
    FROM auth_user u
    JOIN auth_user_groups ug ON ug.user_id = u.id
    JOIN auth_group g ON g.id = ug.group_id AND g.name = 'patient'
    WHERE ($1::text IS NULL OR u.cpf LIKE $1 || '%')
      AND ($2::text IS NULL OR u.phone LIKE $2 || '%')
      AND ($3::text IS NULL OR u.display_name ILIKE '%' || $3 || '%')
      AND ($4::text IS NULL OR u.email ILIKE '%' || $4 || '%')
"#;

/// Fields for a new account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub cpf: Cpf,
    pub password: PasswordHash,
    pub display_name: DisplayName,
    pub phone: Option<Phone>,
    pub email: Option<Email>,
}

/// Partial update. Outer `None` leaves a column alone; `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub cpf: Option<Cpf>,
    pub password: Option<PasswordHash>,
    pub display_name: Option<DisplayName>,
    pub phone: Option<Option<Phone>>,
    pub email: Option<Option<Email>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.cpf.is_none()
            && self.password.is_none()
            && self.display_name.is_none()
            && self.phone.is_none()
            && self.email.is_none()
    }
}

/// Patient search filters: prefix match on cpf/phone, substring on the rest
#[derive(Debug, Clone, Default)]
pub struct PatientSearch {
    pub cpf: Option<SearchPrefix>,
    pub phone: Option<SearchPrefix>,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// User repository
pub struct UserRepo<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> UserRepo<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }

    /// Insert a user. A taken cpf or e-mail surfaces as `ConstraintViolation`.
    pub async fn create(&mut self, new: &NewUser) -> Result<User, StorageError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO auth_user (cpf, password, display_name, phone, email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, cpf, password, display_name, phone, email, is_active,
                      last_login, verified_at, deactivated_at, created_at, updated_at
            "#,
        )
        .bind(new.cpf.as_str())
        .bind(new.password.as_str())
        .bind(new.display_name.as_str())
        .bind(new.phone.as_ref().map(Phone::as_str))
        .bind(new.email.as_ref().map(Email::as_str))
        .fetch_one(&mut *self.conn)
        .await?;

        tracing::debug!(user_id = user.id, "user created");
        Ok(user)
    }

    pub async fn get(&mut self, id: i64) -> Result<User, StorageError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, cpf, password, display_name, phone, email, is_active,
                   last_login, verified_at, deactivated_at, created_at, updated_at
            FROM auth_user
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| StorageError::not_found("user", id))
    }

    /// Like [`get`](Self::get) but holds a row lock until the transaction ends,
    /// so concurrent writers to the same account serialize.
    pub async fn get_for_update(&mut self, id: i64) -> Result<User, StorageError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, cpf, password, display_name, phone, email, is_active,
                   last_login, verified_at, deactivated_at, created_at, updated_at
            FROM auth_user
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| StorageError::not_found("user", id))
    }

    pub async fn find_by_cpf(&mut self, cpf: &Cpf) -> Result<Option<User>, StorageError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, cpf, password, display_name, phone, email, is_active,
                   last_login, verified_at, deactivated_at, created_at, updated_at
            FROM auth_user
            WHERE cpf = $1
            "#,
        )
        .bind(cpf.as_str())
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(user)
    }

    /// Apply a partial update in a single statement.
    pub async fn update(&mut self, id: i64, patch: &UserPatch) -> Result<User, StorageError> {
        let phone = patch.phone.as_ref().map(|p| p.as_ref().map(|p| p.as_str().to_owned()));
        let email = patch.email.as_ref().map(|e| e.as_ref().map(|e| e.as_str().to_owned()));

        sqlx::query_as::<_, User>(
            r#"
            UPDATE auth_user SET
                cpf          = COALESCE($2, cpf),
                password     = COALESCE($3, password),
                display_name = COALESCE($4, display_name),
                phone        = CASE WHEN $5 THEN $6 ELSE phone END,
                email        = CASE WHEN $7 THEN $8 ELSE email END,
                updated_at   = NOW()
            WHERE id = $1
            RETURNING id, cpf, password, display_name, phone, email, is_active,
                      last_login, verified_at, deactivated_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.cpf.as_ref().map(Cpf::as_str))
        .bind(patch.password.as_ref().map(PasswordHash::as_str))
        .bind(patch.display_name.as_ref().map(DisplayName::as_str))
        .bind(phone.is_some())
        .bind(phone.flatten())
        .bind(email.is_some())
        .bind(email.flatten())
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| StorageError::not_found("user", id))
    }

    pub async fn touch_last_login(&mut self, id: i64) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE auth_user SET last_login = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *self.conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("user", id));
        }
        Ok(())
    }

    /// Delete a user. Memberships and sessions go with it; a form still
    /// pointing at the user makes this fail with `ConstraintViolation`.
    pub async fn delete(&mut self, id: i64) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM auth_user WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("user", id));
        }
        tracing::debug!(user_id = id, "user deleted");
        Ok(())
    }

    /// Group names the user belongs to. Unknown names in the table are skipped.
    pub async fn group_names(&mut self, id: i64) -> Result<BTreeSet<GroupName>, StorageError> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT g.name
            FROM auth_group g
            JOIN auth_user_groups ug ON ug.group_id = g.id
            WHERE ug.user_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(names
            .into_iter()
            .filter_map(|n| match n.parse::<GroupName>() {
                Ok(g) => Some(g),
                Err(_) => {
                    tracing::warn!(user_id = id, group = %n, "ignoring unknown group");
                    None
                }
            })
            .collect())
    }

    /// Add the user to every named group in one statement.
    ///
    /// A group missing from `auth_group` means the schema was never seeded;
    /// that is reported as `NotFound`.
    pub async fn add_to_groups(
        &mut self,
        id: i64,
        groups: &BTreeSet<GroupName>,
    ) -> Result<(), StorageError> {
        let names: Vec<&str> = groups.iter().map(GroupName::as_str).collect();
        let result = sqlx::query(
            r#"
            INSERT INTO auth_user_groups (user_id, group_id)
            SELECT $1, g.id FROM auth_group g WHERE g.name = ANY($2)
            ON CONFLICT (user_id, group_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(&names)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() != names.len() as u64 {
            return Err(StorageError::not_found("group", names.join(",")));
        }
        Ok(())
    }

    /// Codenames of every permission granted through the user's groups.
    pub async fn permissions(&mut self, id: i64) -> Result<HashSet<String>, StorageError> {
        let codenames: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT p.codename
            FROM auth_permission p
            JOIN auth_group_permissions gp ON gp.permission_id = p.id
            JOIN auth_user_groups ug ON ug.group_id = gp.group_id
            WHERE ug.user_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(codenames.into_iter().collect())
    }

    /// Search accounts in the `patient` group.
    ///
    /// `total` counts every match, so it stays right on pages past the end.
    pub async fn search_patients(
        &mut self,
        filter: &PatientSearch,
        page: Pagination,
    ) -> Result<Paginated<User>, StorageError> {
        let cpf = filter.cpf.as_ref().map(SearchPrefix::as_str);
        let phone = filter.phone.as_ref().map(SearchPrefix::as_str);
        let display_name = filter.display_name.as_deref().map(escape_like);
        let email = filter.email.as_deref().map(escape_like);

        let count_sql = format!("SELECT COUNT(*) {PATIENT_MATCHES}");
        let (total,): (i64,) = sqlx::query_as(&count_sql)
            .bind(cpf)
            .bind(phone)
            .bind(display_name.as_deref())
            .bind(email.as_deref())
            .fetch_one(&mut *self.conn)
            .await?;

        let page_sql = format!(
            "SELECT u.id, u.cpf, u.password, u.display_name, u.phone, u.email, u.is_active, \
                    u.last_login, u.verified_at, u.deactivated_at, u.created_at, u.updated_at \
             {PATIENT_MATCHES} \
             ORDER BY u.display_name, u.id \
             LIMIT $5 OFFSET $6"
        );
        let items = sqlx::query_as::<_, User>(&page_sql)
            .bind(cpf)
            .bind(phone)
            .bind(display_name.as_deref())
            .bind(email.as_deref())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(Paginated::new(items, total, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch() {
        assert!(UserPatch::default().is_empty());
        let patch = UserPatch {
            email: Some(None),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
