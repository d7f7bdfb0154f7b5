//! Reference rows: groups, permissions, default grants, bootstrap admin

use serde::Serialize;
use sqlx::PgConnection;

use super::ProvisionError;
use crate::config::AdminAccount;
use crate::models::{default_grants, GroupName, PasswordHash, Permission};

/// Rows inserted by one provisioning run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedCounts {
    pub groups: u64,
    pub permissions: u64,
    pub grants: u64,
    pub admin_created: bool,
}

impl SeedCounts {
    pub fn total(&self) -> u64 {
        self.groups + self.permissions + self.grants + u64::from(self.admin_created)
    }
}

pub(crate) async fn seed_reference_rows(
    conn: &mut PgConnection,
    counts: &mut SeedCounts,
) -> Result<(), ProvisionError> {
    for group in GroupName::ALL {
        let result = sqlx::query("INSERT INTO auth_group (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(group.as_str())
            .execute(&mut *conn)
            .await
            .map_err(ProvisionError::step("seed groups"))?;
        counts.groups += result.rows_affected();
    }

    for permission in Permission::all() {
        let result = sqlx::query(
            r#"
            INSERT INTO auth_permission (name, codename, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (codename) DO NOTHING
            "#,
        )
        .bind(permission.name())
        .bind(permission.codename())
        .bind(permission.description())
        .execute(&mut *conn)
        .await
        .map_err(ProvisionError::step("seed permissions"))?;
        counts.permissions += result.rows_affected();
    }

    for (group, permission) in default_grants() {
        let result = sqlx::query(
            r#"
            INSERT INTO auth_group_permissions (group_id, permission_id)
            SELECT g.id, p.id
            FROM auth_group g, auth_permission p
            WHERE g.name = $1 AND p.codename = $2
            ON CONFLICT (group_id, permission_id) DO NOTHING
            "#,
        )
        .bind(group.as_str())
        .bind(permission.codename())
        .execute(&mut *conn)
        .await
        .map_err(ProvisionError::step("seed grants"))?;
        counts.grants += result.rows_affected();
    }

    tracing::debug!(
        groups = counts.groups,
        permissions = counts.permissions,
        grants = counts.grants,
        "reference rows seeded"
    );
    Ok(())
}

/// Create the configured admin unless an account with that cpf exists.
/// An existing account is left untouched, password included.
pub(crate) async fn seed_admin(
    conn: &mut PgConnection,
    admin: &AdminAccount,
    password: &PasswordHash,
) -> Result<bool, ProvisionError> {
    let id: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO auth_user (cpf, password, display_name, email)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (cpf) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(admin.cpf.as_str())
    .bind(password.as_str())
    .bind(admin.display_name.as_str())
    .bind(admin.email.as_ref().map(|e| e.as_str()))
    .fetch_optional(&mut *conn)
    .await
    .map_err(ProvisionError::step("seed admin"))?;

    let Some(id) = id else {
        tracing::info!(cpf = %admin.cpf, "admin account already present");
        return Ok(false);
    };

    sqlx::query(
        r#"
        INSERT INTO auth_user_groups (user_id, group_id)
        SELECT $1, id FROM auth_group WHERE name = $2
        "#,
    )
    .bind(id)
    .bind(GroupName::Admin.as_str())
    .execute(&mut *conn)
    .await
    .map_err(ProvisionError::step("seed admin"))?;

    tracing::info!(cpf = %admin.cpf, user_id = id, "admin account created");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals() {
        let counts = SeedCounts {
            groups: 4,
            permissions: 16,
            grants: 18,
            admin_created: true,
        };
        assert_eq!(counts.total(), 39);
        assert_eq!(SeedCounts::default().total(), 0);
    }
}
