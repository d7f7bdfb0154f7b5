//! Schema provisioning
//!
//! Creates every table the service needs, verifies pre-existing ones match,
//! and seeds reference rows. Safe to re-run: a provisioned database comes
//! out unchanged and the report says so.

mod schema;
mod seed;

use std::time::Duration;

use serde::Serialize;
use sqlx::{Connection, PgConnection};

use crate::config::{AdminAccount, DatabaseConfig};
use crate::db::connect_options;

pub use seed::SeedCounts;

/// Key for `pg_advisory_xact_lock`; concurrent provisioners queue on it.
const PROVISION_LOCK_KEY: i64 = 0x6669_7375_6662_61; // "fisufba"

/// Errors from a provisioning run. Nothing is committed when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("database unreachable: {0}")]
    Unreachable(#[source] sqlx::Error),

    #[error("authentication failed for database user '{user}'")]
    AuthenticationFailed { user: String },

    #[error("table {table} exists with an incompatible definition: column `{column}` {problem}")]
    IncompatibleSchema {
        table: &'static str,
        column: &'static str,
        problem: String,
    },

    #[error("provisioning step '{step}' failed: {source}")]
    Statement {
        step: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to hash admin password: {0}")]
    PasswordHash(String),
}

impl ProvisionError {
    pub(crate) fn step(step: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Statement { step, source }
    }
}

/// What a provisioning run changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub created_tables: Vec<&'static str>,
    pub seeded: SeedCounts,
}

impl ProvisionReport {
    /// True when the database was already fully provisioned.
    pub fn is_noop(&self) -> bool {
        self.created_tables.is_empty() && self.seeded.total() == 0
    }
}

fn classify_connect_error(err: sqlx::Error, user: &str) -> ProvisionError {
    if let sqlx::Error::Database(db) = &err {
        // invalid_password, invalid_authorization_specification
        if let Some(code) = db.code() {
            if matches!(&*code, "28P01" | "28000") {
                return ProvisionError::AuthenticationFailed {
                    user: user.to_owned(),
                };
            }
        }
    }
    ProvisionError::Unreachable(err)
}

/// Provision the database described by `cfg`.
///
/// Runs as one transaction: either every table exists, matches and is
/// seeded afterwards, or nothing changed.
pub async fn provision(
    cfg: &DatabaseConfig,
    admin: Option<&AdminAccount>,
) -> Result<ProvisionReport, ProvisionError> {
    let admin_hash = match admin {
        Some(admin) => {
            let password = admin.password.clone();
            let hash = tokio::task::spawn_blocking(move || password.hash())
                .await
                .map_err(|e| ProvisionError::PasswordHash(e.to_string()))?
                .map_err(|e| ProvisionError::PasswordHash(e.to_string()))?;
            Some(hash)
        }
        None => None,
    };

    tracing::info!(host = %cfg.host, port = cfg.port, database = %cfg.name, "provisioning schema");

    let connect_deadline = cfg.acquire_timeout.max(Duration::from_secs(1));
    let mut conn = match tokio::time::timeout(
        connect_deadline,
        PgConnection::connect_with(&connect_options(cfg)),
    )
    .await
    {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => return Err(classify_connect_error(e, &cfg.user)),
        Err(_) => {
            let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out");
            return Err(ProvisionError::Unreachable(sqlx::Error::Io(io)));
        }
    };

    let mut report = ProvisionReport::default();
    let mut tx = conn.begin().await.map_err(ProvisionError::step("begin"))?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(PROVISION_LOCK_KEY)
        .execute(&mut *tx)
        .await
        .map_err(ProvisionError::step("advisory lock"))?;

    for table in schema::TABLES {
        if !table_exists(&mut tx, table.name).await? {
            sqlx::query(table.ddl)
                .execute(&mut *tx)
                .await
                .map_err(ProvisionError::step("create table"))?;
            tracing::info!(table = table.name, "created table");
            report.created_tables.push(table.name);
        } else {
            tracing::debug!(table = table.name, "table already present");
        }
        verify_columns(&mut tx, table).await?;
    }

    for ddl in schema::INDEXES.iter().copied() {
        sqlx::query(ddl)
            .execute(&mut *tx)
            .await
            .map_err(ProvisionError::step("create index"))?;
    }

    seed::seed_reference_rows(&mut tx, &mut report.seeded).await?;
    if let (Some(admin), Some(hash)) = (admin, admin_hash.as_ref()) {
        report.seeded.admin_created = seed::seed_admin(&mut tx, admin, hash).await?;
    }

    tx.commit().await.map_err(ProvisionError::step("commit"))?;
    if let Err(e) = conn.close().await {
        tracing::debug!(error = %e, "error closing provisioning connection");
    }

    tracing::info!(
        created = report.created_tables.len(),
        seeded = report.seeded.total(),
        "provisioning complete"
    );
    Ok(report)
}

async fn table_exists(conn: &mut PgConnection, table: &str) -> Result<bool, ProvisionError> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_name = $1
        )
        "#,
    )
    .bind(table)
    .fetch_one(&mut *conn)
    .await
    .map_err(ProvisionError::step("inspect tables"))
}

async fn verify_columns(
    conn: &mut PgConnection,
    table: &schema::Table,
) -> Result<(), ProvisionError> {
    let found: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT column_name::text, data_type::text
        FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = $1
        "#,
    )
    .bind(table.name)
    .fetch_all(&mut *conn)
    .await
    .map_err(ProvisionError::step("inspect columns"))?;

    check_columns(table, &found)
}

fn check_columns(table: &schema::Table, found: &[(String, String)]) -> Result<(), ProvisionError> {
    for &(column, expected) in table.columns {
        match found.iter().find(|(name, _)| name == column) {
            None => {
                return Err(ProvisionError::IncompatibleSchema {
                    table: table.name,
                    column,
                    problem: "is missing".to_owned(),
                })
            }
            Some((_, actual)) if actual != expected => {
                return Err(ProvisionError::IncompatibleSchema {
                    table: table.name,
                    column,
                    problem: format!("has type {actual}, expected {expected}"),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}
