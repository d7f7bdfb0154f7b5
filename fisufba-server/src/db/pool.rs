//! Persistence gateway: the connection pool and transactional access to it
//!
//! The gateway is the only component that touches the database. It is built
//! once at startup, cloned cheaply into every handler, and closed at shutdown.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, PgConnection, PgPool, Postgres};

use super::error::StorageError;
use crate::config::DatabaseConfig;

const APPLICATION_NAME: &str = "fisufba";
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Timeouts and retry policy applied by the gateway
#[derive(Debug, Clone, Copy)]
pub struct GatewayOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub operation_timeout: Duration,
    pub connect_retries: u32,
}

impl From<&DatabaseConfig> for GatewayOptions {
    fn from(cfg: &DatabaseConfig) -> Self {
        Self {
            max_connections: cfg.max_connections,
            acquire_timeout: cfg.acquire_timeout,
            operation_timeout: cfg.operation_timeout,
            connect_retries: cfg.connect_retries,
        }
    }
}

/// Owner of the connection pool
#[derive(Debug, Clone)]
pub struct Gateway {
    pool: PgPool,
    options: GatewayOptions,
}

/// A pooled connection checked out for one unit of work.
///
/// Dropping it, on any exit path, hands the connection back to the pool.
#[derive(Debug)]
pub struct ScopedConnection {
    inner: PoolConnection<Postgres>,
}

impl Deref for ScopedConnection {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ScopedConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// Connection options for `cfg`, with `statement_timeout` set server side.
pub fn connect_options(cfg: &DatabaseConfig) -> PgConnectOptions {
    let statement_timeout_ms = cfg.operation_timeout.as_millis().to_string();
    PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.name)
        .application_name(APPLICATION_NAME)
        .options([("statement_timeout", statement_timeout_ms)])
}

fn pool_options(cfg: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.acquire_timeout)
}

impl Gateway {
    /// Build the pool and open one connection to prove the settings work.
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self, StorageError> {
        tracing::info!(
            host = %cfg.host,
            port = cfg.port,
            database = %cfg.name,
            max_connections = cfg.max_connections,
            "connecting to database"
        );
        let pool = pool_options(cfg)
            .connect_with(connect_options(cfg))
            .await
            .map_err(|e| match e {
                // At startup a timeout means nobody answered, not that the pool is busy.
                sqlx::Error::PoolTimedOut => StorageError::Connectivity(e),
                other => StorageError::from(other),
            })?;
        Ok(Self::from_pool(pool, GatewayOptions::from(cfg)))
    }

    /// Build the pool without opening any connection yet.
    pub fn connect_lazy(cfg: &DatabaseConfig) -> Self {
        let pool = pool_options(cfg).connect_lazy_with(connect_options(cfg));
        Self::from_pool(pool, GatewayOptions::from(cfg))
    }

    pub fn from_pool(pool: PgPool, options: GatewayOptions) -> Self {
        Self { pool, options }
    }

    pub fn options(&self) -> GatewayOptions {
        self.options
    }

    /// Check out a connection.
    ///
    /// Waits up to `acquire_timeout` for a free slot, then fails with
    /// `PoolExhausted`. Transient connectivity failures are retried with
    /// exponential backoff; exhaustion is not, since it already waited.
    pub async fn acquire(&self) -> Result<ScopedConnection, StorageError> {
        let mut attempt = 0;
        loop {
            match self.pool.acquire().await {
                Ok(inner) => return Ok(ScopedConnection { inner }),
                Err(e) => {
                    let err = self.classify_acquire_error(e);
                    let retryable = matches!(err, StorageError::Connectivity(_));
                    if !retryable || attempt >= self.options.connect_retries {
                        if retryable {
                            tracing::error!(attempts = attempt + 1, error = %err, "giving up on database connection");
                        }
                        return Err(err);
                    }
                    let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt);
                    tracing::warn!(attempt = attempt + 1, ?delay, error = %err, "database unavailable, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// A timed-out acquire with free slots left means connecting kept
    /// failing, not that every connection was checked out.
    fn classify_acquire_error(&self, err: sqlx::Error) -> StorageError {
        match err {
            sqlx::Error::PoolTimedOut if self.pool.size() < self.options.max_connections => {
                StorageError::Connectivity(err)
            }
            other => StorageError::classify(other, self.options.acquire_timeout),
        }
    }

        /// Run `op` inside one transaction on one connection.
    ///
    /// Commits when `op` returns `Ok`; rolls back when it returns `Err`, when
    /// the deadline passes, or when the calling task is cancelled. The
    /// connection goes back to the pool in every case.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let id: i64 = gateway
    ///     .transact(|conn| Box::pin(async move {
    ///         let row: (i64,) = sqlx::query_as("INSERT INTO auth_group (name) VALUES ($1) RETURNING id")
    ///             .bind("staff")
    ///             .fetch_one(&mut *conn)
    ///             .await
    ///             .map_err(StorageError::from)?;
    ///         Ok::<_, StorageError>(row.0)
    ///     }))
    ///     .await?;
    /// ```
    pub async fn transact<T, E, F>(&self, op: F) -> Result<T, E>
    where
        T: Send,
        E: From<StorageError> + Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, E>> + Send,
    {
        let deadline = self.options.operation_timeout;
        let work = async {
            let mut conn = self.acquire().await?;
            let mut tx = conn.begin().await.map_err(StorageError::from)?;
            match op(&mut *tx).await {
                Ok(value) => {
                    tx.commit().await.map_err(StorageError::from)?;
                    Ok::<T, E>(value)
                }
                Err(e) => {
                    // Explicit rollback so the connection is clean before it returns.
                    if let Err(rollback) = tx.rollback().await {
                        tracing::warn!(error = %rollback, "rollback failed");
                    }
                    tracing::debug!("transaction rolled back");
                    Err(e)
                }
            }
        };

        match tokio::time::timeout(deadline, work).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(?deadline, "transaction deadline exceeded, rolled back");
                Err(StorageError::Timeout {
                    after: Some(deadline),
                }
                .into())
            }
        }
    }

    /// Round-trip check used by readiness probes.
    pub async fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self.acquire().await?;
        conn.ping().await.map_err(StorageError::from)
    }

    /// Close the pool; waits for checked-out connections to come back.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("database pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Connections currently open (idle plus checked out).
    pub fn size(&self) -> u32 {
        self.pool.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DatabaseConfig {
        DatabaseConfig {
            host: "127.0.0.1".into(),
            // Nothing listens here; lazy pools never try until used.
            port: 1,
            user: "fisufba".into(),
            password: "secret".into(),
            name: "fisufba".into(),
            max_connections: 2,
            acquire_timeout: Duration::from_millis(200),
            operation_timeout: Duration::from_secs(3),
            connect_retries: 1,
        }
    }

    #[test]
    fn options_follow_config() {
        let opts = GatewayOptions::from(&config());
        assert_eq!(opts.max_connections, 2);
        assert_eq!(opts.acquire_timeout, Duration::from_millis(200));
        assert_eq!(opts.operation_timeout, Duration::from_secs(3));
        assert_eq!(opts.connect_retries, 1);
    }

    #[test]
    fn connect_options_carry_target() {
        let opts = connect_options(&config());
        assert_eq!(opts.get_host(), "127.0.0.1");
        assert_eq!(opts.get_port(), 1);
        assert_eq!(opts.get_database(), Some("fisufba"));
        assert_eq!(opts.get_username(), "fisufba");
    }

    #[tokio::test]
    async fn unreachable_database_is_connectivity() {
        let gateway = Gateway::connect_lazy(&config());
        let err = gateway.acquire().await.unwrap_err();
        assert!(matches!(err, StorageError::Connectivity(_)), "unexpected error: {err:?}");
        assert_eq!(gateway.size(), 0);
    }

    #[tokio::test]
    async fn unreachable_database_is_retried_then_reported() {
        let cfg = DatabaseConfig {
            connect_retries: 2,
            acquire_timeout: Duration::from_millis(100),
            ..config()
        };
        let gateway = Gateway::connect_lazy(&cfg);
        let started = std::time::Instant::now();
        let err = gateway.acquire().await.unwrap_err();
        assert!(matches!(err, StorageError::Connectivity(_)), "unexpected error: {err:?}");
        // three attempts plus the 100ms and 200ms backoff sleeps
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn transact_surfaces_transient_error_without_running_op() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let gateway = Gateway::connect_lazy(&config());
        let result: Result<(), StorageError> = gateway
            .transact(move |_conn| {
                Box::pin(async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                })
            })
            .await;
        assert!(result.unwrap_err().is_transient());
        assert!(!ran.load(Ordering::SeqCst));
    }

    // Integration tests require a real database
    // Run with: FISUFBA_DB_HOST=... cargo test -p fisufba-server -- --ignored

    #[tokio::test]
    #[ignore = "requires database"]
    async fn pool_acquires_connection() {
        let cfg = crate::config::AppConfig::from_toml_str("", |key| std::env::var(key).ok())
            .expect("FISUFBA_DB_* variables required")
            .database;
        let gateway = Gateway::connect(&cfg).await.expect("pool creation failed");
        gateway.ping().await.expect("ping failed");
        assert!(gateway.size() >= 1);
        gateway.close().await;
        assert!(gateway.is_closed());
    }
}
