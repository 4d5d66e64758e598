//! Direct handler: executes statements over a MySQL connection.

use std::time::Duration;

use async_trait::async_trait;
use cmdrelay_core::{HandlerError, HostAuth, SessionHandler};
use sqlx::{
    Connection,
    mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions},
};

use crate::config::DEFAULT_CONNECT_TIMEOUT;

/// Runs each command as a single statement and reports the affected row
/// count. Result sets are not captured.
///
/// The session is a pool capped at one connection, so every statement runs
/// on the same server session.
pub struct DirectHandler {
    auth: HostAuth,
    connect_timeout: Duration,
    pool: Option<MySqlPool>,
}

impl DirectHandler {
    #[must_use]
    pub const fn new(auth: HostAuth) -> Self {
        Self {
            auth,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            pool: None,
        }
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.auth.address)
            .port(self.auth.port)
            .username(&self.auth.username)
            .password(&self.auth.password);
        if !self.auth.db_name.is_empty() {
            options = options.database(&self.auth.db_name);
        }
        options
    }

    fn pool_options(&self) -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .min_connections(0)
            .max_connections(1)
            .acquire_timeout(self.connect_timeout)
    }
}

#[async_trait]
impl SessionHandler for DirectHandler {
    async fn connect(&mut self) -> Result<(), HandlerError> {
        let pool = self
            .pool_options()
            .connect_with(self.options())
            .await
            .map_err(|e| HandlerError::ConnectFailed(describe(&e)))?;

        let ping = async {
            let mut conn = pool.acquire().await?;
            conn.ping().await
        };
        if let Err(e) = ping.await {
            pool.close().await;
            return Err(HandlerError::ConnectFailed(describe(&e)));
        }

        tracing::info!(
            address = %self.auth.address,
            port = self.auth.port,
            database = %self.auth.db_name,
            "Database session ready"
        );
        self.pool = Some(pool);
        Ok(())
    }

    async fn execute(&mut self, command: &str) -> Result<String, HandlerError> {
        let pool = self.pool.as_ref().ok_or(HandlerError::NotConnected)?;
        let result = sqlx::raw_sql(command)
            .execute(pool)
            .await
            .map_err(|e| HandlerError::ExecutionFailed(describe(&e)))?;
        Ok(format!("Affected rows: {}", result.rows_affected()))
    }

    async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            tracing::debug!("Database session closed");
        }
    }
}

/// Database errors carry the server's own message; anything else is
/// described by sqlx.
fn describe(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    }
}
