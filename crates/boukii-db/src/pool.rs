//! # Connection Pool
//!
//! Opens the SQLite database behind every repository.
//!
//! File databases run in WAL mode with foreign keys on and a busy timeout,
//! so a webhook settlement waiting on another one's write lock queues
//! instead of failing. In-memory databases are for tests: one connection,
//! never recycled.
//!
//! ```text
//! DbConfig ──► SqlitePool ──► migrations ──► Database
//!                                              ├── schools() / clients()
//!                                              ├── bookings() / vouchers()
//!                                              ├── payments() / notifications()
//!                                              └── settlements()
//! ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::booking::BookingRepository;
use crate::repository::client::ClientRepository;
use crate::repository::outbox::NotificationOutboxRepository;
use crate::repository::payment::PaymentRepository;
use crate::repository::school::SchoolRepository;
use crate::repository::settlement::SettlementRepository;
use crate::repository::voucher::VoucherRepository;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Where the database lives and how the pool around it behaves.
///
/// ```rust,ignore
/// let config = DbConfig::new("./boukii-payments.db").with_pool_size(8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Wait for a free pooled connection.
    pub acquire_timeout: Duration,
    /// Wait for SQLite's write lock. Concurrent settlements queue here.
    pub busy_timeout: Duration,
    pub idle_timeout: Duration,
    pub run_migrations: bool,
}

impl DbConfig {
    /// File-backed database; the file is created on first connect.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Private in-memory database, migrated on connect. One connection only:
    /// each extra connection would see its own empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            ..DbConfig::new(IN_MEMORY)
        }
    }

    pub fn with_pool_size(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self.min_connections = self.min_connections.min(self.max_connections);
        self
    }

    pub fn without_migrations(mut self) -> Self {
        self.run_migrations = false;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };

        Ok(options.foreign_keys(true).busy_timeout(self.busy_timeout))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout);

        if self.is_in_memory() {
            // Recycling the only connection would drop the data
            options.idle_timeout(None).max_lifetime(None)
        } else {
            options.idle_timeout(Some(self.idle_timeout))
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the payments database. Clones share one pool; repositories
/// are created on demand and hold a pool clone of their own.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects and, unless disabled, brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            max_connections = config.max_connections,
            "Opening payments database"
        );

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        } else {
            debug!("Skipping migrations");
        }

        Ok(db)
    }

    /// Applies pending migrations; a no-op when the schema is current.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// `(embedded, applied)` migration counts.
    pub async fn migration_status(&self) -> DbResult<(usize, usize)> {
        migrations::migration_status(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn schools(&self) -> SchoolRepository {
        SchoolRepository::new(self.pool.clone())
    }

    pub fn clients(&self) -> ClientRepository {
        ClientRepository::new(self.pool.clone())
    }

    pub fn bookings(&self) -> BookingRepository {
        BookingRepository::new(self.pool.clone())
    }

    pub fn vouchers(&self) -> VoucherRepository {
        VoucherRepository::new(self.pool.clone())
    }

    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository::new(self.pool.clone())
    }

    /// Returns the notification outbox repository.
    pub fn notifications(&self) -> NotificationOutboxRepository {
        NotificationOutboxRepository::new(self.pool.clone())
    }

    /// Returns the settlement repository (the atomic paid-flip unit of work).
    pub fn settlements(&self) -> SettlementRepository {
        SettlementRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections and closes the pool. Every later
    /// query fails.
    pub async fn close(&self) {
        info!("Closing payments database");
        self.pool.close().await;
    }

    /// `SELECT 1` liveness check.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
