//! SQLite persistence layer for the agency dashboard.
//!
//! Tenants, their CRM sub-accounts, assistant linkage (numbers, tools,
//! knowledge bases, team notes), the billing ledger, OAuth states and
//! refresh-token sessions. Each entity is its own table keyed by foreign id,
//! so concurrent requests for one tenant touch independent rows instead of
//! rewriting a shared document.
//!
//! # Example
//!
//! ```no_run
//! use database::{Database, models::NewUser, user};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite:dashboard.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let new_user = NewUser {
//!         id: "8d2c1f0e-5a7b-4c3d-9e8f-1a2b3c4d5e6f".to_string(),
//!         email: "owner@agency.io".to_string(),
//!         name: "Agency Owner".to_string(),
//!         password_hash: "$argon2id$...".to_string(),
//!     };
//!     user::create_user(db.pool(), &new_user).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod assistant;
pub mod billing;
pub mod contact;
pub mod error;
pub mod models;
pub mod number;
pub mod oauth_state;
pub mod session;
pub mod sub_account;
pub mod user;
pub mod validation;

pub use billing::{ChargeOutcome, PaymentOutcome};
pub use error::{DatabaseError, Result};
pub use models::{
    Assistant, AssistantChanges, BillingEvent, ConnectedTool, ContactFields, KnowledgeBaseTool,
    NumberDetail, OAuthState, Payment, SavedContact, Session, SubAccount, TeamNote, User,
};
pub use user::CompanyPin;
pub use validation::ValidationError;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
pub use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    ///
    /// In-memory databases (`sqlite::memory:`) are per connection, so tests
    /// use a pool size of 1.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(url, pool_size, "Connected to database");

        Ok(Self { pool })
    }

    /// Open a migrated in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let db = Self::connect_with_pool_size("sqlite::memory:", 1).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
