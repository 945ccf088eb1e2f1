//! Database layer
//!
//! Supports SQLite (default, single file next to the binary) and MySQL. The
//! driver is chosen from configuration and hidden behind the `DatabasePool`
//! trait; repositories pick the SQL dialect through [`Backend`].
//!
//! ```ignore
//! use veilpress::config::DatabaseConfig;
//! use veilpress::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
