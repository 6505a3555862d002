// crates/shopmetrics-core/src/db.rs

use std::time::Duration;

use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Executor};

use crate::dialect::SqlDialect;
use crate::error::Result;

/// Establish a connection pool against either supported engine.
///
/// The URL decides the backend: `postgres://...` reaches a client-server
/// Postgres, anything else is treated as an embedded SQLite database.
pub async fn connect(database_url: &str) -> Result<AnyPool> {
    sqlx::any::install_default_drivers();

    let mut options = AnyPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10));

    // SQLite does not enforce foreign keys unless asked to, and the loader
    // relies on the store rejecting out-of-order child rows.
    if SqlDialect::from_url(database_url) == SqlDialect::Sqlite {
        options = options.after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("PRAGMA foreign_keys = ON").await?;
                Ok(())
            })
        });
    }

    Ok(options.connect(database_url).await?)
}
