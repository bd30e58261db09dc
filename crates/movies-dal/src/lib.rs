pub mod error;
pub mod movie;

use std::str::FromStr as _;

pub use error::Error;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;

use crate::error::Result;

pub type ChosenDB = sqlx::Sqlite;
pub type Pool = sqlx::Pool<ChosenDB>;

/// Opens connection pool, database file is created if it does not exist yet
pub async fn new_pool(database_url: &str) -> Result<Pool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(50)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn migrate(pool: &Pool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    debug!("Database migrations applied");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingParams {
    pub offset: i64,
    pub limit: i64,
}

impl ListingParams {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self { offset, limit }
    }
}
