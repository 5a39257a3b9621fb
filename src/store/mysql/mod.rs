//! MySQL-backed store. Queries are plain runtime SQL; the schema lives in
//! `schema/mysql.sql`.

mod deliveries;
mod products;
mod reorders;
mod sql;
mod suppliers;
mod users;

use std::fmt::Display;
use std::str::FromStr;

use sqlx::MySqlPool;

use super::{StoreError, StoreResult};

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = MySqlPool::connect(database_url).await?;
        Ok(Self { pool })
    }
}

/// Maps duplicate-key and foreign-key failures to `Conflict`, everything else to `Backend`.
fn conflict_or_backend(err: sqlx::Error, message: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
            return StoreError::Conflict(message.to_string());
        }
    }
    tracing::error!(error = %err, "MySQL statement failed");
    StoreError::from(err)
}

fn parse_column<T>(column: &str, value: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| StoreError::Backend(format!("bad value `{value}` in column {column}: {e}")))
}

fn count(total: i64) -> u64 {
    u64::try_from(total).unwrap_or_default()
}
