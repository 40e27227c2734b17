//! SQLite backend for the payment record store.
use std::{env, str::FromStr};

use log::*;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

mod payments;
mod sqlite_impl;

pub use sqlite_impl::SqliteDatabase;

pub const SQLITE_DB_URL: &str = "sqlite://data/pix_payments.db";

pub fn db_url() -> String {
    let result = env::var("PIX_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ PIX_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options =
        SqliteConnectOptions::from_str(url)?.create_if_missing(true).journal_mode(SqliteJournalMode::Wal);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
