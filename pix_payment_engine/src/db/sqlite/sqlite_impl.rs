//! `SqliteDatabase` is the SQLite implementation of [`PaymentRecordStore`].
use std::{fmt::Debug, time::Duration};

use log::*;
use sqlx::{migrate, SqlitePool};

use super::{db_url, new_pool, payments};
use crate::{
    db::traits::{PaymentRecordStore, StoreError},
    db_types::{NewPaymentRecord, PaymentId, PaymentRecord, PaymentStatus, StatusChange, StatusEvidence},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl PaymentRecordStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_record(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let record = payments::fetch_payment(id, &mut conn).await?;
        Ok(record)
    }

    async fn upsert_record(&self, record: NewPaymentRecord) -> Result<PaymentRecord, StoreError> {
        let mut tx = self.pool.begin().await?;
        let id = record.id.clone();
        let record = payments::upsert_payment(record, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment record {id} saved");
        Ok(record)
    }

    async fn advance_status(
        &self,
        id: &PaymentId,
        status: PaymentStatus,
        evidence: StatusEvidence,
    ) -> Result<StatusChange, StoreError> {
        let mut tx = self.pool.begin().await?;
        let change = payments::advance_status(id, status, evidence, &mut tx).await?;
        tx.commit().await?;
        Ok(change)
    }

    async fn claim_dispatch(&self, id: &PaymentId, stale_after: Duration) -> Result<Option<PaymentRecord>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let claimed = payments::claim_dispatch(id, stale_after, &mut tx).await?;
        tx.commit().await?;
        if claimed.is_some() {
            debug!("🗃️ Dispatch of payment {id} claimed");
        }
        Ok(claimed)
    }

    async fn complete_dispatch(&self, id: &PaymentId) -> Result<PaymentRecord, StoreError> {
        let mut tx = self.pool.begin().await?;
        let record = payments::complete_dispatch(id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment {id} marked as dispatched");
        Ok(record)
    }

    async fn release_dispatch(&self, id: &PaymentId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        payments::release_dispatch(id, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the `PIX_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
