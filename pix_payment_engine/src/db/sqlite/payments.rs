use std::time::Duration;

use chrono::Utc;
use log::*;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db::traits::StoreError,
    db_types::{NewPaymentRecord, PaymentId, PaymentRecord, PaymentStatus, StatusChange, StatusEvidence},
};

pub async fn fetch_payment(id: &PaymentId, conn: &mut SqliteConnection) -> Result<Option<PaymentRecord>, sqlx::Error> {
    let record = sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    Ok(record)
}

/// Inserts the record, or merges the non-null fields into the existing record with the same id.
pub async fn upsert_payment(record: NewPaymentRecord, conn: &mut SqliteConnection) -> Result<PaymentRecord, StoreError> {
    let now = Utc::now();
    let id = record.id.clone();
    let rows: Vec<PaymentRecord> = sqlx::query_as(
        r#"
            INSERT INTO payments (id, order_id, amount, status, order_payload, raw, created_at, updated_at)
            VALUES ($1, $2, $3, 'pending', $4, $5, $6, $6)
            ON CONFLICT(id) DO UPDATE SET
                order_id = COALESCE(excluded.order_id, payments.order_id),
                amount = COALESCE(excluded.amount, payments.amount),
                order_payload = COALESCE(excluded.order_payload, payments.order_payload),
                raw = COALESCE(excluded.raw, payments.raw),
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(record.id.as_str())
    .bind(record.order_id)
    .bind(record.amount)
    .bind(record.order_payload.map(Json))
    .bind(record.raw.map(Json))
    .bind(now)
    .fetch_all(conn)
    .await?;
    rows.into_iter().next().ok_or_else(|| StoreError::PaymentNotFound(id))
}

/// Makes sure a (pending) record exists for `id`. Does nothing if it already does.
async fn ensure_payment(id: &PaymentId, order_id: Option<String>, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    let inserted = sqlx::query(
        r#"
            INSERT INTO payments (id, order_id, status, created_at, updated_at)
            VALUES ($1, $2, 'pending', $3, $3)
            ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(id.as_str())
    .bind(order_id)
    .bind(now)
    .execute(conn)
    .await?
    .rows_affected();
    if inserted > 0 {
        debug!("🗃️ Created pending record for payment {id}");
    }
    Ok(())
}

/// Moves the payment out of `pending`. The `status = 'pending'` guard makes this a compare-and-set: of several
/// concurrent callers, only one gets a row back.
pub async fn advance_status(
    id: &PaymentId,
    status: PaymentStatus,
    evidence: StatusEvidence,
    conn: &mut SqliteConnection,
) -> Result<StatusChange, StoreError> {
    ensure_payment(id, evidence.order_id.clone(), &mut *conn).await?;
    if status.is_terminal() {
        let advanced: Vec<PaymentRecord> = sqlx::query_as(
            r#"
                UPDATE payments SET
                    status = $2,
                    status_detail = COALESCE($3, status_detail),
                    raw = COALESCE($4, raw),
                    order_id = COALESCE(order_id, $5),
                    updated_at = $6
                WHERE id = $1 AND status = 'pending'
                RETURNING *;
            "#,
        )
        .bind(id.as_str())
        .bind(status)
        .bind(evidence.status_detail)
        .bind(evidence.raw.map(Json))
        .bind(evidence.order_id)
        .bind(Utc::now())
        .fetch_all(&mut *conn)
        .await?;
        if let Some(record) = advanced.into_iter().next() {
            debug!("🗃️ Payment {id} is now {status}");
            return Ok(StatusChange::Advanced(record));
        }
    }
    let current = fetch_payment(id, conn).await?.ok_or_else(|| StoreError::PaymentNotFound(id.clone()))?;
    if current.status == status {
        trace!("🗃️ Payment {id} is already {status}");
        Ok(StatusChange::Unchanged(current))
    } else {
        debug!("🗃️ Payment {id} is {}. Ignoring the move to {status}", current.status);
        Ok(StatusChange::Refused(current))
    }
}

pub async fn claim_dispatch(
    id: &PaymentId,
    stale_after: Duration,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, StoreError> {
    let now = Utc::now();
    let stale_after = chrono::Duration::from_std(stale_after)
        .map_err(|e| StoreError::DatabaseError(format!("Invalid claim timeout: {e}")))?;
    let stale_before = now - stale_after;
    let claimed: Vec<PaymentRecord> = sqlx::query_as(
        r#"
            UPDATE payments SET dispatch_claimed_at = $2
            WHERE id = $1
                AND status = 'approved'
                AND dispatched_at IS NULL
                AND order_payload IS NOT NULL
                AND (dispatch_claimed_at IS NULL OR julianday(dispatch_claimed_at) < julianday($3))
            RETURNING *;
        "#,
    )
    .bind(id.as_str())
    .bind(now)
    .bind(stale_before)
    .fetch_all(conn)
    .await?;
    Ok(claimed.into_iter().next())
}

pub async fn complete_dispatch(id: &PaymentId, conn: &mut SqliteConnection) -> Result<PaymentRecord, StoreError> {
    let now = Utc::now();
    let marked: Vec<PaymentRecord> = sqlx::query_as(
        r#"
            UPDATE payments SET dispatched_at = $2, dispatch_claimed_at = NULL, updated_at = $2
            WHERE id = $1 AND status = 'approved' AND dispatched_at IS NULL
            RETURNING *;
        "#,
    )
    .bind(id.as_str())
    .bind(now)
    .fetch_all(conn)
    .await?;
    marked.into_iter().next().ok_or_else(|| StoreError::CannotDispatch(id.clone()))
}

pub async fn release_dispatch(id: &PaymentId, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    sqlx::query("UPDATE payments SET dispatch_claimed_at = NULL WHERE id = $1 AND dispatched_at IS NULL")
        .bind(id.as_str())
        .execute(conn)
        .await?;
    Ok(())
}
