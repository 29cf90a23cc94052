//! Database helpers for PIN credential state.
//!
//! Every mutation is a single SQL statement so concurrent verify/set/
//! reset calls on one identity serialize at the row level; the
//! application never does read-modify-write on credential state.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::lockout::FailureState;
use super::utils::is_unique_violation;

/// One `pin_credentials` row.
pub(super) struct CredentialRow {
    pub(super) id: Uuid,
    pub(super) phone: Option<String>,
    pub(super) email: Option<String>,
    pub(super) pin_hash: Option<String>,
    pub(super) failure_count: u32,
    pub(super) locked_until: Option<DateTime<Utc>>,
}

/// Outcome of the atomic set-PIN upsert.
#[derive(Debug)]
pub(super) enum UpsertOutcome {
    Created,
    AlreadySet,
    Conflict,
}

fn row_to_credential(row: &sqlx::postgres::PgRow) -> CredentialRow {
    CredentialRow {
        id: row.get("id"),
        phone: row.get("phone"),
        email: row.get("email"),
        pin_hash: row.get("pin_hash"),
        failure_count: u32::try_from(row.get::<i32, _>("failure_count")).unwrap_or(0),
        locked_until: row.get("locked_until"),
    }
}

/// Look up a credential by phone first, then by email.
///
/// The two keys are independently unique; this never merges rows and
/// never returns a row matched by a key the caller did not present.
pub(super) async fn lookup(
    pool: &PgPool,
    phone: Option<&str>,
    email: Option<&str>,
) -> Result<Option<CredentialRow>> {
    if let Some(phone) = phone {
        let query = r"
            SELECT id, phone, email, pin_hash, failure_count, locked_until
            FROM pin_credentials
            WHERE phone = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(phone)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to lookup credential by phone")?;
        if let Some(row) = row {
            return Ok(Some(row_to_credential(&row)));
        }
    }

    if let Some(email) = email {
        let query = r"
            SELECT id, phone, email, pin_hash, failure_count, locked_until
            FROM pin_credentials
            WHERE email = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to lookup credential by email")?;
        return Ok(row.map(|row| row_to_credential(&row)));
    }

    Ok(None)
}

/// Insert a credential or set the hash on an existing unset row.
///
/// The AlreadySet guard lives in the statement itself
/// (`WHERE pin_hash IS NULL`), so a concurrent set cannot overwrite a
/// hash that landed first. A unique violation on the secondary key
/// means phone and email already belong to two different rows; that
/// surfaces as `Conflict` rather than merging or clobbering either row.
pub(super) async fn upsert_pin(
    pool: &PgPool,
    phone: Option<&str>,
    email: Option<&str>,
    pin_hash: &str,
) -> Result<UpsertOutcome> {
    let query = if phone.is_some() {
        r"
        INSERT INTO pin_credentials (phone, email, pin_hash)
        VALUES ($1, $2, $3)
        ON CONFLICT (phone) DO UPDATE
        SET pin_hash = EXCLUDED.pin_hash,
            email = COALESCE(pin_credentials.email, EXCLUDED.email),
            failure_count = 0,
            locked_until = NULL,
            updated_at = NOW()
        WHERE pin_credentials.pin_hash IS NULL
        RETURNING id
        "
    } else {
        r"
        INSERT INTO pin_credentials (phone, email, pin_hash)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
        SET pin_hash = EXCLUDED.pin_hash,
            failure_count = 0,
            locked_until = NULL,
            updated_at = NOW()
        WHERE pin_credentials.pin_hash IS NULL
        RETURNING id
        "
    };
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(phone)
        .bind(email)
        .bind(pin_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await;

    match result {
        Ok(Some(_)) => Ok(UpsertOutcome::Created),
        Ok(None) => Ok(UpsertOutcome::AlreadySet),
        Err(err) if is_unique_violation(&err) => Ok(UpsertOutcome::Conflict),
        Err(err) => Err(err).context("failed to upsert credential"),
    }
}

/// Record one failed attempt: increment the counter and, at the
/// threshold, start the lockout clock. Runs as one UPDATE so two racing
/// failures cannot lose an increment.
pub(super) async fn record_failure(
    pool: &PgPool,
    id: Uuid,
    max_attempts: u32,
    lockout_seconds: i64,
) -> Result<FailureState> {
    let query = r"
        UPDATE pin_credentials
        SET failure_count = failure_count + 1,
            locked_until = CASE
                WHEN failure_count + 1 >= $2 THEN NOW() + ($3 * INTERVAL '1 second')
                ELSE locked_until
            END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING failure_count, locked_until
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .bind(i32::try_from(max_attempts).unwrap_or(i32::MAX))
        .bind(lockout_seconds)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to record PIN failure")?;

    Ok(FailureState {
        failure_count: u32::try_from(row.get::<i32, _>("failure_count")).unwrap_or(0),
        locked_until: row.get("locked_until"),
    })
}

/// Reset the failure counter and clear any lockout after a success.
pub(super) async fn clear_failures(pool: &PgPool, id: Uuid) -> Result<()> {
    let query = r"
        UPDATE pin_credentials
        SET failure_count = 0,
            locked_until = NULL,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to clear PIN failures")?;
    Ok(())
}

/// Administrative wipe of hash, counter, and lockout for re-enrollment.
/// The row itself is kept; phone-keyed rows take precedence over
/// email-keyed ones, matching lookup order.
pub(super) async fn admin_clear_pin(
    pool: &PgPool,
    phone: Option<&str>,
    email: Option<&str>,
) -> Result<u64> {
    if let Some(phone) = phone {
        let query = r"
            UPDATE pin_credentials
            SET pin_hash = NULL,
                failure_count = 0,
                locked_until = NULL,
                updated_at = NOW()
            WHERE phone = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(phone)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to clear credential by phone")?;
        if result.rows_affected() > 0 {
            return Ok(result.rows_affected());
        }
    }

    if let Some(email) = email {
        let query = r"
            UPDATE pin_credentials
            SET pin_hash = NULL,
                failure_count = 0,
                locked_until = NULL,
                updated_at = NOW()
            WHERE email = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(email)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to clear credential by email")?;
        return Ok(result.rows_affected());
    }

    Ok(0)
}
