//! PostgreSQL booking store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use reefbook_core::error::DomainError;
use reefbook_core::page::Page;
use reefbook_ledger::domain::booking::{
    Booking, BookingStatus, Cancellation, Certificate, Fulfillment, PaymentMethod, PaymentStatus,
};
use reefbook_ledger::domain::progress::ProgressEntry;
use reefbook_ledger::store::BookingStore;

use super::{bad_column, db_err};

/// Booking store backed by the `bookings` and `progress_entries` tables.
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn booking_from_row(row: &PgRow) -> Result<Booking, DomainError> {
    let status: String = row.try_get("status").map_err(db_err)?;
    let status = BookingStatus::parse(&status).ok_or_else(|| bad_column("status", &status))?;
    let payment_status: String = row.try_get("payment_status").map_err(db_err)?;
    let payment_status = PaymentStatus::parse(&payment_status)
        .ok_or_else(|| bad_column("payment_status", &payment_status))?;
    let payment_method = match row
        .try_get::<Option<String>, _>("payment_method")
        .map_err(db_err)?
    {
        Some(s) => Some(PaymentMethod::parse(&s).ok_or_else(|| bad_column("payment_method", &s))?),
        None => None,
    };

    Ok(Booking {
        id: row.try_get("id").map_err(db_err)?,
        booking_number: row.try_get("booking_number").map_err(db_err)?,
        customer_id: row.try_get("customer_id").map_err(db_err)?,
        package_id: row.try_get("package_id").map_err(db_err)?,
        quantity: row.try_get::<i32, _>("quantity").map_err(db_err)? as u32,
        unit_price: row.try_get("unit_price").map_err(db_err)?,
        discount_pct: row.try_get("discount_pct").map_err(db_err)?,
        total_amount: row.try_get("total_amount").map_err(db_err)?,
        currency: row.try_get("currency").map_err(db_err)?,
        status,
        payment_status,
        payment_method,
        payment_id: row.try_get("payment_id").map_err(db_err)?,
        transaction_id: row.try_get("transaction_id").map_err(db_err)?,
        paid_at: row.try_get("paid_at").map_err(db_err)?,
        fulfillment: row
            .try_get::<Json<Fulfillment>, _>("fulfillment")
            .map_err(db_err)?
            .0,
        certificate: row
            .try_get::<Json<Certificate>, _>("certificate")
            .map_err(db_err)?
            .0,
        cancellation: row
            .try_get::<Option<Json<Cancellation>>, _>("cancellation")
            .map_err(db_err)?
            .map(|j| j.0),
        payment_reminders_sent: row
            .try_get::<Json<Vec<i64>>, _>("payment_reminders_sent")
            .map_err(db_err)?
            .0,
        last_growth_update_day: row.try_get("last_growth_update_day").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
        revision: row.try_get("revision").map_err(db_err)?,
    })
}

fn progress_from_row(row: &PgRow) -> Result<ProgressEntry, DomainError> {
    let stage: String = row.try_get("stage").map_err(db_err)?;
    let stage = BookingStatus::parse(&stage).ok_or_else(|| bad_column("stage", &stage))?;
    Ok(ProgressEntry {
        id: row.try_get("id").map_err(db_err)?,
        booking_id: row.try_get("booking_id").map_err(db_err)?,
        stage,
        description: row.try_get("description").map_err(db_err)?,
        media: row
            .try_get::<Json<Vec<String>>, _>("media")
            .map_err(db_err)?
            .0,
        reported_by: row.try_get("reported_by").map_err(db_err)?,
        reported_at: row.try_get("reported_at").map_err(db_err)?,
    })
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn insert(&self, booking: &Booking) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, booking_number, customer_id, package_id, quantity,
                unit_price, discount_pct, total_amount, currency, status,
                payment_status, payment_method, payment_id, transaction_id, paid_at,
                fulfillment, certificate, cancellation, payment_reminders_sent,
                last_growth_update_day, created_at, updated_at, revision
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23
            )
            "#,
        )
        .bind(booking.id)
        .bind(&booking.booking_number)
        .bind(booking.customer_id)
        .bind(booking.package_id)
        .bind(booking.quantity as i32)
        .bind(booking.unit_price)
        .bind(booking.discount_pct)
        .bind(booking.total_amount)
        .bind(&booking.currency)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.payment_method.map(|m| m.as_str()))
        .bind(&booking.payment_id)
        .bind(&booking.transaction_id)
        .bind(booking.paid_at)
        .bind(Json(&booking.fulfillment))
        .bind(Json(&booking.certificate))
        .bind(booking.cancellation.as_ref().map(Json))
        .bind(Json(&booking.payment_reminders_sent))
        .bind(booking.last_growth_update_day)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .bind(booking.revision)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                DomainError::Conflict(format!("booking {} already exists", booking.id))
            } else {
                db_err(e)
            }
        })?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Booking>, DomainError> {
        let row = sqlx::query("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Booking>, DomainError> {
        let row = sqlx::query("SELECT * FROM bookings WHERE booking_number = $1")
            .bind(number)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Booking>, DomainError> {
        let row = sqlx::query("SELECT * FROM bookings WHERE payment_id = $1")
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    /// Single-statement conditional write. The `WHERE revision = $n`
    /// clause is what makes concurrent writers safe; zero affected rows
    /// means somebody else won.
    async fn update(&self, booking: &mut Booking) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $3,
                payment_status = $4,
                payment_method = $5,
                payment_id = $6,
                transaction_id = $7,
                paid_at = $8,
                fulfillment = $9,
                certificate = $10,
                cancellation = $11,
                payment_reminders_sent = $12,
                last_growth_update_day = $13,
                updated_at = $14,
                revision = revision + 1
            WHERE id = $1 AND revision = $2
            "#,
        )
        .bind(booking.id)
        .bind(booking.revision)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.payment_method.map(|m| m.as_str()))
        .bind(&booking.payment_id)
        .bind(&booking.transaction_id)
        .bind(booking.paid_at)
        .bind(Json(&booking.fulfillment))
        .bind(Json(&booking.certificate))
        .bind(booking.cancellation.as_ref().map(Json))
        .bind(Json(&booking.payment_reminders_sent))
        .bind(booking.last_growth_update_day)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM bookings WHERE id = $1)",
            )
            .bind(booking.id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            if exists {
                return Err(DomainError::RevisionConflict {
                    entity: "booking",
                    id: booking.id,
                    expected: booking.revision,
                });
            }
            return Err(DomainError::NotFound {
                entity: "booking",
                id: booking.id.to_string(),
            });
        }
        booking.revision += 1;
        Ok(())
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count as u64)
    }

    async fn list_for_customer(
        &self,
        customer_id: Uuid,
        page: Page,
    ) -> Result<Vec<Booking>, DomainError> {
        let page = page.clamped();
        let rows = sqlx::query(
            r#"
            SELECT * FROM bookings
            WHERE customer_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(customer_id)
        .bind(i64::from(page.size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(booking_from_row).collect()
    }

    async fn list_unpaid_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM bookings
            WHERE status = $1 AND payment_status = $2 AND created_at < $3
            ORDER BY created_at ASC
            "#,
        )
        .bind(BookingStatus::Pending.as_str())
        .bind(PaymentStatus::Pending.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(booking_from_row).collect()
    }

    async fn list_growing(&self) -> Result<Vec<Booking>, DomainError> {
        let rows = sqlx::query("SELECT * FROM bookings WHERE status = $1")
            .bind(BookingStatus::Growing.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(booking_from_row).collect()
    }

    async fn list_pending_bank_transfers(&self) -> Result<Vec<Booking>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM bookings
            WHERE payment_method = $1 AND payment_status = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(PaymentMethod::BankTransfer.as_str())
        .bind(PaymentStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(booking_from_row).collect()
    }

    async fn append_progress(&self, entry: &ProgressEntry) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO progress_entries (
                id, booking_id, stage, description, media, reported_by, reported_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(entry.booking_id)
        .bind(entry.stage.as_str())
        .bind(&entry.description)
        .bind(Json(&entry.media))
        .bind(entry.reported_by)
        .bind(entry.reported_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_progress(&self, booking_id: Uuid) -> Result<Vec<ProgressEntry>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM progress_entries
            WHERE booking_id = $1
            ORDER BY reported_at ASC
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(progress_from_row).collect()
    }
}
