//! PostgreSQL package store.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use reefbook_core::error::DomainError;
use reefbook_ledger::domain::package::Package;
use reefbook_ledger::store::PackageStore;

use super::db_err;

/// Package store backed by the `packages` table.
///
/// The capacity and revenue counters move through arithmetic inside the
/// `UPDATE` statements themselves, never through read-modify-write in
/// the application.
pub struct PgPackageStore {
    pool: PgPool,
}

impl PgPackageStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn package_from_row(row: &PgRow) -> Result<Package, DomainError> {
    Ok(Package {
        id: row.try_get("id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        coral_species: row.try_get("coral_species").map_err(db_err)?,
        location: row.try_get("location").map_err(db_err)?,
        unit_price: row.try_get("unit_price").map_err(db_err)?,
        currency: row.try_get("currency").map_err(db_err)?,
        duration_months: row.try_get::<i32, _>("duration_months").map_err(db_err)? as u32,
        max_capacity: row.try_get::<i32, _>("max_capacity").map_err(db_err)? as u32,
        current_bookings: row.try_get::<i32, _>("current_bookings").map_err(db_err)? as u32,
        total_revenue: row.try_get("total_revenue").map_err(db_err)?,
        active: row.try_get("active").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn not_found(id: Uuid) -> DomainError {
    DomainError::NotFound {
        entity: "package",
        id: id.to_string(),
    }
}

#[async_trait]
impl PackageStore for PgPackageStore {
    async fn insert(&self, package: &Package) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO packages (
                id, name, coral_species, location, unit_price, currency,
                duration_months, max_capacity, current_bookings, total_revenue,
                active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(package.id)
        .bind(&package.name)
        .bind(&package.coral_species)
        .bind(&package.location)
        .bind(package.unit_price)
        .bind(&package.currency)
        .bind(package.duration_months as i32)
        .bind(package.max_capacity as i32)
        .bind(package.current_bookings as i32)
        .bind(package.total_revenue)
        .bind(package.active)
        .bind(package.created_at)
        .bind(package.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                DomainError::Conflict(format!("package {} already exists", package.id))
            } else {
                db_err(e)
            }
        })?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Package>, DomainError> {
        let row = sqlx::query("SELECT * FROM packages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(package_from_row).transpose()
    }

    async fn list_active(&self) -> Result<Vec<Package>, DomainError> {
        let rows = sqlx::query("SELECT * FROM packages WHERE active ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(package_from_row).collect()
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<(), DomainError> {
        let result =
            sqlx::query("UPDATE packages SET active = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(active)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    /// The guard lives in the `WHERE` clause, so an oversell attempt
    /// simply affects zero rows.
    async fn consume_capacity(&self, id: Uuid, quantity: u32) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE packages
            SET current_bookings = current_bookings + $2,
                updated_at = NOW()
            WHERE id = $1 AND current_bookings + $2 <= max_capacity
            "#,
        )
        .bind(id)
        .bind(quantity as i32)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            let row = sqlx::query(
                "SELECT name, current_bookings, max_capacity FROM packages WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
            let Some(row) = row else {
                return Err(not_found(id));
            };
            let name: String = row.try_get("name").map_err(db_err)?;
            let current: i32 = row.try_get("current_bookings").map_err(db_err)?;
            let max: i32 = row.try_get("max_capacity").map_err(db_err)?;
            return Err(DomainError::Conflict(format!(
                "package {name} has {current} of {max} units booked; {quantity} more do not fit"
            )));
        }
        Ok(())
    }

    async fn release_capacity(&self, id: Uuid, quantity: u32) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE packages
            SET current_bookings = GREATEST(current_bookings - $2, 0),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(quantity as i32)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn add_revenue(&self, id: Uuid, amount: i64) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE packages
            SET total_revenue = total_revenue + $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn subtract_revenue(&self, id: Uuid, amount: i64) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE packages
            SET total_revenue = GREATEST(total_revenue - $2, 0),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}
