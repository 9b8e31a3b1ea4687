//! PostgreSQL experience store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use reefbook_core::error::DomainError;
use reefbook_ledger::domain::experience::{
    Experience, ExperienceStatus, Feedback, Participant, SafetyBriefing,
};
use reefbook_ledger::store::ExperienceStore;

use super::{bad_column, db_err};

/// Experience store backed by the `experiences` table.
pub struct PgExperienceStore {
    pool: PgPool,
}

impl PgExperienceStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn experience_from_row(row: &PgRow) -> Result<Experience, DomainError> {
    let status: String = row.try_get("status").map_err(db_err)?;
    let status = ExperienceStatus::parse(&status).ok_or_else(|| bad_column("status", &status))?;
    Ok(Experience {
        id: row.try_get("id").map_err(db_err)?,
        booking_id: row.try_get("booking_id").map_err(db_err)?,
        title: row.try_get("title").map_err(db_err)?,
        scheduled_at: row.try_get("scheduled_at").map_err(db_err)?,
        duration_minutes: row.try_get::<i32, _>("duration_minutes").map_err(db_err)? as u32,
        location: row.try_get("location").map_err(db_err)?,
        max_participants: row.try_get::<i32, _>("max_participants").map_err(db_err)? as u32,
        participants: row
            .try_get::<Json<Vec<Participant>>, _>("participants")
            .map_err(db_err)?
            .0,
        safety_briefing: row
            .try_get::<Json<SafetyBriefing>, _>("safety_briefing")
            .map_err(db_err)?
            .0,
        status,
        feedback: row
            .try_get::<Json<Vec<Feedback>>, _>("feedback")
            .map_err(db_err)?
            .0,
        reminder_sent: row.try_get("reminder_sent").map_err(db_err)?,
        weather_alerted: row.try_get("weather_alerted").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
        revision: row.try_get("revision").map_err(db_err)?,
    })
}

#[async_trait]
impl ExperienceStore for PgExperienceStore {
    async fn insert(&self, experience: &Experience) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO experiences (
                id, booking_id, title, scheduled_at, duration_minutes, location,
                max_participants, participants, safety_briefing, status, feedback,
                reminder_sent, weather_alerted, created_at, updated_at, revision
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(experience.id)
        .bind(experience.booking_id)
        .bind(&experience.title)
        .bind(experience.scheduled_at)
        .bind(experience.duration_minutes as i32)
        .bind(&experience.location)
        .bind(experience.max_participants as i32)
        .bind(Json(&experience.participants))
        .bind(Json(&experience.safety_briefing))
        .bind(experience.status.as_str())
        .bind(Json(&experience.feedback))
        .bind(experience.reminder_sent)
        .bind(experience.weather_alerted)
        .bind(experience.created_at)
        .bind(experience.updated_at)
        .bind(experience.revision)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                DomainError::Conflict(format!("experience {} already exists", experience.id))
            } else {
                db_err(e)
            }
        })?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Experience>, DomainError> {
        let row = sqlx::query("SELECT * FROM experiences WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(experience_from_row).transpose()
    }

    async fn update(&self, experience: &mut Experience) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE experiences
            SET title = $3,
                scheduled_at = $4,
                duration_minutes = $5,
                location = $6,
                max_participants = $7,
                participants = $8,
                safety_briefing = $9,
                status = $10,
                feedback = $11,
                reminder_sent = $12,
                weather_alerted = $13,
                updated_at = $14,
                revision = revision + 1
            WHERE id = $1 AND revision = $2
            "#,
        )
        .bind(experience.id)
        .bind(experience.revision)
        .bind(&experience.title)
        .bind(experience.scheduled_at)
        .bind(experience.duration_minutes as i32)
        .bind(&experience.location)
        .bind(experience.max_participants as i32)
        .bind(Json(&experience.participants))
        .bind(Json(&experience.safety_briefing))
        .bind(experience.status.as_str())
        .bind(Json(&experience.feedback))
        .bind(experience.reminder_sent)
        .bind(experience.weather_alerted)
        .bind(experience.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM experiences WHERE id = $1)",
            )
            .bind(experience.id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            if exists {
                return Err(DomainError::RevisionConflict {
                    entity: "experience",
                    id: experience.id,
                    expected: experience.revision,
                });
            }
            return Err(DomainError::NotFound {
                entity: "experience",
                id: experience.id.to_string(),
            });
        }
        experience.revision += 1;
        Ok(())
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> Result<Vec<Experience>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM experiences
            WHERE booking_id = $1
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(experience_from_row).collect()
    }

    async fn list_reminder_due(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Experience>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM experiences
            WHERE status = ANY($1)
              AND NOT reminder_sent
              AND scheduled_at >= $2
              AND scheduled_at <= $3
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(vec![
            ExperienceStatus::Scheduled.as_str(),
            ExperienceStatus::Confirmed.as_str(),
        ])
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(experience_from_row).collect()
    }

    async fn list_overdue_in_progress(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Experience>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM experiences
            WHERE status = $1 AND scheduled_at < $2
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(ExperienceStatus::InProgress.as_str())
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(experience_from_row).collect()
    }

    async fn list_upcoming_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Experience>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM experiences
            WHERE status = ANY($1)
              AND scheduled_at >= $2
              AND scheduled_at <= $3
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(vec![
            ExperienceStatus::Scheduled.as_str(),
            ExperienceStatus::Confirmed.as_str(),
        ])
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(experience_from_row).collect()
    }
}
