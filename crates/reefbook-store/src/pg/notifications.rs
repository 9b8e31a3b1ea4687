//! PostgreSQL notification store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use reefbook_core::error::DomainError;
use reefbook_core::page::Page;
use reefbook_notifications::domain::notification::{
    Channel, ChannelOutcome, ChannelState, Interaction, InteractionCounters, Notification,
    NotificationKind, Priority,
};
use reefbook_notifications::store::{
    AnalyticsSummary, KindStats, NotificationFilter, NotificationStore,
};

use super::{bad_column, db_err};

/// Notification store backed by the `notifications` table.
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn notification_from_row(row: &PgRow) -> Result<Notification, DomainError> {
    let kind: String = row.try_get("kind").map_err(db_err)?;
    let kind = NotificationKind::parse(&kind).ok_or_else(|| bad_column("kind", &kind))?;
    let priority: String = row.try_get("priority").map_err(db_err)?;
    let priority = Priority::parse(&priority).ok_or_else(|| bad_column("priority", &priority))?;

    Ok(Notification {
        id: row.try_get("id").map_err(db_err)?,
        recipient_id: row.try_get("recipient_id").map_err(db_err)?,
        kind,
        title: row.try_get("title").map_err(db_err)?,
        message: row.try_get("message").map_err(db_err)?,
        priority,
        read: row.try_get("read").map_err(db_err)?,
        read_at: row.try_get("read_at").map_err(db_err)?,
        channels: row
            .try_get::<Json<ChannelState>, _>("channels")
            .map_err(db_err)?
            .0,
        related_booking_id: row.try_get("related_booking_id").map_err(db_err)?,
        related_experience_id: row.try_get("related_experience_id").map_err(db_err)?,
        action_url: row.try_get("action_url").map_err(db_err)?,
        scheduled_for: row.try_get("scheduled_for").map_err(db_err)?,
        expires_at: row.try_get("expires_at").map_err(db_err)?,
        dispatched_at: row.try_get("dispatched_at").map_err(db_err)?,
        interactions: InteractionCounters {
            impressions: row.try_get::<i64, _>("impressions").map_err(db_err)? as u64,
            clicks: row.try_get::<i64, _>("clicks").map_err(db_err)? as u64,
            conversions: row.try_get::<i64, _>("conversions").map_err(db_err)? as u64,
            last_interaction_at: row.try_get("last_interaction_at").map_err(db_err)?,
        },
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn not_found(id: Uuid) -> DomainError {
    DomainError::NotFound {
        entity: "notification",
        id: id.to_string(),
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert(&self, notification: &Notification) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, recipient_id, kind, title, message, priority, read, read_at,
                channels, related_booking_id, related_experience_id, action_url,
                scheduled_for, expires_at, dispatched_at,
                impressions, clicks, conversions, last_interaction_at, created_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
            )
            "#,
        )
        .bind(notification.id)
        .bind(notification.recipient_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.priority.as_str())
        .bind(notification.read)
        .bind(notification.read_at)
        .bind(Json(&notification.channels))
        .bind(notification.related_booking_id)
        .bind(notification.related_experience_id)
        .bind(&notification.action_url)
        .bind(notification.scheduled_for)
        .bind(notification.expires_at)
        .bind(notification.dispatched_at)
        .bind(notification.interactions.impressions as i64)
        .bind(notification.interactions.clicks as i64)
        .bind(notification.interactions.conversions as i64)
        .bind(notification.interactions.last_interaction_at)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                DomainError::Conflict(format!("notification {} already exists", notification.id))
            } else {
                db_err(e)
            }
        })?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Notification>, DomainError> {
        let row = sqlx::query("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(notification_from_row).transpose()
    }

    async fn list_for_recipient(
        &self,
        recipient_id: Uuid,
        filter: NotificationFilter,
        page: Page,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, DomainError> {
        let page = page.clamped();
        let rows = sqlx::query(
            r#"
            SELECT * FROM notifications
            WHERE recipient_id = $1
              AND (scheduled_for IS NULL OR scheduled_for <= $2)
              AND ($3 OR expires_at IS NULL OR expires_at > $2)
              AND ($4::varchar IS NULL OR kind = $4)
              AND (NOT $5 OR NOT read)
            ORDER BY created_at DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(recipient_id)
        .bind(now)
        .bind(filter.include_expired)
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.unread_only)
        .bind(i64::from(page.size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(notification_from_row).collect()
    }

    async fn unread_count(
        &self,
        recipient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE recipient_id = $1
              AND NOT read
              AND (scheduled_for IS NULL OR scheduled_for <= $2)
              AND (expires_at IS NULL OR expires_at > $2)
            "#,
        )
        .bind(recipient_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(count as u64)
    }

    async fn mark_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read = TRUE, read_at = $3
            WHERE id = $1 AND recipient_id = $2 AND NOT read
            "#,
        )
        .bind(id)
        .bind(recipient_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM notifications WHERE id = $1 AND recipient_id = $2)",
        )
        .bind(id)
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        if exists { Ok(false) } else { Err(not_found(id)) }
    }

    async fn mark_all_read(
        &self,
        recipient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read = TRUE, read_at = $2
            WHERE recipient_id = $1
              AND NOT read
              AND (scheduled_for IS NULL OR scheduled_for <= $2)
            "#,
        )
        .bind(recipient_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn delete_own(&self, id: Uuid, recipient_id: Uuid) -> Result<(), DomainError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(recipient_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn record_interaction(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        interaction: Interaction,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let column = match interaction {
            Interaction::Impression => "impressions",
            Interaction::Click => "clicks",
            Interaction::Conversion => "conversions",
        };
        let sql = format!(
            "UPDATE notifications \
             SET {column} = {column} + 1, last_interaction_at = $3 \
             WHERE id = $1 AND recipient_id = $2"
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(recipient_id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    /// Channel flags are set-once, so the row is locked, mutated through
    /// the domain type, and written back in one transaction.
    async fn record_channel(
        &self,
        id: Uuid,
        channel: Channel,
        outcome: ChannelOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT * FROM notifications WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        let Some(row) = row else {
            return Err(not_found(id));
        };
        let mut notification = notification_from_row(&row)?;
        notification.record_channel(channel, outcome, now);

        sqlx::query("UPDATE notifications SET channels = $2 WHERE id = $1")
            .bind(id)
            .bind(Json(&notification.channels))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn mark_dispatched(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        let result =
            sqlx::query("UPDATE notifications SET dispatched_at = COALESCE(dispatched_at, $2) WHERE id = $1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    /// Claim with `FOR UPDATE SKIP LOCKED` so concurrent sweeps divide
    /// the due set instead of double-dispatching it.
    async fn claim_due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Notification>, DomainError> {
        let rows = sqlx::query(
            r#"
            WITH due AS (
                SELECT id
                FROM notifications
                WHERE dispatched_at IS NULL
                  AND scheduled_for IS NOT NULL
                  AND scheduled_for <= $1
                ORDER BY scheduled_for ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE notifications
            SET dispatched_at = $1,
                channels = jsonb_set(
                    jsonb_set(channels, '{in_app,sent}', 'true'::jsonb),
                    '{in_app,sent_at}', to_jsonb($1::timestamptz)
                )
            WHERE id IN (SELECT id FROM due)
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut claimed: Vec<Notification> = rows
            .iter()
            .map(notification_from_row)
            .collect::<Result<_, _>>()?;
        claimed.sort_by_key(|n| n.scheduled_for);
        Ok(claimed)
    }

    async fn purge_expired_read(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE read AND expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn analytics_summary(&self) -> Result<AnalyticsSummary, DomainError> {
        let totals = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE read) AS read,
                   COALESCE(SUM(impressions), 0) AS impressions,
                   COALESCE(SUM(clicks), 0) AS clicks,
                   COALESCE(SUM(conversions), 0) AS conversions
            FROM notifications
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        let total = totals.try_get::<i64, _>("total").map_err(db_err)? as u64;
        let read = totals.try_get::<i64, _>("read").map_err(db_err)? as u64;
        let impressions = totals.try_get::<i64, _>("impressions").map_err(db_err)? as u64;
        let clicks = totals.try_get::<i64, _>("clicks").map_err(db_err)? as u64;
        let conversions = totals.try_get::<i64, _>("conversions").map_err(db_err)? as u64;

        let kind_rows = sqlx::query(
            r#"
            SELECT kind,
                   COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE read) AS read
            FROM notifications
            GROUP BY kind
            ORDER BY COUNT(*) DESC, kind ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut per_kind = Vec::with_capacity(kind_rows.len());
        for row in &kind_rows {
            let kind: String = row.try_get("kind").map_err(db_err)?;
            let kind = NotificationKind::parse(&kind).ok_or_else(|| bad_column("kind", &kind))?;
            per_kind.push(KindStats {
                kind,
                total: row.try_get::<i64, _>("total").map_err(db_err)? as u64,
                read: row.try_get::<i64, _>("read").map_err(db_err)? as u64,
            });
        }

        Ok(AnalyticsSummary {
            total,
            read,
            read_rate: if total == 0 {
                0.0
            } else {
                read as f64 / total as f64
            },
            impressions,
            clicks,
            conversions,
            per_kind,
        })
    }
}
