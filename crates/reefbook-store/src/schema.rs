//! Database schema.
//!
//! Sub-records that are only ever read and written as a whole
//! (fulfillment, certificate, participants, channel state) are stored
//! as JSONB columns; counters and filter keys get real columns so the
//! conditional updates and sweep queries can run server-side.

use sqlx::PgPool;

use reefbook_core::error::DomainError;

/// SQL to create the bookings table.
pub const CREATE_BOOKINGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS bookings (
    id                      UUID PRIMARY KEY,
    booking_number          VARCHAR(32) NOT NULL UNIQUE,
    customer_id             UUID NOT NULL,
    package_id              UUID NOT NULL,
    quantity                INTEGER NOT NULL,
    unit_price              BIGINT NOT NULL,
    discount_pct            DOUBLE PRECISION NOT NULL,
    total_amount            BIGINT NOT NULL,
    currency                VARCHAR(8) NOT NULL,
    status                  VARCHAR(16) NOT NULL,
    payment_status          VARCHAR(16) NOT NULL,
    payment_method          VARCHAR(16),
    payment_id              VARCHAR(64),
    transaction_id          VARCHAR(64),
    paid_at                 TIMESTAMPTZ,
    fulfillment             JSONB NOT NULL,
    certificate             JSONB NOT NULL,
    cancellation            JSONB,
    payment_reminders_sent  JSONB NOT NULL,
    last_growth_update_day  BIGINT,
    created_at              TIMESTAMPTZ NOT NULL,
    updated_at              TIMESTAMPTZ NOT NULL,
    revision                BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bookings_customer
    ON bookings (customer_id, created_at DESC);

CREATE INDEX IF NOT EXISTS idx_bookings_payment_id
    ON bookings (payment_id)
    WHERE payment_id IS NOT NULL;

CREATE INDEX IF NOT EXISTS idx_bookings_status
    ON bookings (status, payment_status);
";

/// SQL to create the packages table.
pub const CREATE_PACKAGES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS packages (
    id                UUID PRIMARY KEY,
    name              TEXT NOT NULL,
    coral_species     TEXT NOT NULL,
    location          TEXT NOT NULL,
    unit_price        BIGINT NOT NULL,
    currency          VARCHAR(8) NOT NULL,
    duration_months   INTEGER NOT NULL,
    max_capacity      INTEGER NOT NULL,
    current_bookings  INTEGER NOT NULL DEFAULT 0,
    total_revenue     BIGINT NOT NULL DEFAULT 0,
    active            BOOLEAN NOT NULL DEFAULT TRUE,
    created_at        TIMESTAMPTZ NOT NULL,
    updated_at        TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_packages_active
    ON packages (name)
    WHERE active;
";

/// SQL to create the experiences table.
pub const CREATE_EXPERIENCES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS experiences (
    id                UUID PRIMARY KEY,
    booking_id        UUID NOT NULL,
    title             TEXT NOT NULL,
    scheduled_at      TIMESTAMPTZ NOT NULL,
    duration_minutes  INTEGER NOT NULL,
    location          TEXT NOT NULL,
    max_participants  INTEGER NOT NULL,
    participants      JSONB NOT NULL,
    safety_briefing   JSONB NOT NULL,
    status            VARCHAR(16) NOT NULL,
    feedback          JSONB NOT NULL,
    reminder_sent     BOOLEAN NOT NULL DEFAULT FALSE,
    weather_alerted   BOOLEAN NOT NULL DEFAULT FALSE,
    created_at        TIMESTAMPTZ NOT NULL,
    updated_at        TIMESTAMPTZ NOT NULL,
    revision          BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_experiences_booking
    ON experiences (booking_id, scheduled_at);

CREATE INDEX IF NOT EXISTS idx_experiences_status
    ON experiences (status, scheduled_at);
";

/// SQL to create the progress entries table.
pub const CREATE_PROGRESS_ENTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS progress_entries (
    id           UUID PRIMARY KEY,
    booking_id   UUID NOT NULL,
    stage        VARCHAR(16) NOT NULL,
    description  TEXT NOT NULL,
    media        JSONB NOT NULL,
    reported_by  UUID NOT NULL,
    reported_at  TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_progress_entries_booking
    ON progress_entries (booking_id, reported_at);
";

/// SQL to create the notifications table.
pub const CREATE_NOTIFICATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS notifications (
    id                     UUID PRIMARY KEY,
    recipient_id           UUID NOT NULL,
    kind                   VARCHAR(32) NOT NULL,
    title                  TEXT NOT NULL,
    message                TEXT NOT NULL,
    priority               VARCHAR(8) NOT NULL,
    read                   BOOLEAN NOT NULL DEFAULT FALSE,
    read_at                TIMESTAMPTZ,
    channels               JSONB NOT NULL,
    related_booking_id     UUID,
    related_experience_id  UUID,
    action_url             TEXT,
    scheduled_for          TIMESTAMPTZ,
    expires_at             TIMESTAMPTZ,
    dispatched_at          TIMESTAMPTZ,
    impressions            BIGINT NOT NULL DEFAULT 0,
    clicks                 BIGINT NOT NULL DEFAULT 0,
    conversions            BIGINT NOT NULL DEFAULT 0,
    last_interaction_at    TIMESTAMPTZ,
    created_at             TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_recipient
    ON notifications (recipient_id, created_at DESC);

CREATE INDEX IF NOT EXISTS idx_notifications_due
    ON notifications (scheduled_for)
    WHERE dispatched_at IS NULL AND scheduled_for IS NOT NULL;
";

/// All table definitions, in creation order.
pub const ALL_TABLES: &[&str] = &[
    CREATE_BOOKINGS_TABLE,
    CREATE_PACKAGES_TABLE,
    CREATE_EXPERIENCES_TABLE,
    CREATE_PROGRESS_ENTRIES_TABLE,
    CREATE_NOTIFICATIONS_TABLE,
];

/// Create every table and index that does not exist yet.
///
/// # Errors
///
/// Returns [`DomainError::Infrastructure`] when a statement fails.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), DomainError> {
    for table in ALL_TABLES {
        sqlx::raw_sql(table)
            .execute(pool)
            .await
            .map_err(|e| DomainError::Infrastructure(e.to_string()))?;
    }
    Ok(())
}
