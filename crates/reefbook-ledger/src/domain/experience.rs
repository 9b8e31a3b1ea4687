//! Experience sub-bookings: scheduled on-site sessions under a booking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reefbook_core::error::DomainError;

/// Status of an experience session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceStatus {
    /// Booked, awaiting confirmation.
    Scheduled,
    /// Confirmed by staff.
    Confirmed,
    /// Happening now.
    InProgress,
    /// Finished.
    Completed,
    /// Called off.
    Cancelled,
}

impl ExperienceStatus {
    /// Wire representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceStatus::Scheduled => "scheduled",
            ExperienceStatus::Confirmed => "confirmed",
            ExperienceStatus::InProgress => "in_progress",
            ExperienceStatus::Completed => "completed",
            ExperienceStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a status from its wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<ExperienceStatus> {
        match s {
            "scheduled" => Some(ExperienceStatus::Scheduled),
            "confirmed" => Some(ExperienceStatus::Confirmed),
            "in_progress" => Some(ExperienceStatus::InProgress),
            "completed" => Some(ExperienceStatus::Completed),
            "cancelled" => Some(ExperienceStatus::Cancelled),
            _ => None,
        }
    }

    /// True once the session can no longer change status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExperienceStatus::Completed | ExperienceStatus::Cancelled)
    }
}

/// A participant registered for the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// The participating user.
    pub user_id: Uuid,
    /// Display name captured at registration.
    pub name: String,
}

/// Safety briefing gate. Sessions cannot start until it is completed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyBriefing {
    /// Whether the briefing was held.
    pub completed: bool,
    /// When it was held.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Feedback left by a participant after completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    /// The author.
    pub author_id: Uuid,
    /// Rating from 1 to 5.
    pub rating: u8,
    /// Free-text comment.
    pub comment: Option<String>,
    /// When it was submitted.
    pub submitted_at: DateTime<Utc>,
}

/// A scheduled, capacity-limited session owned by a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    /// Record identifier.
    pub id: Uuid,
    /// The owning booking.
    pub booking_id: Uuid,
    /// Session title.
    pub title: String,
    /// Scheduled start.
    pub scheduled_at: DateTime<Utc>,
    /// Planned duration.
    pub duration_minutes: u32,
    /// Where the session takes place.
    pub location: String,
    /// Participant cap.
    pub max_participants: u32,
    /// Registered participants.
    pub participants: Vec<Participant>,
    /// Safety briefing gate.
    pub safety_briefing: SafetyBriefing,
    /// Session status.
    pub status: ExperienceStatus,
    /// Post-session feedback, at most one entry per author.
    pub feedback: Vec<Feedback>,
    /// Set once the reminder sweep has notified the owner.
    pub reminder_sent: bool,
    /// Set once a weather alert has been sent for this session.
    pub weather_alerted: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Revision for conditional updates.
    pub revision: i64,
}

impl Experience {
    /// Creates a scheduled session.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        booking_id: Uuid,
        title: String,
        scheduled_at: DateTime<Utc>,
        duration_minutes: u32,
        location: String,
        max_participants: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            booking_id,
            title,
            scheduled_at,
            duration_minutes,
            location,
            max_participants,
            participants: Vec::new(),
            safety_briefing: SafetyBriefing::default(),
            status: ExperienceStatus::Scheduled,
            feedback: Vec::new(),
            reminder_sent: false,
            weather_alerted: false,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// Register a participant.
    ///
    /// # Errors
    ///
    /// Returns a conflict when the session is terminal, full, or the user
    /// is already registered.
    pub fn add_participant(
        &mut self,
        user_id: Uuid,
        name: String,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status.is_terminal() || self.status == ExperienceStatus::InProgress {
            return Err(DomainError::Conflict(format!(
                "experience {} is {}; registration closed",
                self.id,
                self.status.as_str()
            )));
        }
        if self.participants.len() as u32 >= self.max_participants {
            return Err(DomainError::Conflict(format!(
                "experience {} is full ({} participants)",
                self.id, self.max_participants
            )));
        }
        if self.participants.iter().any(|p| p.user_id == user_id) {
            return Err(DomainError::Conflict(format!(
                "user {user_id} already registered for experience {}",
                self.id
            )));
        }
        self.participants.push(Participant { user_id, name });
        self.updated_at = now;
        Ok(())
    }

    /// Record that the safety briefing was held. Idempotent.
    pub fn complete_safety_briefing(&mut self, now: DateTime<Utc>) {
        if !self.safety_briefing.completed {
            self.safety_briefing.completed = true;
            self.safety_briefing.completed_at = Some(now);
            self.updated_at = now;
        }
    }

    /// `scheduled → confirmed`.
    ///
    /// # Errors
    ///
    /// Returns a conflict unless the session is `scheduled`.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != ExperienceStatus::Scheduled {
            return Err(self.invalid_transition(ExperienceStatus::Confirmed));
        }
        self.status = ExperienceStatus::Confirmed;
        self.updated_at = now;
        Ok(())
    }

    /// `confirmed → in_progress`. Gated on the safety briefing.
    ///
    /// # Errors
    ///
    /// Returns a conflict unless the session is `confirmed` with the
    /// briefing completed.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != ExperienceStatus::Confirmed {
            return Err(self.invalid_transition(ExperienceStatus::InProgress));
        }
        if !self.safety_briefing.completed {
            return Err(DomainError::Conflict(format!(
                "experience {} cannot start before the safety briefing",
                self.id
            )));
        }
        self.status = ExperienceStatus::InProgress;
        self.updated_at = now;
        Ok(())
    }

    /// `in_progress → completed`.
    ///
    /// # Errors
    ///
    /// Returns a conflict unless the session is `in_progress`.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != ExperienceStatus::InProgress {
            return Err(self.invalid_transition(ExperienceStatus::Completed));
        }
        self.status = ExperienceStatus::Completed;
        self.updated_at = now;
        Ok(())
    }

    /// Cancel a session that has not finished.
    ///
    /// # Errors
    ///
    /// Returns a conflict when the session is already terminal.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(self.invalid_transition(ExperienceStatus::Cancelled));
        }
        self.status = ExperienceStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Submit feedback after completion. One entry per author.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a rating outside 1–5 and a conflict
    /// when the session is not completed or the author already reviewed.
    pub fn add_feedback(
        &mut self,
        author_id: Uuid,
        rating: u8,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !(1..=5).contains(&rating) {
            return Err(DomainError::Validation(format!(
                "rating must be between 1 and 5, got {rating}"
            )));
        }
        if self.status != ExperienceStatus::Completed {
            return Err(DomainError::Conflict(format!(
                "experience {} is {}; feedback opens after completion",
                self.id,
                self.status.as_str()
            )));
        }
        if self.feedback.iter().any(|f| f.author_id == author_id) {
            return Err(DomainError::Conflict(format!(
                "user {author_id} already reviewed experience {}",
                self.id
            )));
        }
        self.feedback.push(Feedback {
            author_id,
            rating,
            comment,
            submitted_at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Record that the reminder sweep notified the owner. Idempotent.
    pub fn mark_reminder_sent(&mut self, now: DateTime<Utc>) {
        if !self.reminder_sent {
            self.reminder_sent = true;
            self.updated_at = now;
        }
    }

    /// Record that a weather alert went out for this session. Idempotent.
    pub fn mark_weather_alerted(&mut self, now: DateTime<Utc>) {
        if !self.weather_alerted {
            self.weather_alerted = true;
            self.updated_at = now;
        }
    }

    fn invalid_transition(&self, to: ExperienceStatus) -> DomainError {
        DomainError::Conflict(format!(
            "invalid transition {} -> {} for experience {}",
            self.status.as_str(),
            to.as_str(),
            self.id
        ))
    }
}
