//! Routes for experience sessions.
//!
//! Scheduling and listing hang off the owning booking; the per-session
//! operations (participants, briefing, status, feedback) live under
//! `/api/experiences`.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use reefbook_core::error::DomainError;
use reefbook_ledger::application::command_handlers;
use reefbook_ledger::application::query_handlers::{self, ExperienceView};
use reefbook_ledger::domain::commands::{
    AddParticipant, CompleteSafetyBriefing, ScheduleExperience, SubmitFeedback,
    TransitionExperience,
};
use reefbook_ledger::domain::experience::ExperienceStatus;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::notifier;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScheduleExperienceRequest {
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub location: Option<String>,
    pub max_participants: u32,
}

#[derive(Debug, Serialize)]
pub struct ExperienceScheduledResponse {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct AddParticipantRequest {
    /// Defaults to the acting user.
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ParticipantAddedResponse {
    pub experience_id: Uuid,
    pub participant_count: u32,
}

#[derive(Debug, Serialize)]
pub struct SafetyBriefingResponse {
    pub experience_id: Uuid,
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct TransitionExperienceRequest {
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct ExperienceTransitionedResponse {
    pub experience_id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub experience_id: Uuid,
    pub average_rating: Option<f64>,
}

/// POST /api/bookings/{id}/experiences
#[instrument(skip(state, user, request), fields(title = %request.title))]
async fn schedule_experience(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<ScheduleExperienceRequest>,
) -> Result<Json<ExperienceScheduledResponse>, ApiError> {
    let command = ScheduleExperience {
        actor: user.0,
        booking_id,
        title: request.title,
        scheduled_at: request.scheduled_at,
        duration_minutes: request.duration_minutes,
        location: request.location,
        max_participants: request.max_participants,
    };
    let result = command_handlers::handle_schedule_experience(
        &command,
        &*state.clock,
        &*state.bookings,
        &*state.packages,
        &*state.experiences,
    )
    .await?;
    notifier::dispatch(&state, &result.events).await;

    let experience = result.experience;
    info!(experience_id = %experience.id, booking_id = %booking_id, "experience scheduled");

    Ok(Json(ExperienceScheduledResponse {
        id: experience.id,
        booking_id: experience.booking_id,
        title: experience.title,
        scheduled_at: experience.scheduled_at,
        status: experience.status.as_str(),
    }))
}

/// GET /api/bookings/{id}/experiences
async fn list_experiences(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Vec<ExperienceView>>, ApiError> {
    let views = query_handlers::list_experiences_for_booking(
        &user.0,
        booking_id,
        &*state.bookings,
        &*state.experiences,
    )
    .await?;
    Ok(Json(views))
}

/// POST /api/experiences/{id}/participants
#[instrument(skip(state, user, request))]
async fn add_participant(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AddParticipantRequest>,
) -> Result<Json<ParticipantAddedResponse>, ApiError> {
    let command = AddParticipant {
        actor: user.0,
        experience_id: id,
        user_id: request.user_id.unwrap_or(user.0.user_id),
        name: request.name,
    };
    let result = command_handlers::handle_add_participant(
        &command,
        &*state.clock,
        &*state.bookings,
        &*state.experiences,
    )
    .await?;
    notifier::dispatch(&state, &result.events).await;

    Ok(Json(ParticipantAddedResponse {
        experience_id: result.experience.id,
        participant_count: result.experience.participants.len() as u32,
    }))
}

/// POST /api/experiences/{id}/safety-briefing
#[instrument(skip(state, user))]
async fn complete_safety_briefing(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SafetyBriefingResponse>, ApiError> {
    let command = CompleteSafetyBriefing {
        actor: user.0,
        experience_id: id,
    };
    let result = command_handlers::handle_complete_safety_briefing(
        &command,
        &*state.clock,
        &*state.bookings,
        &*state.experiences,
    )
    .await?;
    notifier::dispatch(&state, &result.events).await;

    Ok(Json(SafetyBriefingResponse {
        experience_id: result.experience.id,
        completed: result.experience.safety_briefing.completed,
    }))
}

/// POST /api/experiences/{id}/status
#[instrument(skip(state, user, request), fields(to = %request.to))]
async fn transition_experience(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionExperienceRequest>,
) -> Result<Json<ExperienceTransitionedResponse>, ApiError> {
    let to = ExperienceStatus::parse(&request.to).ok_or_else(|| {
        DomainError::Validation(format!("unknown experience status {:?}", request.to))
    })?;
    let command = TransitionExperience {
        actor: user.0,
        experience_id: id,
        to,
    };
    let result = command_handlers::handle_transition_experience(
        &command,
        &*state.clock,
        &*state.bookings,
        &*state.experiences,
    )
    .await?;
    notifier::dispatch(&state, &result.events).await;

    Ok(Json(ExperienceTransitionedResponse {
        experience_id: result.experience.id,
        status: result.experience.status.as_str(),
    }))
}

/// POST /api/experiences/{id}/feedback
#[instrument(skip(state, user, request))]
async fn submit_feedback(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let command = SubmitFeedback {
        actor: user.0,
        experience_id: id,
        rating: request.rating,
        comment: request.comment,
    };
    let result =
        command_handlers::handle_submit_feedback(&command, &*state.clock, &*state.experiences)
            .await?;
    notifier::dispatch(&state, &result.events).await;

    let experience = result.experience;
    let average_rating = if experience.feedback.is_empty() {
        None
    } else {
        let sum: u32 = experience.feedback.iter().map(|f| u32::from(f.rating)).sum();
        Some(f64::from(sum) / experience.feedback.len() as f64)
    };
    Ok(Json(FeedbackResponse {
        experience_id: experience.id,
        average_rating,
    }))
}

/// Routes mounted under `/api/bookings`.
pub fn booking_router() -> Router<AppState> {
    Router::new().route(
        "/{id}/experiences",
        post(schedule_experience).get(list_experiences),
    )
}

/// Routes mounted under `/api/experiences`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/participants", post(add_participant))
        .route("/{id}/safety-briefing", post(complete_safety_briefing))
        .route("/{id}/status", post(transition_experience))
        .route("/{id}/feedback", post(submit_feedback))
}
