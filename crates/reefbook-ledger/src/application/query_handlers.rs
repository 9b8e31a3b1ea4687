//! Query handlers for the Booking Ledger context.
//!
//! This module contains query handlers that load aggregates from the
//! stores and return read-only view DTOs shaped for API responses.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use reefbook_core::actor::Actor;
use reefbook_core::authz::{self, Action, Resource};
use reefbook_core::error::DomainError;

use crate::domain::booking::{Booking, Cancellation, Certificate, Fulfillment};
use crate::domain::experience::Experience;
use crate::domain::package::Package;
use crate::store::{BookingStore, ExperienceStore, PackageStore, Page};

/// Read-only view of a booking.
#[derive(Debug, Serialize)]
pub struct BookingView {
    /// The booking identifier.
    pub id: Uuid,
    /// Human-readable external reference.
    pub booking_number: String,
    /// The owning customer.
    pub customer_id: Uuid,
    /// The purchased package.
    pub package_id: Uuid,
    /// Units purchased.
    pub quantity: u32,
    /// Price per unit at purchase time.
    pub unit_price: i64,
    /// Discount percentage applied at purchase time.
    pub discount_pct: f64,
    /// Total charged.
    pub total_amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Lifecycle status.
    pub status: &'static str,
    /// Payment status.
    pub payment_status: &'static str,
    /// Payment method, when a payment was opened.
    pub payment_method: Option<&'static str>,
    /// Coarse fulfillment progress for client display.
    pub progress_pct: u8,
    /// When the payment was verified.
    pub paid_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl BookingView {
    fn from_booking(booking: &Booking) -> Self {
        Self {
            id: booking.id,
            booking_number: booking.booking_number.clone(),
            customer_id: booking.customer_id,
            package_id: booking.package_id,
            quantity: booking.quantity,
            unit_price: booking.unit_price,
            discount_pct: booking.discount_pct,
            total_amount: booking.total_amount,
            currency: booking.currency.clone(),
            status: booking.status.as_str(),
            payment_status: booking.payment_status.as_str(),
            payment_method: booking.payment_method.map(|m| m.as_str()),
            progress_pct: booking.progress_pct(),
            paid_at: booking.paid_at,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}

/// One entry in a booking's fulfillment timeline.
#[derive(Debug, Serialize)]
pub struct ProgressEntryView {
    /// The entry identifier.
    pub id: Uuid,
    /// The lifecycle stage at the time of the report.
    pub stage: &'static str,
    /// Staff-written description.
    pub description: String,
    /// Attached media references.
    pub media: Vec<String>,
    /// Who reported it.
    pub reported_by: Uuid,
    /// When it was reported.
    pub reported_at: DateTime<Utc>,
}

/// Detailed booking view with sub-records and the timeline.
#[derive(Debug, Serialize)]
pub struct BookingDetailView {
    /// The summary view.
    #[serde(flatten)]
    pub booking: BookingView,
    /// Fulfillment dates and location snapshot.
    pub fulfillment: Fulfillment,
    /// Completion certificate.
    pub certificate: Certificate,
    /// Cancellation record, if any.
    pub cancellation: Option<Cancellation>,
    /// The timeline, oldest first.
    pub timeline: Vec<ProgressEntryView>,
}

/// Read-only view of a completion certificate.
#[derive(Debug, Serialize)]
pub struct CertificateView {
    /// The booking's external reference.
    pub booking_number: String,
    /// Reference to the rendered artifact.
    pub artifact: String,
    /// When it was issued.
    pub generated_at: Option<DateTime<Utc>>,
}

/// Read-only view of an experience session.
#[derive(Debug, Serialize)]
pub struct ExperienceView {
    /// The session identifier.
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
    /// Registered participants so far.
    pub participant_count: u32,
    /// Whether the safety briefing was held.
    pub safety_briefing_completed: bool,
    /// Session status.
    pub status: &'static str,
    /// Average feedback rating, once feedback exists.
    pub average_rating: Option<f64>,
}

impl ExperienceView {
    fn from_experience(experience: &Experience) -> Self {
        let average_rating = if experience.feedback.is_empty() {
            None
        } else {
            let sum: u32 = experience.feedback.iter().map(|f| u32::from(f.rating)).sum();
            Some(f64::from(sum) / experience.feedback.len() as f64)
        };
        Self {
            id: experience.id,
            booking_id: experience.booking_id,
            title: experience.title.clone(),
            scheduled_at: experience.scheduled_at,
            duration_minutes: experience.duration_minutes,
            location: experience.location.clone(),
            max_participants: experience.max_participants,
            participant_count: experience.participants.len() as u32,
            safety_briefing_completed: experience.safety_briefing.completed,
            status: experience.status.as_str(),
            average_rating,
        }
    }
}

/// Read-only view of a catalog package.
#[derive(Debug, Serialize)]
pub struct PackageView {
    /// The package identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// The cultivated species.
    pub coral_species: String,
    /// Cultivation site.
    pub location: String,
    /// Price per unit.
    pub unit_price: i64,
    /// ISO currency code.
    pub currency: String,
    /// Cultivation duration.
    pub duration_months: u32,
    /// Capacity cap.
    pub max_capacity: u32,
    /// Units still bookable.
    pub remaining_capacity: u32,
    /// Whether the package is on sale.
    pub active: bool,
}

impl PackageView {
    fn from_package(package: &Package) -> Self {
        Self {
            id: package.id,
            name: package.name.clone(),
            coral_species: package.coral_species.clone(),
            location: package.location.clone(),
            unit_price: package.unit_price,
            currency: package.currency.clone(),
            duration_months: package.duration_months,
            max_capacity: package.max_capacity,
            remaining_capacity: package.remaining_capacity(),
            active: package.active,
        }
    }
}

async fn load_authorized(
    actor: &Actor,
    booking_id: Uuid,
    bookings: &dyn BookingStore,
) -> Result<Booking, DomainError> {
    let booking = bookings
        .find(booking_id)
        .await?
        .ok_or(DomainError::NotFound {
            entity: "booking",
            id: booking_id.to_string(),
        })?;
    authz::authorize(
        actor,
        Action::ViewBooking,
        Resource::Booking {
            owner: booking.customer_id,
        },
    )?;
    Ok(booking)
}

/// Retrieves a booking summary.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown id and
/// `DomainError::Unauthorized` for a foreign booking.
pub async fn get_booking(
    actor: &Actor,
    booking_id: Uuid,
    bookings: &dyn BookingStore,
) -> Result<BookingView, DomainError> {
    let booking = load_authorized(actor, booking_id, bookings).await?;
    Ok(BookingView::from_booking(&booking))
}

/// Retrieves a booking with its sub-records and fulfillment timeline.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown id and
/// `DomainError::Unauthorized` for a foreign booking.
pub async fn get_booking_detail(
    actor: &Actor,
    booking_id: Uuid,
    bookings: &dyn BookingStore,
) -> Result<BookingDetailView, DomainError> {
    let booking = load_authorized(actor, booking_id, bookings).await?;
    let timeline = bookings
        .list_progress(booking.id)
        .await?
        .into_iter()
        .map(|entry| ProgressEntryView {
            id: entry.id,
            stage: entry.stage.as_str(),
            description: entry.description,
            media: entry.media,
            reported_by: entry.reported_by,
            reported_at: entry.reported_at,
        })
        .collect();
    Ok(BookingDetailView {
        fulfillment: booking.fulfillment.clone(),
        certificate: booking.certificate.clone(),
        cancellation: booking.cancellation.clone(),
        booking: BookingView::from_booking(&booking),
        timeline,
    })
}

/// Lists a customer's bookings, newest first.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` when a customer asks for another
/// customer's list.
pub async fn list_bookings_for_customer(
    actor: &Actor,
    customer_id: Uuid,
    page: Page,
    bookings: &dyn BookingStore,
) -> Result<Vec<BookingView>, DomainError> {
    authz::authorize(
        actor,
        Action::ViewBooking,
        Resource::Booking { owner: customer_id },
    )?;
    let bookings = bookings.list_for_customer(customer_id, page).await?;
    Ok(bookings.iter().map(BookingView::from_booking).collect())
}

/// Retrieves the completion certificate of a booking.
///
/// # Errors
///
/// Returns `DomainError::Conflict` until the certificate has been
/// issued.
pub async fn get_certificate(
    actor: &Actor,
    booking_id: Uuid,
    bookings: &dyn BookingStore,
) -> Result<CertificateView, DomainError> {
    let booking = load_authorized(actor, booking_id, bookings).await?;
    let artifact = booking
        .certificate
        .artifact
        .clone()
        .filter(|_| booking.certificate.generated)
        .ok_or_else(|| {
            DomainError::Conflict(format!(
                "booking {} has no certificate yet",
                booking.booking_number
            ))
        })?;
    Ok(CertificateView {
        booking_number: booking.booking_number,
        artifact,
        generated_at: booking.certificate.generated_at,
    })
}

/// Lists the experience sessions scheduled under a booking.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown booking and
/// `DomainError::Unauthorized` for a foreign booking.
pub async fn list_experiences_for_booking(
    actor: &Actor,
    booking_id: Uuid,
    bookings: &dyn BookingStore,
    experiences: &dyn ExperienceStore,
) -> Result<Vec<ExperienceView>, DomainError> {
    let booking = load_authorized(actor, booking_id, bookings).await?;
    let sessions = experiences.list_for_booking(booking.id).await?;
    Ok(sessions
        .into_iter()
        .map(|e| ExperienceView::from_experience(&e))
        .collect())
}

/// Retrieves one catalog package. Public.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown id.
pub async fn get_package(
    package_id: Uuid,
    packages: &dyn PackageStore,
) -> Result<PackageView, DomainError> {
    let package = packages
        .find(package_id)
        .await?
        .ok_or(DomainError::NotFound {
            entity: "package",
            id: package_id.to_string(),
        })?;
    Ok(PackageView::from_package(&package))
}

/// Lists the packages currently on sale. Public.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` when the store fails.
pub async fn list_active_packages(
    packages: &dyn PackageStore,
) -> Result<Vec<PackageView>, DomainError> {
    let active = packages.list_active().await?;
    Ok(active.iter().map(PackageView::from_package).collect())
}
