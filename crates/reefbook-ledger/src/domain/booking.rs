//! The Booking aggregate and its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reefbook_core::actor::Actor;
use reefbook_core::error::DomainError;
use reefbook_core::money;
use reefbook_core::policy::BusinessPolicy;

/// Lifecycle status of a booking.
///
/// The happy path is `pending → confirmed → processing → growing →
/// completed`; `cancelled` and `refunded` are alternate terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, awaiting payment.
    Pending,
    /// Payment verified.
    Confirmed,
    /// Fulfillment preparation under way.
    Processing,
    /// Cultivation in progress.
    Growing,
    /// Fulfillment finished.
    Completed,
    /// Cancelled before completion.
    Cancelled,
    /// Paid amount returned, capacity released.
    Refunded,
}

impl BookingStatus {
    /// Wire representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Processing => "processing",
            BookingStatus::Growing => "growing",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Refunded => "refunded",
        }
    }

    /// Parse a status from its wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<BookingStatus> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "processing" => Some(BookingStatus::Processing),
            "growing" => Some(BookingStatus::Growing),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "refunded" => Some(BookingStatus::Refunded),
            _ => None,
        }
    }

    /// True once the booking can no longer move to another status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Refunded
        )
    }

    /// Coarse fulfillment progress for client display.
    #[must_use]
    pub fn progress_pct(&self) -> u8 {
        match self {
            BookingStatus::Pending => 10,
            BookingStatus::Confirmed => 20,
            BookingStatus::Processing => 30,
            BookingStatus::Growing => 70,
            BookingStatus::Completed => 100,
            BookingStatus::Cancelled | BookingStatus::Refunded => 0,
        }
    }
}

/// Payment status of a booking, tracked independently of the lifecycle.
///
/// Moves `pending → {paid, failed}` and `paid → refunded`. A late gateway
/// success may move `failed → paid`; `paid` and `refunded` never revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No verified payment yet.
    Pending,
    /// Payment verified.
    Paid,
    /// The gateway reported a failure.
    Failed,
    /// The paid amount was returned.
    Refunded,
}

impl PaymentStatus {
    /// Wire representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Parse a status from its wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<PaymentStatus> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

/// How a booking is being paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Signed gateway transaction with asynchronous callback.
    Gateway,
    /// Manual bank transfer confirmed by an administrator.
    BankTransfer,
}

impl PaymentMethod {
    /// Wire representation of the method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Gateway => "gateway",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }

    /// Parse a method from its wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<PaymentMethod> {
        match s {
            "gateway" => Some(PaymentMethod::Gateway),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            _ => None,
        }
    }
}

/// Fulfillment sub-record: dates and the location snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fulfillment {
    /// When cultivation started.
    pub start_date: Option<DateTime<Utc>>,
    /// Estimated completion, derived from the package duration.
    pub estimated_completion: Option<DateTime<Utc>>,
    /// Actual completion.
    pub actual_completion: Option<DateTime<Utc>>,
    /// Location snapshot taken when processing starts, so later catalog
    /// edits do not rewrite history.
    pub location: Option<String>,
    /// Closing report written at completion.
    pub final_report: Option<String>,
}

/// Certificate sub-record. Issued at most once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Certificate {
    /// Whether the certificate has been issued.
    pub generated: bool,
    /// Reference to the rendered artifact.
    pub artifact: Option<String>,
    /// When it was issued.
    pub generated_at: Option<DateTime<Utc>>,
}

/// Cancellation sub-record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cancellation {
    /// Free-text reason.
    pub reason: String,
    /// When the booking was cancelled or refunded.
    pub cancelled_at: DateTime<Utc>,
    /// Amount owed back to the customer.
    pub refund_amount: i64,
    /// The actor who processed it.
    pub processed_by: Uuid,
}

/// The aggregate root for one purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Human-readable external reference, immutable once assigned.
    pub booking_number: String,
    /// The customer who placed the booking.
    pub customer_id: Uuid,
    /// The purchased package.
    pub package_id: Uuid,
    /// Units purchased, at least 1.
    pub quantity: u32,
    /// Price per unit at purchase time.
    pub unit_price: i64,
    /// Percentage discount applied at purchase time.
    pub discount_pct: f64,
    /// `round(quantity × unit_price × (1 − discount/100))`.
    pub total_amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Payment status.
    pub payment_status: PaymentStatus,
    /// Payment method, set when a payment is opened.
    pub payment_method: Option<PaymentMethod>,
    /// Gateway order id or transfer code correlating external payments.
    pub payment_id: Option<String>,
    /// Gateway transaction id recorded on verified payment.
    pub transaction_id: Option<String>,
    /// When the payment was verified.
    pub paid_at: Option<DateTime<Utc>>,
    /// Fulfillment dates and location snapshot.
    pub fulfillment: Fulfillment,
    /// Completion certificate.
    pub certificate: Certificate,
    /// Set when the booking is cancelled or refunded.
    pub cancellation: Option<Cancellation>,
    /// Day thresholds for which a payment reminder has been sent.
    pub payment_reminders_sent: Vec<i64>,
    /// Day count of the last growth update, a scheduler marker.
    pub last_growth_update_day: Option<i64>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Revision for conditional updates.
    pub revision: i64,
}

impl Booking {
    /// Creates a new pending booking with the computed total.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        booking_number: String,
        customer_id: Uuid,
        package_id: Uuid,
        quantity: u32,
        unit_price: i64,
        discount_pct: f64,
        currency: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            booking_number,
            customer_id,
            package_id,
            quantity,
            unit_price,
            discount_pct,
            total_amount: money::discounted_total(quantity, unit_price, discount_pct),
            currency,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            payment_id: None,
            transaction_id: None,
            paid_at: None,
            fulfillment: Fulfillment::default(),
            certificate: Certificate::default(),
            cancellation: None,
            payment_reminders_sent: Vec::new(),
            last_growth_update_day: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// True once a verified payment is recorded.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Coarse fulfillment progress for client display.
    #[must_use]
    pub fn progress_pct(&self) -> u8 {
        self.status.progress_pct()
    }

    /// Assign the external payment correlation before submitting to a
    /// gateway or issuing transfer instructions.
    ///
    /// # Errors
    ///
    /// Returns a conflict when the booking is already paid or terminal.
    pub fn open_payment(
        &mut self,
        method: PaymentMethod,
        payment_id: String,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.is_paid() {
            return Err(DomainError::Conflict(format!(
                "booking {} is already paid",
                self.booking_number
            )));
        }
        if self.status.is_terminal() {
            return Err(DomainError::Conflict(format!(
                "booking {} is {}; cannot open a payment",
                self.booking_number,
                self.status.as_str()
            )));
        }
        self.payment_method = Some(method);
        self.payment_id = Some(payment_id);
        self.updated_at = now;
        Ok(())
    }

    /// Apply a verified payment: `pending → confirmed`, payment status
    /// `paid`, transaction recorded.
    ///
    /// Callers handling at-least-once callbacks must treat an
    /// already-paid booking as a no-op *before* calling this; here a
    /// repeated application is a conflict so it can never double-apply.
    ///
    /// # Errors
    ///
    /// Returns a conflict when already paid, refunded, or not in a
    /// payable lifecycle status.
    pub fn confirm_payment(
        &mut self,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        match self.payment_status {
            PaymentStatus::Pending | PaymentStatus::Failed => {}
            PaymentStatus::Paid => {
                return Err(DomainError::Conflict(format!(
                    "booking {} is already paid",
                    self.booking_number
                )));
            }
            PaymentStatus::Refunded => {
                return Err(DomainError::Conflict(format!(
                    "booking {} was refunded; payment cannot reapply",
                    self.booking_number
                )));
            }
        }
        if self.status != BookingStatus::Pending {
            return Err(DomainError::Conflict(format!(
                "booking {} is {}; cannot confirm payment",
                self.booking_number,
                self.status.as_str()
            )));
        }
        self.payment_status = PaymentStatus::Paid;
        self.transaction_id = Some(transaction_id.to_owned());
        self.paid_at = Some(now);
        self.status = BookingStatus::Confirmed;
        self.updated_at = now;
        Ok(())
    }

    /// Record a gateway payment failure. The lifecycle status is
    /// untouched so the customer can retry.
    ///
    /// # Errors
    ///
    /// Returns a conflict when the payment is already paid, refunded, or
    /// already marked failed.
    pub fn record_payment_failure(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        match self.payment_status {
            PaymentStatus::Pending => {}
            PaymentStatus::Failed => {
                return Err(DomainError::Conflict(format!(
                    "booking {} already marked failed",
                    self.booking_number
                )));
            }
            PaymentStatus::Paid | PaymentStatus::Refunded => {
                return Err(DomainError::Conflict(format!(
                    "booking {} payment is {}; failure cannot apply",
                    self.booking_number,
                    self.payment_status.as_str()
                )));
            }
        }
        self.payment_status = PaymentStatus::Failed;
        self.updated_at = now;
        Ok(())
    }

    /// Start fulfillment: `confirmed → processing`. Snapshots the
    /// location and derives the estimated completion date.
    ///
    /// # Errors
    ///
    /// Returns a conflict unless the booking is `confirmed`.
    pub fn begin_processing(
        &mut self,
        location: &str,
        duration_months: u32,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status != BookingStatus::Confirmed {
            return Err(self.invalid_transition(BookingStatus::Processing));
        }
        self.status = BookingStatus::Processing;
        self.fulfillment.start_date = Some(now);
        self.fulfillment.estimated_completion =
            Some(now + chrono::Duration::days(i64::from(duration_months) * 30));
        self.fulfillment.location = Some(location.to_owned());
        self.updated_at = now;
        Ok(())
    }

    /// `processing → growing`.
    ///
    /// # Errors
    ///
    /// Returns a conflict unless the booking is `processing`.
    pub fn advance_to_growing(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != BookingStatus::Processing {
            return Err(self.invalid_transition(BookingStatus::Growing));
        }
        self.status = BookingStatus::Growing;
        self.updated_at = now;
        Ok(())
    }

    /// Finish fulfillment: any active status → `completed`, first time
    /// only. Issues the certificate if it has not been issued yet and
    /// returns whether this call issued it.
    ///
    /// # Errors
    ///
    /// Returns a conflict when the booking is already terminal or still
    /// awaiting payment.
    pub fn complete(
        &mut self,
        final_report: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        match self.status {
            BookingStatus::Confirmed | BookingStatus::Processing | BookingStatus::Growing => {}
            _ => return Err(self.invalid_transition(BookingStatus::Completed)),
        }
        self.status = BookingStatus::Completed;
        self.fulfillment.actual_completion = Some(now);
        if final_report.is_some() {
            self.fulfillment.final_report = final_report;
        }
        let issued = if self.certificate.generated {
            false
        } else {
            self.certificate.generated = true;
            self.certificate.artifact = Some(format!("certificates/{}.pdf", self.booking_number));
            self.certificate.generated_at = Some(now);
            true
        };
        self.updated_at = now;
        Ok(issued)
    }

    /// Cancel the booking: `pending`/`confirmed` → `cancelled`. The
    /// refund amount is recorded from policy (full for `pending`, reduced
    /// for `confirmed`) and returned.
    ///
    /// # Errors
    ///
    /// Returns a conflict for any other current status.
    pub fn cancel(
        &mut self,
        actor: &Actor,
        reason: Option<String>,
        policy: &BusinessPolicy,
        now: DateTime<Utc>,
    ) -> Result<i64, DomainError> {
        let refund_pct = match self.status {
            BookingStatus::Pending => policy.pending_refund_pct,
            BookingStatus::Confirmed => policy.confirmed_refund_pct,
            _ => return Err(self.invalid_transition(BookingStatus::Cancelled)),
        };
        let refund_amount = money::percentage_of(self.total_amount, refund_pct);
        self.status = BookingStatus::Cancelled;
        self.cancellation = Some(Cancellation {
            reason: reason.unwrap_or_else(|| "Cancelled by user".to_owned()),
            cancelled_at: now,
            refund_amount,
            processed_by: actor.user_id,
        });
        self.updated_at = now;
        Ok(refund_amount)
    }

    /// Refund a paid booking: both statuses become `refunded`.
    ///
    /// # Errors
    ///
    /// Returns a conflict when the booking is unpaid, already refunded,
    /// or `amount` exceeds the total.
    pub fn refund(
        &mut self,
        actor: &Actor,
        amount: Option<i64>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<i64, DomainError> {
        if self.status == BookingStatus::Refunded {
            return Err(DomainError::Conflict(format!(
                "booking {} already refunded",
                self.booking_number
            )));
        }
        if !self.is_paid() {
            return Err(DomainError::Conflict(format!(
                "booking {} is not paid; nothing to refund",
                self.booking_number
            )));
        }
        let refund_amount = amount.unwrap_or(self.total_amount);
        if refund_amount > self.total_amount {
            return Err(DomainError::Validation(format!(
                "refund {} exceeds booking total {}",
                refund_amount, self.total_amount
            )));
        }
        self.payment_status = PaymentStatus::Refunded;
        self.status = BookingStatus::Refunded;
        self.cancellation = Some(Cancellation {
            reason: reason.unwrap_or_else(|| "Refund processed by admin".to_owned()),
            cancelled_at: now,
            refund_amount,
            processed_by: actor.user_id,
        });
        self.updated_at = now;
        Ok(refund_amount)
    }

    /// Record that the reminder for `days` pending was sent.
    pub fn mark_payment_reminder_sent(&mut self, days: i64, now: DateTime<Utc>) {
        if !self.payment_reminders_sent.contains(&days) {
            self.payment_reminders_sent.push(days);
            self.updated_at = now;
        }
    }

    /// Record that the growth update for cultivation day `day` was sent.
    pub fn mark_growth_update_sent(&mut self, day: i64, now: DateTime<Utc>) {
        if self.last_growth_update_day != Some(day) {
            self.last_growth_update_day = Some(day);
            self.updated_at = now;
        }
    }

    fn invalid_transition(&self, to: BookingStatus) -> DomainError {
        DomainError::Conflict(format!(
            "invalid transition {} -> {} for booking {}",
            self.status.as_str(),
            to.as_str(),
            self.booking_number
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use reefbook_core::actor::Role;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn pending_booking() -> Booking {
        Booking::new(
            Uuid::new_v4(),
            "CR17370000000001".to_owned(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            2,
            500_000,
            10.0,
            "VND".to_owned(),
            fixed_now(),
        )
    }

    #[test]
    fn test_new_booking_computes_discounted_total() {
        // Arrange / Act
        let booking = pending_booking();

        // Assert
        assert_eq!(booking.total_amount, 900_000);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert_eq!(booking.progress_pct(), 10);
    }

    #[test]
    fn test_confirm_payment_moves_pending_to_confirmed() {
        // Arrange
        let mut booking = pending_booking();

        // Act
        booking.confirm_payment("GW-12345", fixed_now()).unwrap();

        // Assert
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.payment_status, PaymentStatus::Paid);
        assert_eq!(booking.transaction_id.as_deref(), Some("GW-12345"));
        assert_eq!(booking.paid_at, Some(fixed_now()));
        assert_eq!(booking.progress_pct(), 20);
    }

    #[test]
    fn test_confirm_payment_twice_is_a_conflict() {
        // Arrange
        let mut booking = pending_booking();
        booking.confirm_payment("GW-1", fixed_now()).unwrap();

        // Act
        let result = booking.confirm_payment("GW-2", fixed_now());

        // Assert
        assert!(matches!(result, Err(DomainError::Conflict(_))));
        assert_eq!(booking.transaction_id.as_deref(), Some("GW-1"));
    }

    #[test]
    fn test_late_success_after_failure_is_allowed() {
        // Arrange
        let mut booking = pending_booking();
        booking.record_payment_failure(fixed_now()).unwrap();

        // Act
        let result = booking.confirm_payment("GW-late", fixed_now());

        // Assert
        assert!(result.is_ok());
        assert_eq!(booking.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_payment_status_never_reverts_from_refunded() {
        // Arrange
        let mut booking = pending_booking();
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        booking.confirm_payment("GW-1", fixed_now()).unwrap();
        booking.refund(&admin, None, None, fixed_now()).unwrap();

        // Act
        let result = booking.confirm_payment("GW-2", fixed_now());

        // Assert
        assert!(matches!(result, Err(DomainError::Conflict(_))));
        assert_eq!(booking.payment_status, PaymentStatus::Refunded);
    }

    #[test]
    fn test_full_lifecycle_reaches_completed_and_issues_certificate_once() {
        // Arrange
        let mut booking = pending_booking();
        booking.confirm_payment("GW-1", fixed_now()).unwrap();
        booking.begin_processing("Nha Trang", 6, fixed_now()).unwrap();
        booking.advance_to_growing(fixed_now()).unwrap();

        // Act
        let issued = booking.complete(Some("Healthy colony".to_owned()), fixed_now()).unwrap();

        // Assert
        assert!(issued);
        assert_eq!(booking.status, BookingStatus::Completed);
        assert!(booking.certificate.generated);
        assert_eq!(booking.progress_pct(), 100);
        assert!(booking.fulfillment.actual_completion.is_some());

        // A second completion is an invalid transition, so the
        // certificate can never be issued twice.
        assert!(booking.complete(None, fixed_now()).is_err());
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        // Arrange
        let mut booking = pending_booking();
        booking.confirm_payment("GW-1", fixed_now()).unwrap();

        // Act
        let result = booking.advance_to_growing(fixed_now());

        // Assert
        assert!(matches!(result, Err(DomainError::Conflict(_))));
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_cancel_pending_records_full_refund() {
        // Arrange
        let mut booking = pending_booking();
        let owner = Actor::new(booking.customer_id, Role::Customer);
        let policy = BusinessPolicy::default();

        // Act
        let refund = booking.cancel(&owner, None, &policy, fixed_now()).unwrap();

        // Assert
        assert_eq!(refund, 900_000);
        assert_eq!(booking.status, BookingStatus::Cancelled);
        let cancellation = booking.cancellation.unwrap();
        assert_eq!(cancellation.refund_amount, 900_000);
        assert_eq!(cancellation.reason, "Cancelled by user");
    }

    #[test]
    fn test_cancel_confirmed_records_eighty_percent_refund() {
        // Arrange
        let mut booking = pending_booking();
        booking.confirm_payment("GW-1", fixed_now()).unwrap();
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        let policy = BusinessPolicy::default();

        // Act
        let refund = booking
            .cancel(&admin, Some("Weather".to_owned()), &policy, fixed_now())
            .unwrap();

        // Assert
        assert_eq!(refund, 720_000);
        assert_eq!(booking.status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_cancel_growing_booking_is_rejected() {
        // Arrange
        let mut booking = pending_booking();
        booking.confirm_payment("GW-1", fixed_now()).unwrap();
        booking.begin_processing("Nha Trang", 6, fixed_now()).unwrap();
        booking.advance_to_growing(fixed_now()).unwrap();
        let owner = Actor::new(booking.customer_id, Role::Customer);

        // Act
        let result = booking.cancel(&owner, None, &BusinessPolicy::default(), fixed_now());

        // Assert
        assert!(matches!(result, Err(DomainError::Conflict(_))));
        assert_eq!(booking.status, BookingStatus::Growing);
    }

    #[test]
    fn test_refund_caps_at_total_and_defaults_to_full() {
        // Arrange
        let mut booking = pending_booking();
        booking.confirm_payment("GW-1", fixed_now()).unwrap();
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);

        // Act & Assert
        assert!(matches!(
            booking.refund(&admin, Some(1_000_000), None, fixed_now()),
            Err(DomainError::Validation(_))
        ));
        let refunded = booking.refund(&admin, None, None, fixed_now()).unwrap();
        assert_eq!(refunded, 900_000);
        assert_eq!(booking.payment_status, PaymentStatus::Refunded);
        assert_eq!(booking.status, BookingStatus::Refunded);
    }

    #[test]
    fn test_refund_of_unpaid_booking_is_rejected() {
        // Arrange
        let mut booking = pending_booking();
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);

        // Act
        let result = booking.refund(&admin, None, None, fixed_now());

        // Assert
        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[test]
    fn test_payment_reminder_marker_is_set_once() {
        // Arrange
        let mut booking = pending_booking();

        // Act
        booking.mark_payment_reminder_sent(3, fixed_now());
        booking.mark_payment_reminder_sent(3, fixed_now());

        // Assert
        assert_eq!(booking.payment_reminders_sent, vec![3]);
    }
}
