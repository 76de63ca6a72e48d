// libs/appointment-cell/src/services/orchestrator.rs
//! Client-side booking flow.
//!
//! The orchestrator walks one patient through choosing providers, a slot and
//! the intake form, books one appointment per provider, opens a single
//! checkout for everything that was booked and finally confirms the payment.
//! Input mistakes (bad slot, incomplete intake, a slot taken in the meantime)
//! leave the flow where it was so the caller can correct them. Anything else
//! moves it to `Failed` and records the step.

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use payment_cell::models::PaymentConfirmation;
use provider_cell::models::{DaySlots, SelectionNotice};
use provider_cell::services::slots::{find_day, generate_slots, is_free, SlotHorizon};
use provider_cell::services::ProviderSelection;
use shared_models::intake::{FieldValue, IntakeForm};
use shared_models::provider::Provider;
use shared_utils::Session;

use crate::models::{
    BookAppointmentRequest, BookingError, BookingFailure, BookingOutcome, BookingState,
    CheckoutRedirect, FailedBooking,
};
use crate::services::backend::BookingBackend;
use crate::services::booking::SlotKey;

pub struct BookingOrchestrator<B: BookingBackend> {
    session: Session,
    backend: B,
    state: BookingState,
    today: NaiveDate,
    selection: Option<ProviderSelection>,
    grid: Vec<DaySlots>,
    chosen: Option<SlotKey>,
    intake: IntakeForm,
    message: Option<String>,
    outcome: Option<BookingOutcome>,
    checkout: Option<CheckoutRedirect>,
    confirmation: Option<PaymentConfirmation>,
    failure: Option<BookingFailure>,
}

impl<B: BookingBackend> BookingOrchestrator<B> {
    /// The session must already be active.
    pub fn new(session: Session, backend: B) -> Result<Self, BookingError> {
        session.user()?;

        let mut orchestrator = Self {
            session,
            backend,
            state: BookingState::SelectingProviders,
            today: Utc::now().date_naive(),
            selection: None,
            grid: Vec::new(),
            chosen: None,
            intake: IntakeForm::new(),
            message: None,
            outcome: None,
            checkout: None,
            confirmation: None,
            failure: None,
        };
        orchestrator.regenerate();
        Ok(orchestrator)
    }

    /// Moves the first day of the slot horizon.
    pub fn starting_on(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self.regenerate();
        self
    }

    // ==========================================================================
    // STATE HELPERS
    // ==========================================================================

    fn expect_state(&self, allowed: &[BookingState], action: &str) -> Result<(), BookingError> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(BookingError::Validation(format!(
            "Cannot {} while the booking is {:?}",
            action, self.state
        )))
    }

    fn fail(&mut self, step: BookingState, err: BookingError) -> BookingError {
        warn!("Booking failed at {:?}: {}", step, err);
        self.state = BookingState::Failed;
        self.failure = Some(BookingFailure {
            step,
            reason: err.to_string(),
        });
        err
    }

    /// Keeps the current state for recoverable errors, fails otherwise.
    fn settle<T>(&mut self, step: BookingState, result: Result<T, BookingError>) -> Result<T, BookingError> {
        result.map_err(|e| if e.is_recoverable() { e } else { self.fail(step, e) })
    }

    fn selection_mut(&mut self) -> Result<&mut ProviderSelection, BookingError> {
        self.selection
            .as_mut()
            .ok_or_else(|| BookingError::Validation("Select a provider first".to_string()))
    }

    fn regenerate(&mut self) {
        let providers: &[Provider] = self.selection.as_ref().map(ProviderSelection::members).unwrap_or(&[]);
        let horizon = SlotHorizon::for_selection(providers.len());
        self.grid = generate_slots(providers, horizon, self.today);

        let stale = self
            .chosen
            .as_ref()
            .is_some_and(|slot| !is_free(&self.grid, &slot.slot_date, &slot.slot_time));
        if stale {
            debug!("Chosen slot is no longer free for the selection, clearing it");
            self.chosen = None;
        }
    }

    // ==========================================================================
    // PROVIDER SELECTION
    // ==========================================================================

    pub async fn load_primary(&mut self, provider_id: Uuid) -> Result<&Provider, BookingError> {
        self.expect_state(&[BookingState::SelectingProviders], "choose the primary provider")?;
        if self.selection.is_some() {
            return Err(BookingError::Validation("The primary provider is already chosen".to_string()));
        }

        let fetched = self.backend.fetch_provider(&self.session, provider_id).await;
        let provider = self.settle(BookingState::SelectingProviders, fetched)?;

        info!("Booking started with primary provider {}", provider.id);
        self.selection = Some(ProviderSelection::new(provider));
        self.regenerate();

        self.selection
            .as_ref()
            .map(ProviderSelection::primary)
            .ok_or_else(|| BookingError::Validation("Select a provider first".to_string()))
    }

    pub async fn add_provider(&mut self, provider_id: Uuid) -> Result<SelectionNotice, BookingError> {
        self.expect_state(
            &[BookingState::SelectingProviders, BookingState::SelectingSlot],
            "add a provider",
        )?;
        self.selection_mut()?;

        let fetched = self.backend.fetch_provider(&self.session, provider_id).await;
        let provider = self.settle(self.state, fetched)?;

        let notice = self.selection_mut()?.add(provider);
        if notice == SelectionNotice::Added {
            self.regenerate();
            info!("Provider {} added to booking", provider_id);
        }
        Ok(notice)
    }

    pub fn remove_provider(&mut self, provider_id: Uuid) -> Result<Provider, BookingError> {
        self.expect_state(
            &[BookingState::SelectingProviders, BookingState::SelectingSlot],
            "remove a provider",
        )?;

        let removed = self
            .selection_mut()?
            .remove(provider_id)
            .map_err(|e| BookingError::Validation(e.to_string()))?;
        self.regenerate();

        info!("Provider {} removed from booking", provider_id);
        Ok(removed)
    }

    pub fn proceed_to_slot_selection(&mut self) -> Result<(), BookingError> {
        self.expect_state(&[BookingState::SelectingProviders], "pick a slot")?;

        let selection = self
            .selection
            .as_ref()
            .ok_or_else(|| BookingError::Validation("Select a provider first".to_string()))?;

        let unavailable: Vec<&str> = selection.unavailable().into_iter().map(|p| p.name.as_str()).collect();
        if !unavailable.is_empty() {
            return Err(BookingError::Validation(format!(
                "Not taking bookings right now: {}",
                unavailable.join(", ")
            )));
        }

        self.state = BookingState::SelectingSlot;
        Ok(())
    }

    // ==========================================================================
    // SLOT AND INTAKE
    // ==========================================================================

    /// Re-reads every selected provider before accepting the slot, since the
    /// grid may be stale. A taken slot leaves the flow in `SelectingSlot` with
    /// a refreshed grid.
    pub async fn choose_slot(&mut self, slot_date: &str, slot_time: &str) -> Result<(), BookingError> {
        self.expect_state(&[BookingState::SelectingSlot], "choose a slot")?;
        let slot = SlotKey::parse(slot_date, slot_time)?;

        let ids = self.selection_mut()?.ids();
        for id in ids {
            let fetched = self.backend.fetch_provider(&self.session, id).await;
            let provider = self.settle(BookingState::SelectingSlot, fetched)?;
            self.selection_mut()?.refresh(provider);
        }
        self.regenerate();

        if let Some(selection) = &self.selection {
            if let Some(provider) = selection.unavailable().first() {
                return Err(BookingError::Validation(format!(
                    "{} stopped taking bookings",
                    provider.name
                )));
            }
        }

        if find_day(&self.grid, &slot.slot_date).is_none() {
            return Err(BookingError::Validation(format!(
                "{} is outside the booking window",
                slot.slot_date
            )));
        }
        if !is_free(&self.grid, &slot.slot_date, &slot.slot_time) {
            warn!("Slot {} {} is taken for the selection", slot.slot_date, slot.slot_time);
            return Err(BookingError::Conflict(format!(
                "{} at {} was just booked, please pick another time",
                slot.slot_date, slot.slot_time
            )));
        }

        debug!("Slot {} {} chosen", slot.slot_date, slot.slot_time);
        self.chosen = Some(slot);
        self.state = BookingState::FillingIntakeForm;
        Ok(())
    }

    pub fn update_intake(&mut self, path: &str, value: impl Into<FieldValue>) -> Result<(), BookingError> {
        self.expect_state(
            &[BookingState::FillingIntakeForm, BookingState::Confirming],
            "edit the intake form",
        )?;
        self.intake.update(path, value)?;
        self.state = BookingState::FillingIntakeForm;
        Ok(())
    }

    pub fn set_message(&mut self, message: Option<String>) {
        self.message = message;
    }

    pub fn confirm(&mut self) -> Result<(), BookingError> {
        self.expect_state(&[BookingState::FillingIntakeForm], "confirm")?;

        if let Err(e) = self.intake.validate_for_submission() {
            warn!("Intake incomplete: {}", e);
            return Err(e.into());
        }

        self.state = BookingState::Confirming;
        Ok(())
    }

    // ==========================================================================
    // SUBMISSION AND PAYMENT
    // ==========================================================================

    /// Books one appointment per selected provider concurrently, then opens a
    /// single checkout for the ones that succeeded.
    pub async fn submit(&mut self) -> Result<CheckoutRedirect, BookingError> {
        self.expect_state(&[BookingState::Confirming], "submit")?;

        let slot = self
            .chosen
            .clone()
            .ok_or_else(|| BookingError::Validation("Choose a slot first".to_string()))?;
        let members: Vec<(Uuid, String)> = self
            .selection
            .as_ref()
            .map(|s| s.members().iter().map(|p| (p.id, p.name.clone())).collect())
            .unwrap_or_default();

        self.state = BookingState::CreatingAppointments;
        debug!("Submitting {} bookings for {} {}", members.len(), slot.slot_date, slot.slot_time);

        let results = {
            let backend = &self.backend;
            let session = &self.session;
            let requests = members.iter().map(|(id, _)| BookAppointmentRequest {
                provider_ids: vec![*id],
                slot_date: slot.slot_date.clone(),
                slot_time: slot.slot_time.clone(),
                intake_form: self.intake.clone(),
                message: self.message.clone(),
            });
            join_all(requests.map(|request| backend.book(session, request))).await
        };

        let mut outcome = BookingOutcome::default();
        let mut first_error = None;
        for ((provider_id, provider_name), result) in members.into_iter().zip(results) {
            match result {
                Ok(appointment) => outcome.succeeded.push(appointment),
                Err(e) => {
                    warn!("Booking with {} failed: {}", provider_name, e);
                    outcome.failed.push(FailedBooking {
                        provider_id,
                        provider_name,
                        reason: e.to_string(),
                    });
                    first_error.get_or_insert(e);
                }
            }
        }

        let summary = outcome.summary();
        info!("{}", summary);
        let appointment_ids = outcome.appointment_ids();
        self.outcome = Some(outcome);

        if appointment_ids.is_empty() {
            let err = first_error.unwrap_or_else(|| BookingError::Validation("Nothing to book".to_string()));
            return Err(self.fail(BookingState::CreatingAppointments, err));
        }

        self.state = BookingState::CreatingPaymentSession;
        let checkout = match self
            .backend
            .create_payment_session(&self.session, &appointment_ids)
            .await
        {
            Ok(checkout) => checkout,
            Err(e) => return Err(self.fail(BookingState::CreatingPaymentSession, e)),
        };

        let redirect = CheckoutRedirect {
            session_id: checkout.session_id,
            url: checkout.url,
            amount: checkout.amount,
            summary,
        };
        self.checkout = Some(redirect.clone());
        self.state = BookingState::AwaitingPaymentRedirect;

        info!("Awaiting payment for session {}", redirect.session_id);
        Ok(redirect)
    }

    pub async fn handle_payment_return(&mut self, session_id: &str) -> Result<PaymentConfirmation, BookingError> {
        self.expect_state(&[BookingState::AwaitingPaymentRedirect], "verify payment")?;

        let expected = self.checkout.as_ref().map(|c| c.session_id.as_str());
        if expected != Some(session_id) {
            return Err(BookingError::Validation(format!(
                "Payment session {} does not belong to this booking",
                session_id
            )));
        }

        self.state = BookingState::VerifyingPayment;
        let confirmation = match self.backend.verify_payment(&self.session, session_id).await {
            Ok(confirmation) => confirmation,
            Err(e) => return Err(self.fail(BookingState::VerifyingPayment, e)),
        };

        if !confirmation.paid {
            let err = BookingError::Payment("Payment was not completed".to_string());
            return Err(self.fail(BookingState::VerifyingPayment, err));
        }

        info!("Booking paid through session {}", session_id);
        self.confirmation = Some(confirmation.clone());
        self.state = BookingState::Booked;
        Ok(confirmation)
    }

    pub fn cancel(&mut self) -> Result<(), BookingError> {
        self.expect_state(
            &[BookingState::FillingIntakeForm, BookingState::Confirming],
            "cancel",
        )?;
        info!("Booking cancelled before submission");
        self.state = BookingState::Cancelled;
        Ok(())
    }

    // ==========================================================================
    // ACCESSORS
    // ==========================================================================

    pub fn state(&self) -> BookingState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn selection(&self) -> Option<&ProviderSelection> {
        self.selection.as_ref()
    }

    pub fn total_fee(&self) -> f64 {
        self.selection.as_ref().map_or(0.0, ProviderSelection::total_fee)
    }

    pub fn grid(&self) -> &[DaySlots] {
        &self.grid
    }

    pub fn chosen_slot(&self) -> Option<&SlotKey> {
        self.chosen.as_ref()
    }

    pub fn intake(&self) -> &IntakeForm {
        &self.intake
    }

    pub fn outcome(&self) -> Option<&BookingOutcome> {
        self.outcome.as_ref()
    }

    pub fn checkout(&self) -> Option<&CheckoutRedirect> {
        self.checkout.as_ref()
    }

    pub fn confirmation(&self) -> Option<&PaymentConfirmation> {
        self.confirmation.as_ref()
    }

    pub fn failure(&self) -> Option<&BookingFailure> {
        self.failure.as_ref()
    }
}
