// libs/payment-cell/src/services/checkout.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{AppointmentFilter, AppointmentPatch, ClinicStore};
use shared_models::appointment::Appointment;
use shared_models::auth::User;
use shared_payments::webhook::{parse_event, verify_signature, CHECKOUT_COMPLETED};
use shared_payments::{to_cents, CreateSessionRequest, LineItem, PaymentGateway, PaymentVerification};
use shared_utils::AppState;

use crate::models::{
    metadata_keys, CheckoutError, CheckoutSession, PaymentConfirmation, PaymentStatus,
};

pub struct CheckoutService {
    config: Arc<AppConfig>,
    store: Arc<dyn ClinicStore>,
    payments: Arc<dyn PaymentGateway>,
}

impl CheckoutService {
    pub fn new(state: &AppState) -> Self {
        Self {
            config: state.config.clone(),
            store: state.store.clone(),
            payments: state.payments.clone(),
        }
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, CheckoutError> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .ok_or(CheckoutError::AppointmentNotFound(appointment_id))
    }

    fn line_item(appointment: &Appointment) -> LineItem {
        let provider = appointment.primary_provider_name().unwrap_or("Provider");
        LineItem {
            name: format!("Appointment For {}", provider),
            description: format!(
                "Appointment Date: {}, Time: {}",
                appointment.slot_date, appointment.slot_time
            ),
            amount_cents: to_cents(appointment.amount),
            quantity: 1,
        }
    }

    /// Opens one hosted checkout covering every given appointment. Each one
    /// must belong to the caller and be neither cancelled nor paid.
    pub async fn create_session(
        &self,
        user: &User,
        appointment_ids: &[Uuid],
    ) -> Result<CheckoutSession, CheckoutError> {
        debug!("Creating checkout session for {} appointments", appointment_ids.len());

        let mut ids: Vec<Uuid> = Vec::with_capacity(appointment_ids.len());
        for id in appointment_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        if ids.is_empty() {
            return Err(CheckoutError::NothingToPay);
        }

        let mut appointments = Vec::with_capacity(ids.len());
        for id in &ids {
            let appointment = self.load(*id).await?;
            if appointment.patient_id != user.id {
                warn!("User {} tried to pay for appointment {}", user.id, id);
                return Err(CheckoutError::NotOwner(*id));
            }
            appointment.ensure_can_pay()?;
            if appointment.paid {
                return Err(CheckoutError::AlreadyPaid(*id));
            }
            appointments.push(appointment);
        }

        let first = &appointments[0];
        let joined_ids = ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");

        let mut metadata = BTreeMap::new();
        metadata.insert(metadata_keys::APPOINTMENT_IDS.to_string(), joined_ids);
        metadata.insert(metadata_keys::USER_ID.to_string(), user.id.clone());
        metadata.insert(
            metadata_keys::PROVIDER_NAME.to_string(),
            first.primary_provider_name().unwrap_or_default().to_string(),
        );
        metadata.insert(metadata_keys::DATE.to_string(), first.slot_date.clone());
        metadata.insert(metadata_keys::TIME.to_string(), first.slot_time.clone());

        let base = self.config.frontend_base();
        let request = CreateSessionRequest {
            line_items: appointments.iter().map(Self::line_item).collect(),
            currency: self.config.payment_currency.clone(),
            success_url: format!(
                "{}/payment-success?success=true&session_id={{CHECKOUT_SESSION_ID}}",
                base
            ),
            cancel_url: format!("{}/my-appointments?cancelled=true", base),
            metadata,
            customer_email: user.email.clone(),
            expires_at: Utc::now() + Duration::minutes(self.config.payment_session_ttl_minutes),
        };
        let amount_cents = request.total_cents();

        let handle = self.payments.create_session(request).await?;

        for id in &ids {
            self.store
                .update_appointment(
                    *id,
                    AppointmentPatch {
                        payment_session_id: Some(handle.id.clone()),
                        ..AppointmentPatch::default()
                    },
                )
                .await?;
        }

        info!(
            "Checkout session {} opened for {} appointments ({} cents)",
            handle.id,
            ids.len(),
            amount_cents
        );

        Ok(CheckoutSession {
            session_id: handle.id,
            url: handle.url,
            amount: amount_cents as f64 / 100.0,
            currency: self.config.payment_currency.clone(),
            appointment_ids: ids,
        })
    }

    async fn session_appointments(
        &self,
        verification: &PaymentVerification,
    ) -> Result<Vec<Appointment>, CheckoutError> {
        let listed: Vec<Uuid> = verification
            .metadata
            .get(metadata_keys::APPOINTMENT_IDS)
            .map(|raw| {
                raw.split(',')
                    .filter_map(|id| Uuid::parse_str(id.trim()).ok())
                    .collect()
            })
            .unwrap_or_default();

        if listed.is_empty() {
            let filter = AppointmentFilter::for_payment_session(&verification.session_id);
            return Ok(self.store.list_appointments(filter).await?);
        }

        let mut appointments = Vec::with_capacity(listed.len());
        for id in listed {
            match self.store.get_appointment(id).await? {
                Some(appointment) => appointments.push(appointment),
                None => warn!("Paid session {} names missing appointment {}", verification.session_id, id),
            }
        }
        Ok(appointments)
    }

    /// Confirms a session with the payment provider and marks its appointments
    /// paid. Safe to repeat: appointments already paid are left untouched.
    pub async fn verify(
        &self,
        session_id: &str,
        caller_id: Option<&str>,
    ) -> Result<PaymentConfirmation, CheckoutError> {
        debug!("Verifying payment session {}", session_id);

        let verification = self.payments.verify(session_id).await?;

        if let Some(caller) = caller_id {
            let owner = verification.metadata.get(metadata_keys::USER_ID);
            if owner.is_some_and(|owner| owner != caller) {
                warn!("User {} tried to verify session {}", caller, session_id);
                return Err(CheckoutError::SessionOwner(session_id.to_string()));
            }
        }

        let appointments = self.session_appointments(&verification).await?;
        let appointment_ids: Vec<Uuid> = appointments.iter().map(|a| a.id).collect();

        if !verification.paid {
            info!("Payment session {} is not paid yet", session_id);
            return Ok(PaymentConfirmation {
                session_id: session_id.to_string(),
                paid: false,
                appointment_ids,
                newly_paid: 0,
                refunded: 0,
                amount: verification.amount(),
                currency: verification.currency,
            });
        }

        let mut newly_paid = 0;
        let mut refunded = 0;
        for appointment in &appointments {
            if appointment.paid {
                continue;
            }

            let updated = self
                .store
                .update_appointment(
                    appointment.id,
                    AppointmentPatch {
                        paid: Some(true),
                        paid_at: Some(Utc::now()),
                        paid_amount: Some(appointment.amount),
                        paid_currency: Some(verification.currency.clone()),
                        payment_session_id: Some(session_id.to_string()),
                        payment_intent_id: verification.payment_intent_id.clone(),
                        ..AppointmentPatch::default()
                    },
                )
                .await?;

            // A cancellation that landed before the payment saw an unpaid row
            // and refunded nothing, so the money goes back from here.
            if let Err(e) = updated.ensure_can_pay() {
                warn!("Payment for session {} arrived after cancellation: {}", session_id, e);
                if self.refund_late_payment(&updated, &verification).await? {
                    refunded += 1;
                }
                continue;
            }
            newly_paid += 1;
        }

        info!("Payment session {} confirmed, {} appointments newly paid", session_id, newly_paid);

        Ok(PaymentConfirmation {
            session_id: session_id.to_string(),
            paid: true,
            appointment_ids,
            newly_paid,
            refunded,
            amount: verification.amount(),
            currency: verification.currency,
        })
    }

    /// Refund failures are logged and left for follow-up, as on cancellation.
    async fn refund_late_payment(
        &self,
        appointment: &Appointment,
        verification: &PaymentVerification,
    ) -> Result<bool, CheckoutError> {
        let Some(intent) = verification.payment_intent_id.as_deref() else {
            error!(
                "Session {} paid for cancelled appointment {} without a payment intent",
                verification.session_id, appointment.id
            );
            return Ok(false);
        };

        match self.payments.refund(intent, Some(to_cents(appointment.amount))).await {
            Ok(receipt) => {
                info!("Refund {} issued for cancelled appointment {}", receipt.id, appointment.id);
                self.store
                    .update_appointment(
                        appointment.id,
                        AppointmentPatch {
                            refund_id: Some(receipt.id),
                            ..AppointmentPatch::default()
                        },
                    )
                    .await?;
                Ok(true)
            }
            Err(e) => {
                error!("Refund for cancelled appointment {} failed: {}", appointment.id, e);
                Ok(false)
            }
        }
    }

    /// Handles a signed provider callback. Only completed checkouts act;
    /// other event types are acknowledged and ignored.
    pub async fn handle_webhook(
        &self,
        payload: &str,
        signature: &str,
    ) -> Result<Option<PaymentConfirmation>, CheckoutError> {
        verify_signature(
            payload,
            signature,
            &self.config.stripe_webhook_secret,
            Utc::now().timestamp(),
        )?;
        let event = parse_event(payload)?;

        if event.event_type != CHECKOUT_COMPLETED {
            debug!("Ignoring webhook event {} of type {}", event.id, event.event_type);
            return Ok(None);
        }

        let confirmation = self.verify(&event.data.object.id, None).await?;
        Ok(Some(confirmation))
    }

    pub async fn payment_status(
        &self,
        user: &User,
        appointment_id: Uuid,
    ) -> Result<PaymentStatus, CheckoutError> {
        let appointment = self.load(appointment_id).await?;
        if appointment.patient_id != user.id && !user.is_admin() {
            return Err(CheckoutError::NotOwner(appointment_id));
        }

        Ok(PaymentStatus {
            appointment_id,
            status: appointment.status(),
            paid: appointment.paid,
            amount: appointment.amount,
            paid_amount: appointment.paid_amount,
            paid_currency: appointment.paid_currency,
            payment_session_id: appointment.payment_session_id,
        })
    }
}
