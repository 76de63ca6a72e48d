use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ClinicStore, InMemoryStore};
use shared_models::appointment::Appointment;
use shared_models::auth::User;
use shared_models::intake::IntakeForm;
use shared_models::patient::Patient;
use shared_models::provider::{NewProvider, Provider};
use shared_payments::InMemoryGateway;

use crate::session::Session;
use crate::state::AppState;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub stripe_api_base: String,
    pub frontend_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            stripe_api_base: "https://api.stripe.com".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
        }
    }
}

impl TestConfig {
    /// Config pointing the Supabase client at a mock server.
    pub fn with_supabase(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            stripe_secret_key: String::new(),
            stripe_webhook_secret: "whsec_test".to_string(),
            stripe_api_base: self.stripe_api_base.clone(),
            frontend_url: self.frontend_url.clone(),
            payment_currency: "usd".to_string(),
            payment_session_ttl_minutes: 30,
            unpaid_appointment_ttl_minutes: 45,
            unpaid_sweep_interval_secs: 300,
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::patient("test@example.com")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Intake that passes submission checks: the Lee/Min referral.
pub fn sample_intake() -> IntakeForm {
    let mut form = IntakeForm::new();
    form.surname = "Lee".to_string();
    form.first_name = "Min".to_string();
    form.dob = "1/1/1990".to_string();
    form.health_card_number = "1234567890".to_string();
    form.clinical_information = "headache".to_string();
    form
}

/// In-memory application state with direct handles on the fake collaborators.
pub struct TestState {
    pub config: TestConfig,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub payments: Arc<InMemoryGateway>,
}

impl Default for TestState {
    fn default() -> Self {
        Self::new()
    }
}

impl TestState {
    pub fn new() -> Self {
        let config = TestConfig::default();
        let store = Arc::new(InMemoryStore::new());
        let payments = Arc::new(InMemoryGateway::new());
        let state = AppState::new(config.to_app_config(), store.clone(), payments.clone());
        Self { config, state, store, payments }
    }

    pub async fn add_provider(&self, name: &str, fee: f64) -> Provider {
        let provider = NewProvider {
            name: name.to_string(),
            speciality: "MRI".to_string(),
            about: String::new(),
            fee,
            image: format!("https://cdn.example.com/{}.png", name.replace(' ', "-")),
            address: None,
        }
        .into_provider();

        self.store
            .insert_provider(provider)
            .await
            .expect("in-memory insert")
    }

    pub async fn add_patient(&self, user: &TestUser) -> Patient {
        let now = Utc::now();
        self.store
            .upsert_patient(Patient {
                id: user.id.clone(),
                name: "Min Lee".to_string(),
                email: Some(user.email.clone()),
                phone: "555-0100".to_string(),
                dob: "1990-01-01".to_string(),
                gender: "Female".to_string(),
                address: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("in-memory upsert")
    }

    /// Unpaid appointment for `user` at `12/3/2025 10:00 AM`, one per call,
    /// inserted without reserving the slot.
    pub async fn add_appointment(&self, user: &TestUser, provider: &Provider) -> Appointment {
        self.store
            .insert_appointment(Appointment {
                id: Uuid::new_v4(),
                patient_id: user.id.clone(),
                provider_ids: vec![provider.id],
                slot_date: "12/3/2025".to_string(),
                slot_time: "10:00 AM".to_string(),
                amount: provider.fee,
                patient_snapshot: None,
                provider_snapshots: vec![provider.snapshot()],
                intake_form: sample_intake(),
                message: None,
                cancelled: false,
                completed: false,
                paid: false,
                payment_session_id: None,
                payment_intent_id: None,
                paid_amount: None,
                paid_currency: None,
                paid_at: None,
                refund_id: None,
                created_at: Utc::now(),
                cancelled_at: None,
            })
            .await
            .expect("in-memory insert")
    }

    pub fn token_for(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, Some(1))
    }

    pub fn session_for(&self, user: &TestUser) -> Session {
        let mut session = Session::new(&self.state.config);
        session
            .init(&self.token_for(user))
            .expect("test token validates");
        session
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn provider_response(provider_id: &str, name: &str, fee: f64) -> serde_json::Value {
        json!({
            "id": provider_id,
            "name": name,
            "speciality": "MRI",
            "about": "",
            "fee": fee,
            "available": true,
            "image": "",
            "address": null,
            "booked_slots": {},
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn patient_response(patient_id: &str, email: &str, name: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "name": name,
            "email": email,
            "phone": "555-0100",
            "dob": "1990-01-01",
            "gender": "Female",
            "address": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(appointment_id: &str, patient_id: &str, provider_id: &str) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "provider_ids": [provider_id],
            "slot_date": "12/3/2025",
            "slot_time": "10:00 AM",
            "amount": 100.0,
            "cancelled": false,
            "completed": false,
            "paid": false,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::with_supabase("http://localhost:54321");
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::admin("ops@example.com");
        assert_eq!(user.role, "admin");

        let user_model = user.to_user();
        assert!(user_model.is_admin());
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn sample_intake_is_submittable() {
        assert!(sample_intake().validate_for_submission().is_ok());
    }

    #[tokio::test]
    async fn test_state_sessions_are_active() {
        let test = TestState::new();
        let user = TestUser::patient("min@example.com");
        let session = test.session_for(&user);
        assert!(session.is_active());
    }
}
