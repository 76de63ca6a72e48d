use assert_matches::assert_matches;
use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{Duration, Utc};
use headers::{authorization::Bearer, Authorization};

use admin_cell::handlers::{dashboard, delete_provider};
use admin_cell::models::AdminError;
use admin_cell::services::AdminPanel;
use appointment_cell::models::{BookAppointmentRequest, BookingError};
use appointment_cell::services::BookingService;
use shared_database::{AppointmentPatch, ClinicStore};
use shared_models::error::AppError;
use shared_models::provider::NewProvider;
use shared_utils::test_utils::{sample_intake, TestState, TestUser};

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

fn new_provider(name: &str, fee: f64) -> NewProvider {
    NewProvider {
        name: name.to_string(),
        speciality: "MRI".to_string(),
        about: "Neuro imaging".to_string(),
        fee,
        image: "uploads/dr-new.png".to_string(),
        address: Some("1 Scan St".to_string()),
    }
}

fn admin_panel(test: &TestState) -> AdminPanel {
    let admin = TestUser::admin("ops@example.com");
    AdminPanel::new(&test.session_for(&admin), test.state.clone()).unwrap()
}

#[tokio::test]
async fn patients_cannot_open_the_panel() {
    let test = TestState::new();
    let patient = TestUser::patient("min@example.com");

    let result = AdminPanel::new(&test.session_for(&patient), test.state.clone());
    assert_matches!(result, Err(AdminError::Access(AppError::Forbidden(_))));
}

#[tokio::test]
async fn add_provider_validates_and_stores_image_verbatim() {
    let test = TestState::new();
    let panel = admin_panel(&test);

    let provider = panel.add_provider(new_provider("Dr. New", 120.0)).await.unwrap();
    assert!(provider.available);
    assert_eq!(provider.image, "uploads/dr-new.png");
    assert!(provider.booked_slots.is_empty());

    assert_matches!(
        panel.add_provider(new_provider("  ", 120.0)).await,
        Err(AdminError::InvalidProvider(_))
    );
    assert_matches!(
        panel.add_provider(new_provider("Dr. Zero", 0.0)).await,
        Err(AdminError::InvalidProvider(_))
    );
    let mut no_speciality = new_provider("Dr. Blank", 90.0);
    no_speciality.speciality = String::new();
    assert_matches!(panel.add_provider(no_speciality).await, Err(AdminError::InvalidProvider(_)));

    assert_matches!(
        panel.add_provider(new_provider("dr. new", 80.0)).await,
        Err(AdminError::DuplicateProvider(_))
    );
    assert_eq!(panel.list_providers().await.unwrap().len(), 1);
}

#[tokio::test]
async fn toggle_flips_availability() {
    let test = TestState::new();
    let panel = admin_panel(&test);
    let a = test.add_provider("Dr. A", 100.0).await;

    assert!(!panel.toggle_availability(a.id).await.unwrap().available);
    assert!(panel.toggle_availability(a.id).await.unwrap().available);
    assert_matches!(
        panel.toggle_availability(uuid::Uuid::new_v4()).await,
        Err(AdminError::ProviderNotFound(_))
    );
}

#[tokio::test]
async fn delete_is_blocked_by_a_secondary_reference() {
    let test = TestState::new();
    let patient = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let b = test.add_provider("Dr. B", 150.0).await;

    let appointment = BookingService::new(&test.state)
        .book(
            &patient.id,
            BookAppointmentRequest {
                provider_ids: vec![a.id, b.id],
                slot_date: "12/3/2025".to_string(),
                slot_time: "10:00 AM".to_string(),
                intake_form: sample_intake(),
                message: None,
            },
        )
        .await
        .unwrap();

    let admin = TestUser::admin("ops@example.com");
    let result = delete_provider(
        State(test.state.clone()),
        create_auth_header(&test.token_for(&admin)),
        Extension(admin.to_user()),
        Path(b.id),
    )
    .await;
    assert_matches!(result, Err(AppError::Integrity { count: 1, .. }));

    let panel = admin_panel(&test);
    panel.cancel_appointment(appointment.id).await.unwrap();
    panel.delete_provider(b.id).await.unwrap();

    assert!(test.store.get_provider(b.id).await.unwrap().is_none());
    assert_matches!(panel.delete_provider(b.id).await, Err(AdminError::ProviderNotFound(_)));
}

#[tokio::test]
async fn cancel_releases_every_provider_and_completion_is_guarded() {
    let test = TestState::new();
    let panel = admin_panel(&test);
    let patient = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let b = test.add_provider("Dr. B", 150.0).await;

    let grouped = BookingService::new(&test.state)
        .book(
            &patient.id,
            BookAppointmentRequest {
                provider_ids: vec![a.id, b.id],
                slot_date: "14/3/2025".to_string(),
                slot_time: "11:00 AM".to_string(),
                intake_form: sample_intake(),
                message: None,
            },
        )
        .await
        .unwrap();

    let cancelled = panel.cancel_appointment(grouped.id).await.unwrap();
    assert!(cancelled.cancelled);
    for id in [a.id, b.id] {
        let provider = test.store.get_provider(id).await.unwrap().unwrap();
        assert!(!provider.booked_slots.is_booked("14/3/2025", "11:00 AM"));
    }
    assert_matches!(
        panel.complete_appointment(grouped.id).await,
        Err(AdminError::Booking(BookingError::Lifecycle(_)))
    );

    let single = test.add_appointment(&patient, &a).await;
    let completed = panel.complete_appointment(single.id).await.unwrap();
    assert!(completed.completed);
    assert_matches!(
        panel.cancel_appointment(single.id).await,
        Err(AdminError::Booking(BookingError::Lifecycle(_)))
    );
}

#[tokio::test]
async fn expire_unpaid_only_cancels_stale_bookings() {
    let test = TestState::new();
    let panel = admin_panel(&test);
    let patient = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;

    let fresh = test.add_appointment(&patient, &a).await;
    let mut stale = test.add_appointment(&patient, &a).await;
    stale.created_at = Utc::now() - Duration::minutes(60);
    test.store.insert_appointment(stale.clone()).await.unwrap();

    let expired = panel.expire_unpaid().await.unwrap();
    assert_eq!(expired.total, 1);
    assert_eq!(expired.cancelled, vec![stale.id]);

    let fresh = test.store.get_appointment(fresh.id).await.unwrap().unwrap();
    assert!(!fresh.cancelled);
}

#[tokio::test]
async fn dashboard_counts_rates_and_latest() {
    let test = TestState::new();
    let admin = TestUser::admin("ops@example.com");
    let patient = TestUser::patient("min@example.com");
    test.add_patient(&patient).await;
    let a = test.add_provider("Dr. A", 100.0).await;
    test.add_provider("Dr. B", 150.0).await;

    let empty = dashboard(
        State(test.state.clone()),
        create_auth_header(&test.token_for(&admin)),
        Extension(admin.to_user()),
    )
    .await
    .unwrap();
    assert_eq!(empty.0["dashboard"]["appointments"], 0);
    assert_eq!(empty.0["dashboard"]["payment_rate"], 0.0);

    let panel = admin_panel(&test);
    let mut ids = Vec::new();
    for minutes_ago in [50, 40, 30, 20, 10, 0] {
        let mut appointment = test.add_appointment(&patient, &a).await;
        appointment.created_at = Utc::now() - Duration::minutes(minutes_ago);
        test.store.insert_appointment(appointment.clone()).await.unwrap();
        ids.push(appointment.id);
    }
    panel.complete_appointment(ids[0]).await.unwrap();
    panel.complete_appointment(ids[1]).await.unwrap();
    panel.cancel_appointment(ids[2]).await.unwrap();
    test.store
        .update_appointment(
            ids[3],
            AppointmentPatch {
                paid: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stats = panel.dashboard().await.unwrap();
    assert_eq!(stats.providers, 2);
    assert_eq!(stats.patients, 1);
    assert_eq!(stats.appointments, 6);
    assert_eq!(stats.completion_rate, 33.33);
    assert_eq!(stats.cancellation_rate, 16.67);
    assert_eq!(stats.payment_rate, 16.67);

    let latest: Vec<_> = stats.latest_appointments.iter().map(|a| a.id).collect();
    assert_eq!(latest, vec![ids[5], ids[4], ids[3], ids[2], ids[1]]);
}
