use assert_matches::assert_matches;
use axum::{
    extract::{Extension, Path, State},
    http::{HeaderMap, HeaderValue},
    Json,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use payment_cell::handlers::*;
use payment_cell::models::*;
use payment_cell::services::CheckoutService;
use shared_database::{AppointmentPatch, ClinicStore};
use shared_models::error::AppError;
use shared_payments::webhook::sign_payload;
use shared_utils::test_utils::{TestState, TestUser};

#[tokio::test]
async fn session_covers_every_appointment_with_metadata() {
    let test = TestState::new();
    let user = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let b = test.add_provider("Dr. B", 150.0).await;
    let first = test.add_appointment(&user, &a).await;
    let second = test.add_appointment(&user, &b).await;

    let service = CheckoutService::new(&test.state);
    let session = service
        .create_session(&user.to_user(), &[first.id, second.id])
        .await
        .unwrap();

    assert_eq!(session.amount, 250.0);
    let request = test.payments.session_request(&session.session_id).await.unwrap();
    assert_eq!(request.total_cents(), 25000);
    assert_eq!(request.line_items[0].name, "Appointment For Dr. A");
    assert_eq!(request.line_items[0].description, "Appointment Date: 12/3/2025, Time: 10:00 AM");
    assert_eq!(request.metadata["user_id"], user.id);
    assert_eq!(request.metadata["date"], "12/3/2025");
    assert_eq!(
        request.success_url,
        "http://localhost:5173/payment-success?success=true&session_id={CHECKOUT_SESSION_ID}"
    );
    assert!(request.expires_at > Utc::now() + chrono::Duration::minutes(29));

    let stored = test.store.get_appointment(first.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_session_id.as_deref(), Some(session.session_id.as_str()));
}

#[tokio::test]
async fn cannot_pay_for_someone_else_or_twice() {
    let test = TestState::new();
    let owner = TestUser::patient("min@example.com");
    let other = TestUser::patient("other@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let appointment = test.add_appointment(&owner, &a).await;
    let service = CheckoutService::new(&test.state);

    assert_matches!(
        service.create_session(&other.to_user(), &[appointment.id]).await,
        Err(CheckoutError::NotOwner(_))
    );
    assert_matches!(
        service.create_session(&owner.to_user(), &[]).await,
        Err(CheckoutError::NothingToPay)
    );

    test.store
        .update_appointment(appointment.id, AppointmentPatch { paid: Some(true), ..Default::default() })
        .await
        .unwrap();
    assert_matches!(
        service.create_session(&owner.to_user(), &[appointment.id]).await,
        Err(CheckoutError::AlreadyPaid(_))
    );
}

#[tokio::test]
async fn verify_is_idempotent() {
    let test = TestState::new();
    let user = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let appointment = test.add_appointment(&user, &a).await;
    let service = CheckoutService::new(&test.state);

    let session = service.create_session(&user.to_user(), &[appointment.id]).await.unwrap();

    let pending = service.verify(&session.session_id, Some(&user.id)).await.unwrap();
    assert!(!pending.paid);
    assert!(!test.store.get_appointment(appointment.id).await.unwrap().unwrap().paid);

    let intent = test.payments.mark_paid(&session.session_id).await.unwrap();

    let first = service.verify(&session.session_id, Some(&user.id)).await.unwrap();
    assert!(first.paid);
    assert_eq!(first.newly_paid, 1);

    let paid = test.store.get_appointment(appointment.id).await.unwrap().unwrap();
    assert!(paid.paid);
    assert_eq!(paid.payment_intent_id.as_deref(), Some(intent.as_str()));
    assert_eq!(paid.paid_amount, Some(100.0));
    let paid_at = paid.paid_at;

    let second = service.verify(&session.session_id, Some(&user.id)).await.unwrap();
    assert!(second.paid);
    assert_eq!(second.newly_paid, 0);
    let unchanged = test.store.get_appointment(appointment.id).await.unwrap().unwrap();
    assert_eq!(unchanged.paid_at, paid_at);
}

#[tokio::test]
async fn payment_for_a_cancelled_appointment_is_refunded_once() {
    let test = TestState::new();
    let user = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let appointment = test.add_appointment(&user, &a).await;
    let service = CheckoutService::new(&test.state);

    let session = service.create_session(&user.to_user(), &[appointment.id]).await.unwrap();
    test.store
        .update_appointment(appointment.id, AppointmentPatch { cancelled: Some(true), ..Default::default() })
        .await
        .unwrap();
    let intent = test.payments.mark_paid(&session.session_id).await.unwrap();

    let confirmation = service.verify(&session.session_id, None).await.unwrap();
    assert_eq!(confirmation.newly_paid, 0);
    assert_eq!(confirmation.refunded, 1);

    let refunds = test.payments.refunds().await;
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount_cents, Some(10000));

    let stored = test.store.get_appointment(appointment.id).await.unwrap().unwrap();
    assert!(stored.cancelled);
    assert!(stored.paid);
    assert_eq!(stored.payment_intent_id.as_deref(), Some(intent.as_str()));
    assert_eq!(stored.refund_id.as_deref(), Some(refunds[0].id.as_str()));

    // A repeated webhook or return visit must not refund again
    let again = service.verify(&session.session_id, None).await.unwrap();
    assert_eq!(again.refunded, 0);
    assert_eq!(test.payments.refunds().await.len(), 1);
}

#[tokio::test]
async fn verify_rejects_other_patients() {
    let test = TestState::new();
    let owner = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let appointment = test.add_appointment(&owner, &a).await;
    let service = CheckoutService::new(&test.state);
    let session = service.create_session(&owner.to_user(), &[appointment.id]).await.unwrap();

    let result = verify_payment(
        State(test.state.clone()),
        Extension(TestUser::patient("other@example.com").to_user()),
        Json(VerifyPaymentRequest { session_id: session.session_id }),
    )
    .await;
    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn signed_webhook_marks_appointments_paid() {
    let test = TestState::new();
    let user = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let appointment = test.add_appointment(&user, &a).await;
    let session = CheckoutService::new(&test.state)
        .create_session(&user.to_user(), &[appointment.id])
        .await
        .unwrap();
    test.payments.mark_paid(&session.session_id).await;

    let payload = json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": { "object": { "id": session.session_id, "payment_status": "paid" } }
    })
    .to_string();

    let mut headers = HeaderMap::new();
    let signature = sign_payload(&payload, "whsec_test", Utc::now().timestamp());
    headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&signature).unwrap());

    let result = payment_webhook(State(test.state.clone()), headers, payload.clone())
        .await
        .unwrap();
    assert_eq!(result.0["handled"], true);
    assert!(test.store.get_appointment(appointment.id).await.unwrap().unwrap().paid);

    let mut forged = HeaderMap::new();
    let bad = sign_payload(&payload, "not-the-secret", Utc::now().timestamp());
    forged.insert(SIGNATURE_HEADER, HeaderValue::from_str(&bad).unwrap());
    let result = payment_webhook(State(test.state.clone()), forged, payload).await;
    assert_matches!(result, Err(AppError::Auth(_)));
}

#[tokio::test]
async fn status_is_visible_to_owner_only() {
    let test = TestState::new();
    let owner = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let appointment = test.add_appointment(&owner, &a).await;

    let result = payment_status(
        State(test.state.clone()),
        Extension(owner.to_user()),
        Path(appointment.id),
    )
    .await
    .unwrap();
    assert_eq!(result.0["payment"]["status"], "awaiting_payment");

    let result = payment_status(
        State(test.state.clone()),
        Extension(TestUser::patient("other@example.com").to_user()),
        Path(appointment.id),
    )
    .await;
    assert_matches!(result, Err(AppError::Forbidden(_)));

    let result = payment_status(
        State(test.state.clone()),
        Extension(owner.to_user()),
        Path(Uuid::new_v4()),
    )
    .await;
    assert_matches!(result, Err(AppError::NotFound(_)));
}
