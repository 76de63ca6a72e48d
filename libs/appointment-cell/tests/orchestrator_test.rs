use assert_matches::assert_matches;
use chrono::NaiveDate;

use appointment_cell::models::*;
use appointment_cell::services::{BookingOrchestrator, LocalBookingBackend};
use provider_cell::models::SelectionNotice;
use shared_database::ClinicStore;
use shared_utils::test_utils::{TestState, TestUser};

fn march_12() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()
}

fn orchestrator(test: &TestState, user: &TestUser) -> BookingOrchestrator<LocalBookingBackend> {
    BookingOrchestrator::new(test.session_for(user), LocalBookingBackend::new(&test.state))
        .unwrap()
        .starting_on(march_12())
}

fn fill_intake(flow: &mut BookingOrchestrator<LocalBookingBackend>) {
    flow.update_intake("surname", "Lee").unwrap();
    flow.update_intake("first_name", "Min").unwrap();
    flow.update_intake("dob", "1/1/1990").unwrap();
    flow.update_intake("health_card_number", "1234567890").unwrap();
    flow.update_intake("clinical_information", "headache").unwrap();
}

#[tokio::test]
async fn single_provider_flow_reaches_booked() {
    let test = TestState::new();
    let user = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let mut flow = orchestrator(&test, &user);

    flow.load_primary(a.id).await.unwrap();
    assert_eq!(flow.grid()[0].slots.len(), 36);
    flow.proceed_to_slot_selection().unwrap();
    flow.choose_slot("12/3/2025", "10:00 AM").await.unwrap();
    assert_eq!(flow.state(), BookingState::FillingIntakeForm);

    fill_intake(&mut flow);
    flow.update_intake("screening.claustrophobic", "yes").unwrap();
    flow.update_intake("exam_areas.head", true).unwrap();
    flow.confirm().unwrap();

    let redirect = flow.submit().await.unwrap();
    assert_eq!(flow.state(), BookingState::AwaitingPaymentRedirect);
    assert_eq!(redirect.amount, 100.0);
    assert_eq!(redirect.summary, "1 of 1 appointments booked");

    let appointment_id = flow.outcome().unwrap().succeeded[0].id;
    assert!(!test.store.get_appointment(appointment_id).await.unwrap().unwrap().paid);

    test.payments.mark_paid(&redirect.session_id).await;
    let confirmation = flow.handle_payment_return(&redirect.session_id).await.unwrap();
    assert!(confirmation.paid);
    assert_eq!(flow.state(), BookingState::Booked);

    let stored = test.store.get_appointment(appointment_id).await.unwrap().unwrap();
    assert!(stored.paid);
    assert_eq!(stored.intake_form.exam_areas.head, true);
}

#[tokio::test]
async fn two_providers_share_slot_intake_and_one_checkout() {
    let test = TestState::new();
    let user = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let b = test.add_provider("Dr. B", 150.0).await;
    let mut flow = orchestrator(&test, &user);

    flow.load_primary(a.id).await.unwrap();
    assert_eq!(flow.add_provider(b.id).await.unwrap(), SelectionNotice::Added);
    assert_eq!(flow.total_fee(), 250.0);
    assert_eq!(flow.grid()[0].slots[0].time, "09:00 AM");

    flow.proceed_to_slot_selection().unwrap();
    flow.choose_slot("12/3/2025", "10:00 AM").await.unwrap();
    fill_intake(&mut flow);
    flow.confirm().unwrap();
    let redirect = flow.submit().await.unwrap();

    assert_eq!(redirect.amount, 250.0);
    assert_eq!(test.payments.session_count().await, 1);
    let checkout = test.payments.session_request(&redirect.session_id).await.unwrap();
    assert_eq!(checkout.total_cents(), 25000);

    let outcome = flow.outcome().unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.succeeded.len(), 2);
    for appointment in &outcome.succeeded {
        assert_eq!(appointment.slot_date, "12/3/2025");
        assert_eq!(appointment.slot_time, "10:00 AM");
        assert_eq!(appointment.intake_form.surname, "Lee");
        assert_eq!(appointment.provider_ids.len(), 1);
    }
}

#[tokio::test]
async fn slot_taken_after_selection_gives_partial_outcome() {
    let test = TestState::new();
    let user = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let b = test.add_provider("Dr. B", 150.0).await;
    let c = test.add_provider("Dr. C", 80.0).await;
    let mut flow = orchestrator(&test, &user);

    flow.load_primary(a.id).await.unwrap();
    flow.add_provider(b.id).await.unwrap();
    flow.add_provider(c.id).await.unwrap();
    flow.proceed_to_slot_selection().unwrap();
    flow.choose_slot("12/3/2025", "10:00 AM").await.unwrap();
    fill_intake(&mut flow);
    flow.confirm().unwrap();

    // Someone else takes Dr. C's slot between selection and submission
    test.store.reserve_slot(c.id, "12/3/2025", "10:00 AM").await.unwrap();

    let redirect = flow.submit().await.unwrap();
    assert_eq!(redirect.summary, "2 of 3 appointments booked");
    assert_eq!(redirect.amount, 250.0);

    let outcome = flow.outcome().unwrap();
    assert_eq!(outcome.succeeded.len(), 2);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].provider_id, c.id);
}

#[tokio::test]
async fn taken_slot_is_rejected_at_selection() {
    let test = TestState::new();
    let user = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let mut flow = orchestrator(&test, &user);

    flow.load_primary(a.id).await.unwrap();
    flow.proceed_to_slot_selection().unwrap();

    test.store.reserve_slot(a.id, "12/3/2025", "10:00 AM").await.unwrap();

    let result = flow.choose_slot("12/3/2025", "10:00 AM").await;
    assert_matches!(result, Err(BookingError::Conflict(_)));
    assert_eq!(flow.state(), BookingState::SelectingSlot);
    let day = &flow.grid()[0];
    assert!(day.slot("10:00 AM").unwrap().is_booked);

    flow.choose_slot("12/3/2025", "10:30 AM").await.unwrap();
    assert_eq!(flow.chosen_slot().unwrap().slot_time, "10:30 AM");
}

#[tokio::test]
async fn incomplete_intake_keeps_the_form_open() {
    let test = TestState::new();
    let user = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let mut flow = orchestrator(&test, &user);

    flow.load_primary(a.id).await.unwrap();
    flow.proceed_to_slot_selection().unwrap();
    flow.choose_slot("12/3/2025", "10:00 AM").await.unwrap();
    flow.update_intake("surname", "Lee").unwrap();

    let result = flow.confirm();
    let Err(BookingError::IncompleteIntake(err)) = result else {
        panic!("expected missing fields");
    };
    assert_eq!(err.missing.len(), 4);
    assert_eq!(flow.state(), BookingState::FillingIntakeForm);

    assert_matches!(flow.update_intake("screening.unknown", "yes"), Err(BookingError::Validation(_)));

    flow.cancel().unwrap();
    assert_eq!(flow.state(), BookingState::Cancelled);
}

#[tokio::test]
async fn primary_provider_stays_and_order_is_enforced() {
    let test = TestState::new();
    let user = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let b = test.add_provider("Dr. B", 150.0).await;
    let mut flow = orchestrator(&test, &user);

    assert_matches!(flow.proceed_to_slot_selection(), Err(BookingError::Validation(_)));
    assert_matches!(flow.cancel(), Err(BookingError::Validation(_)));

    flow.load_primary(a.id).await.unwrap();
    flow.add_provider(b.id).await.unwrap();
    assert_matches!(flow.remove_provider(a.id), Err(BookingError::Validation(_)));
    flow.remove_provider(b.id).unwrap();
    assert_eq!(flow.total_fee(), 100.0);

    test.store.set_provider_availability(a.id, false).await.unwrap();
    let mut flow = orchestrator(&test, &user);
    flow.load_primary(a.id).await.unwrap();
    assert_matches!(flow.proceed_to_slot_selection(), Err(BookingError::Validation(_)));
}

#[tokio::test]
async fn payment_session_failure_fails_the_flow() {
    let test = TestState::new();
    let user = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let mut flow = orchestrator(&test, &user);

    flow.load_primary(a.id).await.unwrap();
    flow.proceed_to_slot_selection().unwrap();
    flow.choose_slot("12/3/2025", "10:00 AM").await.unwrap();
    fill_intake(&mut flow);
    flow.confirm().unwrap();

    test.payments.reject_new_sessions(true);
    let result = flow.submit().await;
    assert_matches!(result, Err(BookingError::Payment(_)));
    assert_eq!(flow.state(), BookingState::Failed);
    assert_eq!(flow.failure().unwrap().step, BookingState::CreatingPaymentSession);

    // The unpaid appointment stays for the sweeper
    let appointments = test
        .store
        .list_appointments(shared_database::AppointmentFilter::for_patient(&user.id))
        .await
        .unwrap();
    assert_eq!(appointments.len(), 1);
    assert!(!appointments[0].paid);
}

#[tokio::test]
async fn unpaid_return_fails_at_verification() {
    let test = TestState::new();
    let user = TestUser::patient("min@example.com");
    let a = test.add_provider("Dr. A", 100.0).await;
    let mut flow = orchestrator(&test, &user);

    flow.load_primary(a.id).await.unwrap();
    flow.proceed_to_slot_selection().unwrap();
    flow.choose_slot("12/3/2025", "10:00 AM").await.unwrap();
    fill_intake(&mut flow);
    flow.confirm().unwrap();
    let redirect = flow.submit().await.unwrap();

    assert_matches!(
        flow.handle_payment_return("cs_someone_else").await,
        Err(BookingError::Validation(_))
    );

    let result = flow.handle_payment_return(&redirect.session_id).await;
    assert_matches!(result, Err(BookingError::Payment(_)));
    assert_eq!(flow.failure().unwrap().step, BookingState::VerifyingPayment);
}

#[tokio::test]
async fn inactive_session_cannot_start_a_booking() {
    let test = TestState::new();
    let user = TestUser::patient("min@example.com");
    let mut session = test.session_for(&user);
    session.teardown();

    let result = BookingOrchestrator::new(session, LocalBookingBackend::new(&test.state));
    assert_matches!(result.err(), Some(BookingError::Auth(_)));
}
