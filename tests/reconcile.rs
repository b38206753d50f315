//! End-to-end reconciliation tests: webhook event in, ledger and entity
//! status out.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use rusqlite::TransactionBehavior;

use common::*;

#[tokio::test]
async fn approved_payment_confirms_the_reservation() {
    let mut conn = setup_test_db();
    let reservation = create_test_reservation(&conn);
    let intent = create_pending_intent(&conn, &reservation.id, EntityKind::Reservation);

    let provider = MockProvider::new().with_payment("555", "approved");
    let confirmations = Arc::new(CountingConfirmations::default());
    let engine = make_engine(provider.clone(), confirmations.clone());

    let event = signed_event(&payment_query("555", &reservation.id, "reservation"), b"");
    let (status, body) = engine.process(&mut conn, &event).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");

    let intent = queries::get_payment_intent(&conn, &intent.id)
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, PaymentStatus::Approved);
    assert_eq!(intent.provider_payment_id.as_deref(), Some("555"));

    let reservation = queries::get_reservation(&conn, &reservation.id)
        .unwrap()
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Confirmed);

    assert_eq!(confirmations.sent_count(), 1);
    assert_eq!(
        confirmations.last_reservation().unwrap().id,
        reservation.id
    );
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn redelivery_after_confirmation_is_a_no_op() {
    let mut conn = setup_test_db();
    let reservation = create_test_reservation(&conn);
    create_pending_intent(&conn, &reservation.id, EntityKind::Reservation);

    let provider = MockProvider::new().with_payment("555", "approved");
    let confirmations = Arc::new(CountingConfirmations::default());
    let engine = make_engine(provider.clone(), confirmations.clone());

    let event = signed_event(&payment_query("555", &reservation.id, "reservation"), b"");
    let (status, _) = engine.process(&mut conn, &event).await;
    assert_eq!(status, StatusCode::OK);

    // The provider redelivers the same notification. The intent is no longer
    // pending, so nothing matches and nothing mutates.
    let (status, body) = engine.process(&mut conn, &event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "No matching payment intent");

    let reservation = queries::get_reservation(&conn, &reservation.id)
        .unwrap()
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Confirmed);
    assert_eq!(confirmations.sent_count(), 1);
}

#[tokio::test]
async fn missing_correlation_parameters_reject_without_provider_call() {
    let mut conn = setup_test_db();
    let reservation = create_test_reservation(&conn);
    let intent = create_pending_intent(&conn, &reservation.id, EntityKind::Reservation);

    let provider = MockProvider::new().with_payment("555", "approved");
    let confirmations = Arc::new(CountingConfirmations::default());
    let engine = make_engine(provider.clone(), confirmations.clone());

    let query = WebhookQuery {
        topic: Some("payment".to_string()),
        data_id: Some("555".to_string()),
        ..Default::default()
    };
    let (status, body) = engine.process(&mut conn, &signed_event(&query, b"")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Missing correlation parameters");
    assert_eq!(provider.call_count(), 0);

    let intent = queries::get_payment_intent(&conn, &intent.id)
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, PaymentStatus::Pending);
    assert_eq!(intent.provider_payment_id, None);
}

#[tokio::test]
async fn invalid_signature_falls_back_to_the_provider_api() {
    let mut conn = setup_test_db();
    let reservation = create_test_reservation(&conn);
    let intent = create_pending_intent(&conn, &reservation.id, EntityKind::Reservation);

    // The API says rejected; the bad signature only demotes the delivery to
    // an authoritative lookup, it does not drop it.
    let provider = MockProvider::new().with_payment("555", "rejected");
    let confirmations = Arc::new(CountingConfirmations::default());
    let engine = make_engine(provider.clone(), confirmations.clone());

    let event = badly_signed_event(&payment_query("555", &reservation.id, "reservation"), b"");
    let (status, body) = engine.process(&mut conn, &event).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
    assert_eq!(provider.call_count(), 1);

    let intent = queries::get_payment_intent(&conn, &intent.id)
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, PaymentStatus::Rejected);

    let reservation = queries::get_reservation(&conn, &reservation.id)
        .unwrap()
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Cancelled);
    assert_eq!(confirmations.sent_count(), 0);
}

#[tokio::test]
async fn invalid_signature_and_provider_failure_is_unverifiable() {
    let mut conn = setup_test_db();
    let reservation = create_test_reservation(&conn);
    let intent = create_pending_intent(&conn, &reservation.id, EntityKind::Reservation);

    let provider = MockProvider::failing();
    let confirmations = Arc::new(CountingConfirmations::default());
    let engine = make_engine(provider, confirmations.clone());

    let event = badly_signed_event(&payment_query("555", &reservation.id, "reservation"), b"");
    let (status, body) = engine.process(&mut conn, &event).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Could not verify payment");

    let intent = queries::get_payment_intent(&conn, &intent.id)
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn valid_signature_and_provider_failure_asks_for_redelivery() {
    let mut conn = setup_test_db();
    let reservation = create_test_reservation(&conn);
    create_pending_intent(&conn, &reservation.id, EntityKind::Reservation);

    let provider = MockProvider::failing();
    let confirmations = Arc::new(CountingConfirmations::default());
    let engine = make_engine(provider, confirmations.clone());

    let event = signed_event(&payment_query("555", &reservation.id, "reservation"), b"");
    let (status, body) = engine.process(&mut conn, &event).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Provider unavailable");
}

#[tokio::test]
async fn merchant_order_is_acknowledged_without_any_lookup() {
    let mut conn = setup_test_db();
    let reservation = create_test_reservation(&conn);
    let intent = create_pending_intent(&conn, &reservation.id, EntityKind::Reservation);

    let provider = MockProvider::new().with_payment("555", "approved");
    let confirmations = Arc::new(CountingConfirmations::default());
    let engine = make_engine(provider.clone(), confirmations.clone());

    let query = WebhookQuery {
        topic: Some("merchant_order".to_string()),
        id: Some("order-99".to_string()),
        external_reference: Some(reservation.id.clone()),
        entity_kind: Some("reservation".to_string()),
        ..Default::default()
    };
    let (status, body) = engine
        .process(&mut conn, &NotificationEvent::parse(&query, b"", None, None))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Merchant order acknowledged");
    assert_eq!(provider.call_count(), 0);

    let intent = queries::get_payment_intent(&conn, &intent.id)
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn unhandled_topic_is_acknowledged() {
    let mut conn = setup_test_db();

    let provider = MockProvider::new();
    let confirmations = Arc::new(CountingConfirmations::default());
    let engine = make_engine(provider.clone(), confirmations);

    let query = WebhookQuery {
        topic: Some("point_integration_wh".to_string()),
        id: Some("123".to_string()),
        ..Default::default()
    };
    let (status, body) = engine
        .process(&mut conn, &NotificationEvent::parse(&query, b"", None, None))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Notification ignored");
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn unknown_reference_is_acknowledged_so_retries_stop() {
    let mut conn = setup_test_db();

    let provider = MockProvider::new().with_payment("555", "approved");
    let confirmations = Arc::new(CountingConfirmations::default());
    let engine = make_engine(provider, confirmations.clone());

    let event = signed_event(&payment_query("555", "no-such-reservation", "reservation"), b"");
    let (status, body) = engine.process(&mut conn, &event).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "No matching payment intent");
    assert_eq!(confirmations.sent_count(), 0);
}

#[tokio::test]
async fn approved_consultancy_is_confirmed_without_reservation_notification() {
    let mut conn = setup_test_db();
    let consultancy = create_test_consultancy(&conn);
    let intent = create_pending_intent(&conn, &consultancy.id, EntityKind::Consultancy);

    let provider = MockProvider::new().with_payment("777", "approved");
    let confirmations = Arc::new(CountingConfirmations::default());
    let engine = make_engine(provider, confirmations.clone());

    let event = signed_event(&payment_query("777", &consultancy.id, "consultancy"), b"");
    let (status, _) = engine.process(&mut conn, &event).await;
    assert_eq!(status, StatusCode::OK);

    let intent = queries::get_payment_intent(&conn, &intent.id)
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, PaymentStatus::Approved);

    let consultancy = queries::get_consultancy(&conn, &consultancy.id)
        .unwrap()
        .unwrap();
    assert_eq!(consultancy.status, ConsultancyStatus::Confirmed);

    // Reservation confirmations do not apply to consultancies.
    assert_eq!(confirmations.sent_count(), 0);
}

#[tokio::test]
async fn pending_then_approved_confirms_exactly_once() {
    let mut conn = setup_test_db();
    let reservation = create_test_reservation(&conn);
    let intent_id = create_pending_intent(&conn, &reservation.id, EntityKind::Reservation).id;

    let provider = MockProvider::new().with_payment("555", "pending");
    let confirmations = Arc::new(CountingConfirmations::default());
    let engine = make_engine(provider.clone(), confirmations.clone());

    let event = signed_event(&payment_query("555", &reservation.id, "reservation"), b"");
    let (status, _) = engine.process(&mut conn, &event).await;
    assert_eq!(status, StatusCode::OK);

    // First delivery records the provider payment id but leaves everything
    // pending; no confirmation yet.
    let intent = queries::get_payment_intent(&conn, &intent_id).unwrap().unwrap();
    assert_eq!(intent.status, PaymentStatus::Pending);
    assert_eq!(intent.provider_payment_id.as_deref(), Some("555"));
    assert_eq!(confirmations.sent_count(), 0);

    // The payment settles and the provider notifies again.
    let provider2 = MockProvider::new().with_payment("555", "approved");
    let engine = make_engine(provider2, confirmations.clone());
    let (status, body) = engine.process(&mut conn, &event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");

    let intent = queries::get_payment_intent(&conn, &intent_id).unwrap().unwrap();
    assert_eq!(intent.status, PaymentStatus::Approved);

    let reservation = queries::get_reservation(&conn, &reservation.id)
        .unwrap()
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Confirmed);
    assert_eq!(confirmations.sent_count(), 1);
}

#[tokio::test]
async fn duplicate_pending_delivery_hits_the_guard() {
    let mut conn = setup_test_db();
    let reservation = create_test_reservation(&conn);
    create_pending_intent(&conn, &reservation.id, EntityKind::Reservation);

    let provider = MockProvider::new().with_payment("555", "pending");
    let confirmations = Arc::new(CountingConfirmations::default());
    let engine = make_engine(provider, confirmations.clone());

    let event = signed_event(&payment_query("555", &reservation.id, "reservation"), b"");
    let (status, _) = engine.process(&mut conn, &event).await;
    assert_eq!(status, StatusCode::OK);

    // Same status, same provider payment id: nothing changed, nothing to do.
    let (status, body) = engine.process(&mut conn, &event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Already processed");
    assert_eq!(confirmations.sent_count(), 0);
}

#[tokio::test]
async fn overlapping_deliveries_wait_for_the_write_lock() {
    let (mut conn_a, path) = setup_file_db();
    let mut conn_b = open_shared_db(&path);

    let reservation = create_test_reservation(&conn_a);
    create_pending_intent(&conn_a, &reservation.id, EntityKind::Reservation);

    let provider = MockProvider::new().with_payment("555", "approved");
    let confirmations = Arc::new(CountingConfirmations::default());
    let engine = make_engine(provider, confirmations.clone());

    // Another worker is mid-reconciliation and holds the write lock when our
    // delivery arrives. The busy timeout makes the second transaction wait it
    // out instead of failing with SQLITE_BUSY.
    let holder = std::thread::spawn(move || {
        let tx = conn_a
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .expect("holder transaction");
        std::thread::sleep(Duration::from_millis(200));
        tx.commit().expect("holder commit");
    });
    std::thread::sleep(Duration::from_millis(50));

    let event = signed_event(&payment_query("555", &reservation.id, "reservation"), b"");
    let (status, body) = engine.process(&mut conn_b, &event).await;
    holder.join().unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");

    let reservation = queries::get_reservation(&conn_b, &reservation.id)
        .unwrap()
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Confirmed);
    assert_eq!(confirmations.sent_count(), 1);

    drop(conn_b);
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn unknown_provider_status_keeps_the_intent_pending() {
    let mut conn = setup_test_db();
    let reservation = create_test_reservation(&conn);
    let intent_id = create_pending_intent(&conn, &reservation.id, EntityKind::Reservation).id;

    let provider = MockProvider::new().with_payment("555", "charged_back_maybe");
    let confirmations = Arc::new(CountingConfirmations::default());
    let engine = make_engine(provider, confirmations.clone());

    let event = signed_event(&payment_query("555", &reservation.id, "reservation"), b"");
    let (status, _) = engine.process(&mut conn, &event).await;
    assert_eq!(status, StatusCode::OK);

    let intent = queries::get_payment_intent(&conn, &intent_id).unwrap().unwrap();
    assert_eq!(intent.status, PaymentStatus::Pending);
    assert_eq!(intent.provider_payment_id.as_deref(), Some("555"));

    // The reservation mapping only trusts "approved" and "pending"; anything
    // else releases the booking.
    let reservation = queries::get_reservation(&conn, &reservation.id)
        .unwrap()
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Cancelled);
    assert_eq!(confirmations.sent_count(), 0);
}
