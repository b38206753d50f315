//! Test utilities and fixtures for Rentora integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub use rentora::db::{init_db, queries};
pub use rentora::error::{AppError, Result};
pub use rentora::gateways::ConfirmationSender;
pub use rentora::models::*;
pub use rentora::payments::signature;
pub use rentora::payments::{
    CreatedPreference, NotificationEvent, PreferenceRequest, ProviderApi, ProviderPayment,
    ReconciliationEngine, WebhookQuery,
};

pub const TEST_SECRET: &[u8] = b"test_webhook_secret";
pub const TEST_TS: &str = "1700000000";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// File-backed test database, for tests that need several connections to the
/// same data. The caller removes the file when done.
pub fn setup_file_db() -> (Connection, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!("rentora-test-{}.db", uuid::Uuid::new_v4()));
    let conn = open_shared_db(&path);
    init_db(&conn).expect("Failed to initialize schema");
    (conn, path)
}

/// Extra connection to a file-backed test database, configured the same way
/// pooled connections are.
pub fn open_shared_db(path: &std::path::Path) -> Connection {
    let conn = Connection::open(path).expect("Failed to open test database");
    rentora::db::configure_connection(&conn).expect("Failed to configure connection");
    conn
}

pub fn create_test_reservation(conn: &Connection) -> Reservation {
    queries::create_reservation(
        conn,
        &CreateReservation {
            property_id: "prop-1".to_string(),
            guest_name: "Test Guest".to_string(),
            guest_email: "guest@example.com".to_string(),
            check_in: 1_700_600_000,
            check_out: 1_701_200_000,
        },
    )
    .expect("Failed to create test reservation")
}

pub fn create_test_consultancy(conn: &Connection) -> Consultancy {
    queries::create_consultancy(
        conn,
        &CreateConsultancy {
            client_name: "Test Client".to_string(),
            client_email: "client@example.com".to_string(),
            topic: "Rental strategy".to_string(),
            scheduled_at: 1_700_500_000,
        },
    )
    .expect("Failed to create test consultancy")
}

pub fn create_pending_intent(
    conn: &Connection,
    external_reference: &str,
    kind: EntityKind,
) -> PaymentIntent {
    queries::create_payment_intent(
        conn,
        &CreatePaymentIntent {
            external_reference: external_reference.to_string(),
            entity_kind: kind,
            amount_cents: 120_000,
            method: Some("checkout".to_string()),
            description: None,
        },
    )
    .expect("Failed to create test payment intent")
}

/// Scripted provider: serves payments from a map, optionally failing every
/// call, and counts lookups.
#[derive(Clone, Default)]
pub struct MockProvider {
    payments: Arc<Mutex<HashMap<String, ProviderPayment>>>,
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_payment(self, id: &str, status: &str) -> Self {
        self.payments.lock().unwrap().insert(
            id.to_string(),
            ProviderPayment {
                id: id.to_string(),
                status: status.to_string(),
                external_reference: None,
                transaction_amount: Some(1200.0),
            },
        );
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProviderApi for MockProvider {
    async fn get_payment(&self, id: &str) -> Result<ProviderPayment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Provider("mock provider down".into()));
        }
        self.payments
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::Provider(format!("unknown payment {}", id)))
    }

    async fn create_preference(&self, request: &PreferenceRequest) -> Result<CreatedPreference> {
        if self.fail {
            return Err(AppError::Provider("mock provider down".into()));
        }
        Ok(CreatedPreference {
            id: format!("pref-{}", request.external_reference),
            init_point: "https://checkout.test/init".to_string(),
        })
    }
}

/// Records confirmation dispatches instead of delivering them.
#[derive(Default)]
pub struct CountingConfirmations {
    sent: AtomicUsize,
    last: Mutex<Option<Reservation>>,
}

impl CountingConfirmations {
    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn last_reservation(&self) -> Option<Reservation> {
        self.last.lock().unwrap().clone()
    }
}

impl ConfirmationSender for CountingConfirmations {
    fn send_reservation_confirmation(&self, reservation: &Reservation) {
        self.sent.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(reservation.clone());
    }
}

pub fn make_engine(
    provider: MockProvider,
    confirmations: Arc<CountingConfirmations>,
) -> ReconciliationEngine<MockProvider> {
    ReconciliationEngine::new(provider, TEST_SECRET.to_vec(), confirmations)
}

/// Query string of a payment notification carrying the correlation params.
pub fn payment_query(data_id: &str, reference: &str, kind: &str) -> WebhookQuery {
    WebhookQuery {
        topic: Some("payment".to_string()),
        data_id: Some(data_id.to_string()),
        external_reference: Some(reference.to_string()),
        entity_kind: Some(kind.to_string()),
        ..Default::default()
    }
}

/// Build an event with a digest valid for TEST_SECRET.
pub fn signed_event(query: &WebhookQuery, body: &[u8]) -> NotificationEvent {
    let data_id = query.data_id.clone().unwrap_or_default();
    let digest = signature::compute_digest(&data_id, TEST_TS, "", TEST_SECRET)
        .expect("digest computation");
    let header = format!("ts={},v1={}", TEST_TS, digest);
    NotificationEvent::parse(query, body, Some(&header), None)
}

/// Build an event whose digest will not verify.
pub fn badly_signed_event(query: &WebhookQuery, body: &[u8]) -> NotificationEvent {
    let data_id = query.data_id.clone().unwrap_or_default();
    let digest = signature::compute_digest(&data_id, TEST_TS, "", b"wrong_secret")
        .expect("digest computation");
    let header = format!("ts={},v1={}", TEST_TS, digest);
    NotificationEvent::parse(query, body, Some(&header), None)
}
