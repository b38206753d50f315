//! Downstream collaborators the reconciliation engine notifies: the owning
//! aggregate (reservation or consultancy) and the reservation-confirmation
//! channel.
//!
//! Entity dispatch is a closed table keyed by [`EntityKind`] so the set of
//! handled kinds stays exhaustive; adding a kind without a gateway fails to
//! compile.

use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;
use crate::db::queries;
use crate::models::{ConsultancyStatus, EntityKind, Reservation, ReservationStatus};

/// Status propagation into the aggregate that owns a payment. Takes the raw
/// provider status string; each aggregate applies its own mapping.
pub trait EntityGateway: Send + Sync {
    fn update_status_by_payment(
        &self,
        conn: &Connection,
        external_reference: &str,
        provider_status: &str,
    ) -> Result<()>;
}

pub struct ReservationGateway;

impl EntityGateway for ReservationGateway {
    fn update_status_by_payment(
        &self,
        conn: &Connection,
        external_reference: &str,
        provider_status: &str,
    ) -> Result<()> {
        let status = ReservationStatus::from_provider_payment(provider_status);
        if queries::set_reservation_status(conn, external_reference, status)? {
            tracing::info!(
                "Reservation {} -> {} (payment status: {})",
                external_reference,
                status.as_str(),
                provider_status
            );
        } else {
            tracing::warn!(
                "Payment reconciled but reservation {} not found",
                external_reference
            );
        }
        Ok(())
    }
}

pub struct ConsultancyGateway;

impl EntityGateway for ConsultancyGateway {
    fn update_status_by_payment(
        &self,
        conn: &Connection,
        external_reference: &str,
        provider_status: &str,
    ) -> Result<()> {
        let status = ConsultancyStatus::from_provider_payment(provider_status);
        if queries::set_consultancy_status(conn, external_reference, status)? {
            tracing::info!(
                "Consultancy {} -> {} (payment status: {})",
                external_reference,
                status.as_str(),
                provider_status
            );
        } else {
            tracing::warn!(
                "Payment reconciled but consultancy {} not found",
                external_reference
            );
        }
        Ok(())
    }
}

pub fn for_kind(kind: EntityKind) -> &'static dyn EntityGateway {
    match kind {
        EntityKind::Reservation => &ReservationGateway,
        EntityKind::Consultancy => &ConsultancyGateway,
    }
}

/// Reservation-confirmation notification channel. The engine calls this at
/// most once per actual status change.
pub trait ConfirmationSender: Send + Sync {
    fn send_reservation_confirmation(&self, reservation: &Reservation);
}

/// Retry delays in seconds (exponential backoff: 1s, 4s, 16s)
const RETRY_DELAYS: &[u64] = &[1, 4, 16];

#[derive(Serialize)]
struct ConfirmationPayload {
    event: &'static str,
    reservation_id: String,
    property_id: String,
    guest_name: String,
    guest_email: String,
    check_in: i64,
    check_out: i64,
}

/// POSTs the confirmation to a configured webhook URL. Delivery is
/// fire-and-continue: it runs on a spawned task and never blocks or fails the
/// webhook request that triggered it.
pub struct WebhookConfirmationSender {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookConfirmationSender {
    pub fn new(client: reqwest::Client, url: Option<String>) -> Self {
        Self { client, url }
    }
}

impl ConfirmationSender for WebhookConfirmationSender {
    fn send_reservation_confirmation(&self, reservation: &Reservation) {
        let Some(url) = self.url.clone() else {
            tracing::info!(
                "Confirmation delivery disabled; reservation {} confirmed for {}",
                reservation.id,
                reservation.guest_email
            );
            return;
        };

        let client = self.client.clone();
        let body = ConfirmationPayload {
            event: "reservation_confirmed",
            reservation_id: reservation.id.clone(),
            property_id: reservation.property_id.clone(),
            guest_name: reservation.guest_name.clone(),
            guest_email: reservation.guest_email.clone(),
            check_in: reservation.check_in,
            check_out: reservation.check_out,
        };
        let reservation_id = reservation.id.clone();

        tokio::spawn(async move {
            for (attempt, delay) in std::iter::once(&0u64).chain(RETRY_DELAYS).enumerate() {
                if *delay > 0 {
                    tokio::time::sleep(std::time::Duration::from_secs(*delay)).await;
                }
                match client.post(&url).json(&body).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        tracing::info!(
                            "Reservation confirmation delivered: reservation={}",
                            reservation_id
                        );
                        return;
                    }
                    Ok(resp) => {
                        tracing::warn!(
                            "Confirmation webhook returned {} (attempt {}): reservation={}",
                            resp.status(),
                            attempt + 1,
                            reservation_id
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Confirmation webhook failed (attempt {}): reservation={}: {}",
                            attempt + 1,
                            reservation_id,
                            e
                        );
                    }
                }
            }
            tracing::error!(
                "Giving up on reservation confirmation: reservation={}",
                reservation_id
            );
        });
    }
}
