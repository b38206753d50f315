//! Reconciliation engine: applies provider payment status to local intents.
//!
//! Webhook delivery is unordered, duplicated, and concurrent, so the engine
//! is built around two rules: the find-then-mutate sequence for an intent
//! runs inside a single immediate database transaction, and status responses
//! encode retry semantics for the provider (5xx means "redeliver", 2xx means
//! "stop, we are done or it was never ours").

use std::sync::Arc;

use axum::http::StatusCode;
use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::gateways::{self, ConfirmationSender};
use crate::models::{EntityKind, PaymentStatus, Reservation};

use super::mercadopago::{ProviderApi, ProviderPayment};
use super::notification::NotificationEvent;
use super::signature;

/// Status + plain acknowledgment body, as returned to the provider.
pub type WebhookResult = (StatusCode, &'static str);

pub struct ReconciliationEngine<P> {
    provider: P,
    webhook_secret: Vec<u8>,
    confirmations: Arc<dyn ConfirmationSender>,
}

impl<P: ProviderApi> ReconciliationEngine<P> {
    pub fn new(
        provider: P,
        webhook_secret: impl Into<Vec<u8>>,
        confirmations: Arc<dyn ConfirmationSender>,
    ) -> Self {
        Self {
            provider,
            webhook_secret: webhook_secret.into(),
            confirmations,
        }
    }

    /// Dispatch one parsed notification.
    pub async fn process(&self, conn: &mut Connection, event: &NotificationEvent) -> WebhookResult {
        if event.is_merchant_order() {
            // Acknowledge only; merchant orders carry no payment state we track.
            tracing::debug!(
                "Merchant order notification acknowledged: order_id={:?}",
                event.merchant_order_id
            );
            return (StatusCode::OK, "Merchant order acknowledged");
        }

        if event.is_payment() {
            if let Some(payment_id) = event.payment_id.clone() {
                return self
                    .reconcile(conn, event, &payment_id)
                    .await
                    .unwrap_or_else(|e| e);
            }
        }

        tracing::info!(
            "Unhandled notification: topic={:?}, type={:?}, action={:?}",
            event.topic,
            event.event_type,
            event.action
        );
        (StatusCode::OK, "Notification ignored")
    }

    async fn reconcile(
        &self,
        conn: &mut Connection,
        event: &NotificationEvent,
        payment_id: &str,
    ) -> Result<WebhookResult, WebhookResult> {
        // Without the correlation parameters there is no way to know which
        // local intent this payment belongs to.
        let (Some(reference), Some(kind)) =
            (event.external_reference.clone(), event.entity_kind)
        else {
            tracing::warn!(
                "Payment notification missing correlation parameters: payment_id={}",
                payment_id
            );
            return Err((StatusCode::BAD_REQUEST, "Missing correlation parameters"));
        };

        let signature_valid = self.verify_signature(event, payment_id);
        let payment = self
            .fetch_authoritative(payment_id, signature_valid)
            .await?;

        let mapped = PaymentStatus::from_provider(&payment.status);
        tracing::info!(
            "Reconciling payment: payment_id={}, provider_status={}, reference={}, kind={}",
            payment.id,
            payment.status,
            reference,
            kind.as_str()
        );

        let confirmation = match self.apply(conn, &reference, kind, &payment, mapped) {
            Ok(confirmation) => confirmation,
            Err(ApplyError::AlreadyProcessed) => {
                tracing::info!("Already processed: payment_id={}", payment.id);
                return Ok((StatusCode::OK, "Already processed"));
            }
            Err(ApplyError::NoPendingIntent) => {
                // The provider notifies for all account activity; a payment
                // with no matching intent is simply not ours.
                tracing::info!(
                    "No pending intent for reference={} kind={}; ignoring payment_id={}",
                    reference,
                    kind.as_str(),
                    payment.id
                );
                return Ok((StatusCode::OK, "No matching payment intent"));
            }
            Err(ApplyError::Db(e)) => {
                tracing::error!("Reconciliation db error: payment_id={}: {}", payment.id, e);
                return Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error"));
            }
        };

        // Post-commit, outside the transaction: fire-and-continue so a slow
        // notification channel cannot roll back the committed status change.
        if let Some(reservation) = confirmation {
            self.confirmations.send_reservation_confirmation(&reservation);
        }

        Ok((StatusCode::OK, "OK"))
    }

    fn verify_signature(&self, event: &NotificationEvent, payment_id: &str) -> bool {
        let Some(header) = &event.signature else {
            return false;
        };
        // The provider signs the query-string data.id, which is not always
        // the id the lookup ends up using.
        let data_id = event
            .signature_data_id
            .as_deref()
            .unwrap_or(payment_id);
        signature::verify(
            data_id,
            &header.ts,
            event.request_id.as_deref().unwrap_or(""),
            &header.v1,
            &self.webhook_secret,
        )
    }

    /// Named fallback step for the fail-open signature policy: an invalid
    /// signature does not reject the notification, it demotes it to an
    /// authoritative API lookup. Mismatches are observed in practice (clock
    /// skew, provider inconsistencies) and dropping them would lose real
    /// payment confirmations.
    async fn fetch_authoritative(
        &self,
        payment_id: &str,
        signature_valid: bool,
    ) -> Result<ProviderPayment, WebhookResult> {
        match self.provider.get_payment(payment_id).await {
            Ok(payment) => Ok(payment),
            Err(e) if signature_valid => {
                tracing::error!("Provider lookup failed for payment {}: {}", payment_id, e);
                Err((StatusCode::INTERNAL_SERVER_ERROR, "Provider unavailable"))
            }
            Err(e) => {
                tracing::warn!(
                    "Invalid signature and provider fallback failed for payment {}: {}",
                    payment_id,
                    e
                );
                Err((StatusCode::BAD_REQUEST, "Could not verify payment"))
            }
        }
    }

    /// Find-guard-mutate inside one immediate transaction. Concurrent
    /// deliveries for the same (reference, kind) serialize on the write lock;
    /// the loser re-reads the committed state and hits the guard or finds no
    /// pending intent. Returns the reservation to confirm, if any.
    fn apply(
        &self,
        conn: &mut Connection,
        reference: &str,
        kind: EntityKind,
        payment: &ProviderPayment,
        mapped: PaymentStatus,
    ) -> Result<Option<Reservation>, ApplyError> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(crate::error::AppError::from)?;

        let Some(intent) = queries::find_latest_pending(&tx, reference, kind)? else {
            return Err(ApplyError::NoPendingIntent);
        };

        // Idempotency guard: nothing to do when the status already matches
        // and the provider payment id is recorded.
        let same_provider_id = intent.provider_payment_id.as_deref() == Some(payment.id.as_str());
        if intent.status == mapped && same_provider_id {
            return Err(ApplyError::AlreadyProcessed);
        }

        queries::apply_payment_status(&tx, &intent.id, &payment.id, mapped)?;
        gateways::for_kind(kind).update_status_by_payment(&tx, reference, &payment.status)?;

        // The confirmation is sent at most once because reaching this point
        // requires the guard above to have observed an actual change.
        let confirmation = if kind == EntityKind::Reservation && mapped == PaymentStatus::Approved
        {
            queries::get_reservation(&tx, reference)?
        } else {
            None
        };

        tx.commit().map_err(crate::error::AppError::from)?;
        Ok(confirmation)
    }
}

enum ApplyError {
    AlreadyProcessed,
    NoPendingIntent,
    Db(crate::error::AppError),
}

impl From<crate::error::AppError> for ApplyError {
    fn from(e: crate::error::AppError) -> Self {
        ApplyError::Db(e)
    }
}
