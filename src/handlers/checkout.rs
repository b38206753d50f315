//! Checkout initiation: create a provider preference for a reservation or
//! consultancy and record the pending payment intent the webhook will later
//! reconcile.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::models::{CreatePaymentIntent, EntityKind};
use crate::payments::{PreferenceItem, PreferenceRequest, ProviderApi};

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Reservation or consultancy id being paid for
    pub external_reference: String,
    pub entity_kind: EntityKind,
    pub amount_cents: i64,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Local payment intent id
    pub payment_id: String,
    pub preference_id: String,
    /// Provider-hosted checkout URL for the payer
    pub checkout_url: String,
}

pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    if request.amount_cents <= 0 {
        return Err(AppError::BadRequest("Amount must be positive".into()));
    }

    let conn = state.db.get()?;

    // The referenced aggregate must exist before we take money for it.
    let title = match request.entity_kind {
        EntityKind::Reservation => {
            let reservation = queries::get_reservation(&conn, &request.external_reference)?
                .ok_or_else(|| AppError::NotFound("Reservation not found".into()))?;
            format!("Reservation - property {}", reservation.property_id)
        }
        EntityKind::Consultancy => {
            let consultancy = queries::get_consultancy(&conn, &request.external_reference)?
                .ok_or_else(|| AppError::NotFound("Consultancy not found".into()))?;
            format!("Consultancy - {}", consultancy.topic)
        }
    };

    // The webhook URL carries the correlation parameters the provider echoes
    // back on every notification for this preference.
    let notification_url = format!(
        "{}/payments/webhooks?external_reference={}&entity_kind={}",
        state.base_url,
        request.external_reference,
        request.entity_kind.as_str()
    );

    let preference = state
        .provider
        .create_preference(&PreferenceRequest {
            items: vec![PreferenceItem {
                title: request.description.clone().unwrap_or(title),
                quantity: 1,
                unit_price: request.amount_cents as f64 / 100.0,
            }],
            external_reference: request.external_reference.clone(),
            notification_url,
        })
        .await?;

    let intent = queries::create_payment_intent(
        &conn,
        &CreatePaymentIntent {
            external_reference: request.external_reference,
            entity_kind: request.entity_kind,
            amount_cents: request.amount_cents,
            method: request.method,
            description: request.description,
        },
    )?;

    tracing::info!(
        "Checkout created: intent={}, preference={}, reference={}, kind={}",
        intent.id,
        preference.id,
        intent.external_reference,
        intent.entity_kind.as_str()
    );

    Ok(Json(CheckoutResponse {
        payment_id: intent.id,
        preference_id: preference.id,
        checkout_url: preference.init_point,
    }))
}
