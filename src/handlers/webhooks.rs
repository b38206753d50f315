//! Payment-provider webhook endpoint.
//!
//! Thin by design: extract raw transport data (query string, signature
//! headers, body bytes), hand everything to the parser and the engine, and
//! translate the outcome into the status code the provider's retry policy
//! keys on. No reconciliation logic lives here.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};

use crate::db::AppState;
use crate::payments::{NotificationEvent, WebhookQuery, WebhookResult};

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    let event = NotificationEvent::parse(
        &query,
        &body,
        header_str(&headers, "x-signature"),
        header_str(&headers, "x-request-id"),
    );

    let mut conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    state.engine.process(&mut conn, &event).await
}
