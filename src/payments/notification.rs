//! Webhook notification parsing.
//!
//! A notification arrives with data spread over two untrusted sources: the
//! callback URL query string and the JSON body. Neither is complete on its
//! own and the two disagree in practice, so all precedence rules live here in
//! one merge step and the engine never re-touches raw transport data.

use serde::Deserialize;

use crate::models::EntityKind;

use super::signature::SignatureHeader;

/// Query parameters on the webhook URL. `external_reference` and
/// `entity_kind` are not provider fields: checkout puts them on the
/// notification URL so the webhook can be correlated with a local intent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookQuery {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default, rename = "data.id")]
    pub data_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub entity_kind: Option<String>,
}

/// Canonical, merged view of one webhook delivery.
#[derive(Debug, Clone, Default)]
pub struct NotificationEvent {
    pub topic: Option<String>,
    pub event_type: Option<String>,
    /// Body-only; e.g. "payment.updated"
    pub action: Option<String>,
    /// Resolved provider payment id, used for the API lookup
    pub payment_id: Option<String>,
    /// The query-string `data.id`, which is what the provider signs. Not
    /// necessarily the same value as `payment_id`.
    pub signature_data_id: Option<String>,
    /// Merchant-order id from the query string; acknowledged, never looked up
    pub merchant_order_id: Option<String>,
    pub external_reference: Option<String>,
    pub entity_kind: Option<EntityKind>,
    pub signature: Option<SignatureHeader>,
    pub request_id: Option<String>,
}

impl NotificationEvent {
    /// Merge query parameters, JSON body, and signature headers into one
    /// event. Body parsing is best-effort: a malformed body downgrades to
    /// query-only data instead of failing the request.
    pub fn parse(
        query: &WebhookQuery,
        body: &[u8],
        signature_header: Option<&str>,
        request_id: Option<&str>,
    ) -> Self {
        let body: Option<serde_json::Value> = if body.is_empty() {
            None
        } else {
            match serde_json::from_slice(body) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::debug!("Unparseable webhook body, using query only: {}", e);
                    None
                }
            }
        };

        // Body-derived topic/type override the query when non-empty.
        let topic = body
            .as_ref()
            .and_then(|b| value_str(b.get("topic")?))
            .or_else(|| non_empty(query.topic.as_deref()));
        let event_type = body
            .as_ref()
            .and_then(|b| value_str(b.get("type")?))
            .or_else(|| non_empty(query.event_type.as_deref()));
        let action = body.as_ref().and_then(|b| value_str(b.get("action")?));

        // Payment id resolution order: body data.id / root id, then the
        // resource URL suffix, then query data.id, then query id when the
        // topic is "payment".
        let body_payment_id = body.as_ref().and_then(|b| {
            b.get("data")
                .and_then(|d| value_str(d.get("id")?))
                .or_else(|| value_str(b.get("id")?))
        });
        let resource_id = body
            .as_ref()
            .and_then(|b| value_str(b.get("resource")?))
            .and_then(|r| resource_suffix(&r));

        let query_data_id = non_empty(query.data_id.as_deref());
        let query_id = non_empty(query.id.as_deref());

        let is_payment_topic = topic.as_deref() == Some("payment");
        let is_merchant_order = topic.as_deref() == Some("merchant_order");

        let payment_id = body_payment_id
            .or(resource_id)
            .or_else(|| query_data_id.clone())
            .or_else(|| {
                if is_payment_topic {
                    query_id.clone()
                } else {
                    None
                }
            });

        // Under merchant_order the query id only identifies the order for
        // acknowledgment; it must never feed the payment lookup.
        let merchant_order_id = if is_merchant_order { query_id } else { None };

        NotificationEvent {
            topic,
            event_type,
            action,
            payment_id,
            signature_data_id: query_data_id,
            merchant_order_id,
            external_reference: non_empty(query.external_reference.as_deref()),
            entity_kind: query
                .entity_kind
                .as_deref()
                .and_then(EntityKind::parse),
            signature: signature_header.and_then(SignatureHeader::parse),
            request_id: request_id.map(|s| s.to_string()),
        }
    }

    pub fn is_merchant_order(&self) -> bool {
        self.topic.as_deref() == Some("merchant_order")
            || self.event_type.as_deref() == Some("merchant_order")
    }

    pub fn is_payment(&self) -> bool {
        self.topic.as_deref() == Some("payment") || self.event_type.as_deref() == Some("payment")
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(|s| s.to_string())
}

/// Accept both string and numeric JSON values; the provider uses either for
/// ids depending on the notification version.
fn value_str(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The `resource` body field may be a URL ending in `/payments/{id}`; the id
/// is the segment after the last slash.
fn resource_suffix(resource: &str) -> Option<String> {
    resource
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
