use serde::{Deserialize, Serialize};

/// Which business aggregate a payment belongs to.
///
/// Reservation and consultancy ids are drawn from independent sequences and
/// can collide, so the kind always travels together with the external
/// reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Reservation,
    Consultancy,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Reservation => "reservation",
            EntityKind::Consultancy => "consultancy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reservation" => Some(EntityKind::Reservation),
            "consultancy" => Some(EntityKind::Consultancy),
            _ => None,
        }
    }
}

/// Local payment status, mapped from the provider's status strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Authorized,
    InProgress,
    Cancelled,
    Refunded,
    InMediation,
    Rejected,
    Chargeback,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::InProgress => "in_progress",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::InMediation => "in_mediation",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Chargeback => "chargeback",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "approved" => Some(PaymentStatus::Approved),
            "authorized" => Some(PaymentStatus::Authorized),
            "in_progress" => Some(PaymentStatus::InProgress),
            "cancelled" => Some(PaymentStatus::Cancelled),
            "refunded" => Some(PaymentStatus::Refunded),
            "in_mediation" => Some(PaymentStatus::InMediation),
            "rejected" => Some(PaymentStatus::Rejected),
            "chargeback" => Some(PaymentStatus::Chargeback),
            _ => None,
        }
    }

    /// Map the provider's payment status string to the local enum.
    /// Unknown statuses stay pending until a later notification settles them.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "approved" => PaymentStatus::Approved,
            "rejected" => PaymentStatus::Rejected,
            "cancelled" => PaymentStatus::Cancelled,
            "refunded" => PaymentStatus::Refunded,
            "in_progress" => PaymentStatus::InProgress,
            _ => PaymentStatus::Pending,
        }
    }
}

/// Locally tracked record of an expected or completed payment, distinct from
/// the provider's own payment record. Created pending at checkout, mutated
/// only by the reconciliation engine, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Id of the reservation or consultancy being paid for
    pub external_reference: String,
    pub entity_kind: EntityKind,
    pub amount_cents: i64,
    pub method: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
    /// Provider-side payment id, set the first time it is confirmed
    pub provider_payment_id: Option<String>,
    pub status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentIntent {
    pub external_reference: String,
    pub entity_kind: EntityKind,
    pub amount_cents: i64,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
