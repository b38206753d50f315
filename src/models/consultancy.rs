use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultancyStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ConsultancyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultancyStatus::Pending => "pending",
            ConsultancyStatus::Confirmed => "confirmed",
            ConsultancyStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ConsultancyStatus::Pending),
            "confirmed" => Some(ConsultancyStatus::Confirmed),
            "cancelled" => Some(ConsultancyStatus::Cancelled),
            _ => None,
        }
    }

    /// Consultancy status implied by the provider's payment status string.
    /// Same shape as the reservation mapping.
    pub fn from_provider_payment(status: &str) -> Self {
        match status {
            "approved" => ConsultancyStatus::Confirmed,
            "pending" => ConsultancyStatus::Pending,
            _ => ConsultancyStatus::Cancelled,
        }
    }
}

/// Advisory session booked and paid for independently of any reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultancy {
    pub id: String,
    pub client_name: String,
    pub client_email: String,
    pub topic: String,
    pub scheduled_at: i64,
    pub status: ConsultancyStatus,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateConsultancy {
    pub client_name: String,
    pub client_email: String,
    pub topic: String,
    pub scheduled_at: i64,
}
