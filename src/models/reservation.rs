use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReservationStatus::Pending),
            "confirmed" => Some(ReservationStatus::Confirmed),
            "cancelled" => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }

    /// Reservation status implied by the provider's payment status string.
    pub fn from_provider_payment(status: &str) -> Self {
        match status {
            "approved" => ReservationStatus::Confirmed,
            "pending" => ReservationStatus::Pending,
            _ => ReservationStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub property_id: String,
    pub guest_name: String,
    pub guest_email: String,
    pub check_in: i64,
    pub check_out: i64,
    pub status: ReservationStatus,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateReservation {
    pub property_id: String,
    pub guest_name: String,
    pub guest_email: String,
    pub check_in: i64,
    pub check_out: i64,
}
