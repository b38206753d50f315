use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

fn bad_column(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("invalid {}: {}", what, value).into(),
    )
}

// ============ Payment intents (the ledger) ============

const PAYMENT_COLS: &str = "id, external_reference, entity_kind, amount_cents, method, \
     description, created_at, provider_payment_id, status";

fn payment_from_row(row: &Row) -> rusqlite::Result<PaymentIntent> {
    let kind: String = row.get(2)?;
    let status: String = row.get(8)?;
    Ok(PaymentIntent {
        id: row.get(0)?,
        external_reference: row.get(1)?,
        entity_kind: EntityKind::parse(&kind).ok_or_else(|| bad_column(2, "entity_kind", &kind))?,
        amount_cents: row.get(3)?,
        method: row.get(4)?,
        description: row.get(5)?,
        created_at: row.get(6)?,
        provider_payment_id: row.get(7)?,
        status: PaymentStatus::parse(&status)
            .ok_or_else(|| bad_column(8, "payment status", &status))?,
    })
}

/// Insert a new pending payment intent.
pub fn create_payment_intent(
    conn: &Connection,
    input: &CreatePaymentIntent,
) -> Result<PaymentIntent> {
    let intent = PaymentIntent {
        id: gen_id(),
        external_reference: input.external_reference.clone(),
        entity_kind: input.entity_kind,
        amount_cents: input.amount_cents,
        method: input.method.clone(),
        description: input.description.clone(),
        created_at: now(),
        provider_payment_id: None,
        status: PaymentStatus::Pending,
    };

    conn.execute(
        "INSERT INTO payments (id, external_reference, entity_kind, amount_cents, method, \
         description, created_at, provider_payment_id, status) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)",
        params![
            intent.id,
            intent.external_reference,
            intent.entity_kind.as_str(),
            intent.amount_cents,
            intent.method,
            intent.description,
            intent.created_at,
            intent.status.as_str(),
        ],
    )?;

    Ok(intent)
}

pub fn get_payment_intent(conn: &Connection, id: &str) -> Result<Option<PaymentIntent>> {
    conn.query_row(
        &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLS),
        params![id],
        payment_from_row,
    )
    .optional()
    .map_err(Into::into)
}

/// Most recently created pending intent for the (external_reference, kind)
/// pair. At most one pending intent per pair is assumed; ordering covers the
/// case where stale ones exist anyway.
pub fn find_latest_pending(
    conn: &Connection,
    external_reference: &str,
    kind: EntityKind,
) -> Result<Option<PaymentIntent>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM payments \
             WHERE external_reference = ?1 AND entity_kind = ?2 AND status = 'pending' \
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
            PAYMENT_COLS
        ),
        params![external_reference, kind.as_str()],
        payment_from_row,
    )
    .optional()
    .map_err(Into::into)
}

/// Apply a reconciled status to an intent. The provider payment id is written
/// once and kept thereafter.
pub fn apply_payment_status(
    conn: &Connection,
    intent_id: &str,
    provider_payment_id: &str,
    status: PaymentStatus,
) -> Result<()> {
    conn.execute(
        "UPDATE payments SET \
         provider_payment_id = COALESCE(provider_payment_id, ?1), \
         status = ?2 \
         WHERE id = ?3",
        params![provider_payment_id, status.as_str(), intent_id],
    )?;
    Ok(())
}

// ============ Reservations ============

const RESERVATION_COLS: &str =
    "id, property_id, guest_name, guest_email, check_in, check_out, status, created_at";

fn reservation_from_row(row: &Row) -> rusqlite::Result<Reservation> {
    let status: String = row.get(6)?;
    Ok(Reservation {
        id: row.get(0)?,
        property_id: row.get(1)?,
        guest_name: row.get(2)?,
        guest_email: row.get(3)?,
        check_in: row.get(4)?,
        check_out: row.get(5)?,
        status: ReservationStatus::parse(&status)
            .ok_or_else(|| bad_column(6, "reservation status", &status))?,
        created_at: row.get(7)?,
    })
}

pub fn create_reservation(conn: &Connection, input: &CreateReservation) -> Result<Reservation> {
    let reservation = Reservation {
        id: gen_id(),
        property_id: input.property_id.clone(),
        guest_name: input.guest_name.clone(),
        guest_email: input.guest_email.clone(),
        check_in: input.check_in,
        check_out: input.check_out,
        status: ReservationStatus::Pending,
        created_at: now(),
    };

    conn.execute(
        "INSERT INTO reservations (id, property_id, guest_name, guest_email, check_in, \
         check_out, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            reservation.id,
            reservation.property_id,
            reservation.guest_name,
            reservation.guest_email,
            reservation.check_in,
            reservation.check_out,
            reservation.status.as_str(),
            reservation.created_at,
        ],
    )?;

    Ok(reservation)
}

pub fn get_reservation(conn: &Connection, id: &str) -> Result<Option<Reservation>> {
    conn.query_row(
        &format!("SELECT {} FROM reservations WHERE id = ?1", RESERVATION_COLS),
        params![id],
        reservation_from_row,
    )
    .optional()
    .map_err(Into::into)
}

/// Returns false when no reservation matched.
pub fn set_reservation_status(
    conn: &Connection,
    id: &str,
    status: ReservationStatus,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE reservations SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(affected > 0)
}

// ============ Consultancies ============

const CONSULTANCY_COLS: &str =
    "id, client_name, client_email, topic, scheduled_at, status, created_at";

fn consultancy_from_row(row: &Row) -> rusqlite::Result<Consultancy> {
    let status: String = row.get(5)?;
    Ok(Consultancy {
        id: row.get(0)?,
        client_name: row.get(1)?,
        client_email: row.get(2)?,
        topic: row.get(3)?,
        scheduled_at: row.get(4)?,
        status: ConsultancyStatus::parse(&status)
            .ok_or_else(|| bad_column(5, "consultancy status", &status))?,
        created_at: row.get(6)?,
    })
}

pub fn create_consultancy(conn: &Connection, input: &CreateConsultancy) -> Result<Consultancy> {
    let consultancy = Consultancy {
        id: gen_id(),
        client_name: input.client_name.clone(),
        client_email: input.client_email.clone(),
        topic: input.topic.clone(),
        scheduled_at: input.scheduled_at,
        status: ConsultancyStatus::Pending,
        created_at: now(),
    };

    conn.execute(
        "INSERT INTO consultancies (id, client_name, client_email, topic, scheduled_at, \
         status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            consultancy.id,
            consultancy.client_name,
            consultancy.client_email,
            consultancy.topic,
            consultancy.scheduled_at,
            consultancy.status.as_str(),
            consultancy.created_at,
        ],
    )?;

    Ok(consultancy)
}

pub fn get_consultancy(conn: &Connection, id: &str) -> Result<Option<Consultancy>> {
    conn.query_row(
        &format!("SELECT {} FROM consultancies WHERE id = ?1", CONSULTANCY_COLS),
        params![id],
        consultancy_from_row,
    )
    .optional()
    .map_err(Into::into)
}

/// Returns false when no consultancy matched.
pub fn set_consultancy_status(
    conn: &Connection,
    id: &str,
    status: ConsultancyStatus,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE consultancies SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(affected > 0)
}
