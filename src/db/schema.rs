use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Payment intents (the ledger). Never deleted: terminal states are
        -- retained for audit.
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            external_reference TEXT NOT NULL,
            entity_kind TEXT NOT NULL CHECK (entity_kind IN ('reservation', 'consultancy')),
            amount_cents INTEGER NOT NULL,
            method TEXT,
            description TEXT,
            created_at INTEGER NOT NULL,
            provider_payment_id TEXT,
            status TEXT NOT NULL CHECK (status IN (
                'pending', 'approved', 'authorized', 'in_progress', 'cancelled',
                'refunded', 'in_mediation', 'rejected', 'chargeback'
            ))
        );
        -- Reconciliation looks up the most recent pending intent per
        -- (external_reference, entity_kind) pair.
        CREATE INDEX IF NOT EXISTS idx_payments_pending
            ON payments(external_reference, entity_kind, created_at)
            WHERE status = 'pending';
        CREATE INDEX IF NOT EXISTS idx_payments_provider
            ON payments(provider_payment_id);

        CREATE TABLE IF NOT EXISTS reservations (
            id TEXT PRIMARY KEY,
            property_id TEXT NOT NULL,
            guest_name TEXT NOT NULL,
            guest_email TEXT NOT NULL,
            check_in INTEGER NOT NULL,
            check_out INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'confirmed', 'cancelled')),
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS consultancies (
            id TEXT PRIMARY KEY,
            client_name TEXT NOT NULL,
            client_email TEXT NOT NULL,
            topic TEXT NOT NULL,
            scheduled_at INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'confirmed', 'cancelled')),
            created_at INTEGER NOT NULL
        );
        "#,
    )
}
