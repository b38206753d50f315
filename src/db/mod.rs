mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::payments::{MercadoPagoClient, ReconciliationEngine};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Base URL for provider callbacks (e.g. https://api.example.com)
    pub base_url: String,
    /// Provider API client, used directly by checkout
    pub provider: MercadoPagoClient,
    /// Webhook reconciliation engine
    pub engine: Arc<ReconciliationEngine<MercadoPagoClient>>,
}

/// Per-connection pragmas. WAL keeps readers off the write lock, and the
/// busy timeout makes overlapping writers wait for it instead of failing
/// with SQLITE_BUSY; webhook deliveries for the same reference rely on that
/// to serialize.
pub fn configure_connection(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;",
    )
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager =
        SqliteConnectionManager::file(database_path).with_init(|conn| configure_connection(conn));
    Pool::builder().max_size(10).build(manager)
}
