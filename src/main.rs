use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rentora::config::Config;
use rentora::db::{create_pool, init_db, queries, AppState};
use rentora::gateways::WebhookConfirmationSender;
use rentora::handlers;
use rentora::models::{CreateConsultancy, CreatePaymentIntent, CreateReservation, EntityKind};
use rentora::payments::{MercadoPagoClient, ReconciliationEngine};

#[derive(Parser, Debug)]
#[command(name = "rentora")]
#[command(about = "Property-rental payment reconciliation service")]
struct Cli {
    /// Seed the database with dev data (reservation, consultancy, pending intents)
    #[arg(long)]
    seed: bool,
}

/// Seeds a sample reservation and consultancy, each with a pending payment
/// intent, so webhooks can be exercised against a fresh dev database.
fn seed_dev_data(conn: &rusqlite::Connection) {
    let reservation = queries::create_reservation(
        conn,
        &CreateReservation {
            property_id: "prop-demo-1".to_string(),
            guest_name: "Dev Guest".to_string(),
            guest_email: "guest@rentora.local".to_string(),
            check_in: chrono::Utc::now().timestamp() + 7 * 86400,
            check_out: chrono::Utc::now().timestamp() + 14 * 86400,
        },
    )
    .expect("Failed to create dev reservation");

    let reservation_intent = queries::create_payment_intent(
        conn,
        &CreatePaymentIntent {
            external_reference: reservation.id.clone(),
            entity_kind: EntityKind::Reservation,
            amount_cents: 120_000,
            method: Some("checkout".to_string()),
            description: Some("Dev reservation payment".to_string()),
        },
    )
    .expect("Failed to create dev reservation intent");

    let consultancy = queries::create_consultancy(
        conn,
        &CreateConsultancy {
            client_name: "Dev Client".to_string(),
            client_email: "client@rentora.local".to_string(),
            topic: "Investment appraisal".to_string(),
            scheduled_at: chrono::Utc::now().timestamp() + 3 * 86400,
        },
    )
    .expect("Failed to create dev consultancy");

    let consultancy_intent = queries::create_payment_intent(
        conn,
        &CreatePaymentIntent {
            external_reference: consultancy.id.clone(),
            entity_kind: EntityKind::Consultancy,
            amount_cents: 25_000,
            method: Some("checkout".to_string()),
            description: Some("Dev consultancy payment".to_string()),
        },
    )
    .expect("Failed to create dev consultancy intent");

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED");
    tracing::info!("Reservation: {} (intent {})", reservation.id, reservation_intent.id);
    tracing::info!("Consultancy: {} (intent {})", consultancy.id, consultancy_intent.id);
    tracing::info!("============================================");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rentora=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.webhook_secret.is_empty() {
        tracing::warn!(
            "MP_WEBHOOK_SECRET is not set; all webhook signatures will fail \
             and every notification will take the API fallback path"
        );
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");

        if cli.seed {
            if config.dev_mode {
                seed_dev_data(&conn);
            } else {
                tracing::warn!("--seed flag ignored: not in dev mode (set RENTORA_ENV=dev)");
            }
        }
    }

    let provider = MercadoPagoClient::new(&config.provider_access_token, config.provider_timeout)
        .expect("Failed to build provider client");
    let confirmations = Arc::new(WebhookConfirmationSender::new(
        reqwest::Client::new(),
        config.confirmation_webhook_url.clone(),
    ));
    let engine = Arc::new(ReconciliationEngine::new(
        provider.clone(),
        config.webhook_secret.as_bytes().to_vec(),
        confirmations,
    ));

    let state = AppState {
        db: db_pool,
        base_url: config.base_url.clone(),
        provider,
        engine,
    };

    let app = Router::new()
        .merge(handlers::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Rentora server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
