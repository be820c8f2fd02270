use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::http::HeaderValue;
use tokio::{signal, sync::mpsc};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

use pesaflow_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db = Arc::new(db_pool);
    let config = Arc::new(cfg);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // External clients
    let gateway: Arc<dyn api::gateway::SettlementGateway> = Arc::new(
        api::gateway::HttpSettlementGateway::new(&config.gateway, db.clone())?,
    );
    let messaging: Arc<dyn api::messaging::MessageSender> =
        if config.messaging.access_token.is_empty() {
            info!("messaging provider not configured; replies will be dropped");
            Arc::new(api::messaging::NoopMessageSender)
        } else {
            Arc::new(api::messaging::HttpMessageSender::new(&config.messaging)?)
        };

    // Aggregate app services used by HTTP handlers and workers
    let services = api::handlers::AppServices::new(
        db.clone(),
        gateway,
        messaging.clone(),
        Arc::new(event_sender.clone()),
        config.clone(),
    );

    // Background workers
    api::workers::spawn_payout_worker(db.clone(), services.payouts.clone(), config.clone());
    api::workers::spawn_reconciliation_worker(
        db.clone(),
        services.payments.clone(),
        config.clone(),
    );
    api::workers::spawn_cart_sweeper(db.clone(), messaging, config.clone());

    let app_state = api::AppState {
        db,
        config: config.clone(),
        event_sender,
        services,
    };

    // Build CORS layer from config
    let configured_origins: Option<Vec<HeaderValue>> = config
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let cors_layer = if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if config.is_development() {
        info!("using permissive CORS (development environment)");
        CorsLayer::permissive()
    } else {
        error!("missing CORS configuration; set APP__CORS_ALLOWED_ORIGINS");
        return Err("missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS".into());
    };

    let app = api::app_router()
        .merge(api::openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors_layer)
        .with_state(app_state);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!(%addr, "starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
