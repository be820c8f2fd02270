//! Payment settlement orchestration for multi-tenant conversational
//! commerce: mobile-money collection settled through a crypto on/off-ramp
//! into an append-only merchant ledger, with payout orchestration and a
//! conversational cart engine on top.

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod messaging;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod workers;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Liveness and database connectivity probe.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let db_ok = state
        .db
        .execute(Statement::from_string(
            state.db.get_database_backend(),
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();

    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if db_ok { "healthy" } else { "degraded" },
            "database": db_ok,
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
}

async fn api_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Versioned API router. Workers and the swagger UI are mounted by `main`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/payments", handlers::payments::payment_routes())
        .nest("/payouts", handlers::payouts::payout_routes())
        .nest("/stores", handlers::finance::finance_routes())
        .nest("/webhooks", handlers::webhooks::webhook_routes())
}

pub fn app_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/status", get(api_status))
        .nest("/api/v1", api_v1_routes())
}
