use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audit log of every settlement gateway call, written before the call's
/// result is returned to the orchestrator.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gateway_request_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub operation: String,
    pub correlation_id: Uuid,
    #[sea_orm(column_type = "Json")]
    pub request: Json,
    #[sea_orm(column_type = "Json")]
    pub response: Json,
    pub http_status: i32,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
