use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row of the append-only `usage_records` table. Rows are inserted by
/// the action recorder and never updated or deleted; all quota counts are
/// derived from them on read.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageRecordRow {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub action_type: String,
    pub amount_cents: i64,
    /// Processor reference for paid actions; NULL for free recordings.
    /// UNIQUE in the schema, which is what makes paid recording at-most-once.
    pub external_payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}
