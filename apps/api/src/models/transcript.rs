use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Listing view of an archived transcript (the JSONB body is fetched separately).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TranscriptRow {
    pub session_id: Uuid,
    pub mode: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total_score: i32,
    pub max_score: i32,
    pub s3_key: String,
    pub archived_at: DateTime<Utc>,
}
