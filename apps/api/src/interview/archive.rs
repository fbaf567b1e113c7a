//! Transcript archive — durable storage for completed interviews.
//!
//! `PgS3Archive` uploads the transcript JSON to S3 and upserts a row (with the same
//! JSON in a JSONB column) into `interview_transcripts`. Archiving the same session
//! twice overwrites both copies.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::session::Mode;
use crate::interview::transcript::Transcript;
use crate::models::transcript::TranscriptRow;

#[async_trait]
pub trait TranscriptArchive: Send + Sync {
    /// Stores the transcript and returns the object key it was written under.
    async fn archive(&self, transcript: &Transcript) -> Result<String, AppError>;

    async fn get(&self, session_id: Uuid) -> Result<Option<Transcript>, AppError>;

    /// Most recently completed first.
    async fn list(&self, limit: i64) -> Result<Vec<TranscriptRow>, AppError>;
}

pub fn transcript_key(session_id: Uuid) -> String {
    format!("transcripts/{session_id}.json")
}

pub fn mode_str(mode: Mode) -> &'static str {
    match mode {
        Mode::Interview => "interview",
        Mode::Practice => "practice",
    }
}

pub struct PgS3Archive {
    pub db: PgPool,
    pub s3: aws_sdk_s3::Client,
    pub bucket: String,
}

#[async_trait]
impl TranscriptArchive for PgS3Archive {
    async fn archive(&self, transcript: &Transcript) -> Result<String, AppError> {
        let session_id = transcript.session_id;
        let body = serde_json::to_vec_pretty(transcript)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Transcript serialization: {e}")))?;
        let json = serde_json::to_value(transcript)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Transcript serialization: {e}")))?;

        // 1. Upload JSON to S3
        let s3_key = transcript_key(session_id);
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&s3_key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| AppError::S3(format!("Transcript upload failed: {e}")))?;

        info!("Uploaded transcript to s3://{}/{}", self.bucket, s3_key);

        // 2. Upsert the queryable row
        sqlx::query(
            r#"
            INSERT INTO interview_transcripts
                (session_id, mode, model, started_at, completed_at,
                 total_score, max_score, transcript, s3_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (session_id) DO UPDATE
            SET transcript = EXCLUDED.transcript,
                total_score = EXCLUDED.total_score,
                max_score = EXCLUDED.max_score,
                s3_key = EXCLUDED.s3_key,
                archived_at = now()
            "#,
        )
        .bind(session_id)
        .bind(mode_str(transcript.mode))
        .bind(&transcript.model)
        .bind(transcript.started_at)
        .bind(transcript.completed_at)
        .bind(transcript.scoreboard.total_score as i32)
        .bind(transcript.scoreboard.max_score as i32)
        .bind(&json)
        .bind(&s3_key)
        .execute(&self.db)
        .await?;

        info!(
            "Archived transcript for session {session_id}: {}/{}",
            transcript.scoreboard.total_score, transcript.scoreboard.max_score
        );

        Ok(s3_key)
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<Transcript>, AppError> {
        let json: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT transcript FROM interview_transcripts WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.db)
        .await?;

        json.map(|value| {
            serde_json::from_value(value).map_err(|e| {
                AppError::Internal(anyhow::anyhow!(
                    "Archived transcript {session_id} is unreadable: {e}"
                ))
            })
        })
        .transpose()
    }

    async fn list(&self, limit: i64) -> Result<Vec<TranscriptRow>, AppError> {
        Ok(sqlx::query_as::<_, TranscriptRow>(
            r#"
            SELECT session_id, mode, model, started_at, completed_at,
                   total_score, max_score, s3_key, archived_at
            FROM interview_transcripts
            ORDER BY completed_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?)
    }
}
