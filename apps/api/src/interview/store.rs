//! Session storage.
//!
//! `RedisSessionStore` keeps each session as a JSON string with a TTL so abandoned
//! interviews expire. `InMemorySessionStore` backs tests and local runs.
//! `SessionLocks` serializes mutations of one session within this process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::session::Session;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Session>, AppError>;

    async fn put(&self, session: &Session) -> Result<(), AppError>;

    /// Returns `false` if there was nothing to delete.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn put(&self, session: &Session) -> Result<(), AppError> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.sessions.write().await.remove(&id).is_some())
    }
}

pub struct RedisSessionStore {
    conn: MultiplexedConnection,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub async fn connect(client: &redis::Client, ttl_secs: u64) -> Result<Self, AppError> {
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Redis session store connected (ttl: {ttl_secs}s)");
        Ok(Self { conn, ttl_secs })
    }
}

fn session_key(id: Uuid) -> String {
    format!("interview:session:{id}")
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(session_key(id))
            .query_async(&mut conn)
            .await?;

        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| {
                AppError::SessionStore(format!("Corrupt session {id} in Redis: {e}"))
            })
        })
        .transpose()
    }

    async fn put(&self, session: &Session) -> Result<(), AppError> {
        let json = serde_json::to_string(session)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Session serialization: {e}")))?;
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(session_key(session.id))
            .arg(json)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
        debug!("Stored session {} in Redis", session.id);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(session_key(id))
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }
}

type LockMap = Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>;

/// Per-session async locks. Holding the guard across load → evaluate → store keeps
/// two submissions for the same session from both recording against one question.
///
/// A session's entry lives only while someone holds or waits on its lock.
#[derive(Clone, Default)]
pub struct SessionLocks {
    locks: LockMap,
}

impl SessionLocks {
    pub async fn acquire(&self, id: Uuid) -> SessionGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            locks.entry(id).or_default().clone()
        };
        SessionGuard {
            id,
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
        }
    }

    #[cfg(test)]
    pub fn tracked_sessions(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

/// Releases the session lock on drop and removes the map entry once it is idle.
pub struct SessionGuard {
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockMap,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        // Only the map's own reference left: no holder, no waiter.
        if locks.get(&self.id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&self.id);
        }
    }
}
