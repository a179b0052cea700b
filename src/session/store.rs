//! Session repository: a narrow read/replace API over the persisted
//! collection of research sessions.
//!
//! All mutations go through [`SessionStore::update`], which applies a closure
//! to a copy of the record, replaces the record wholesale, persists the full
//! collection and broadcasts a payload-free "state changed" signal.
//! Observers re-read whatever they need; no diffs are ever emitted.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::{AppError, ResearchSession, Result};

/// Wholesale load/replace persistence for the session collection.
///
/// There is deliberately no partial or streaming persistence: the collection
/// is loaded once on startup and replaced in full on every mutation.
#[async_trait]
pub trait SessionPersistence: Send + Sync {
    async fn load(&self) -> Result<Vec<ResearchSession>>;
    async fn replace(&self, sessions: &[ResearchSession]) -> Result<()>;
}

/// Ephemeral persistence backend; sessions live only in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore;

#[async_trait]
impl SessionPersistence for MemoryStore {
    async fn load(&self) -> Result<Vec<ResearchSession>> {
        Ok(Vec::new())
    }

    async fn replace(&self, _sessions: &[ResearchSession]) -> Result<()> {
        Ok(())
    }
}

/// File-backed persistence: one JSON document holding every session.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionPersistence for JsonFileStore {
    async fn load(&self) -> Result<Vec<ResearchSession>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AppError::Storage(format!("corrupt session file: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AppError::Storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn replace(&self, sessions: &[ResearchSession]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("failed to create data dir: {e}")))?;
        }
        let json = serde_json::to_vec_pretty(sessions)
            .map_err(|e| AppError::Storage(format!("failed to encode sessions: {e}")))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| AppError::Storage(format!("failed to write {}: {e}", self.path.display())))
    }
}

/// In-memory view of all sessions plus the persistence backend behind it.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, ResearchSession>>,
    persistence: Box<dyn SessionPersistence>,
    notifier: broadcast::Sender<()>,
}

impl SessionStore {
    /// Load the persisted collection and build the store around it.
    pub async fn open(persistence: Box<dyn SessionPersistence>) -> Result<Self> {
        let loaded = persistence.load().await?;
        let sessions = loaded.into_iter().map(|s| (s.id.clone(), s)).collect();
        let (notifier, _) = broadcast::channel(64);
        Ok(Self {
            sessions: RwLock::new(sessions),
            persistence,
            notifier,
        })
    }

    /// Subscribe to the payload-free state-changed broadcast.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notifier.subscribe()
    }

    /// Snapshot of one session.
    pub fn get(&self, session_id: &str) -> Option<ResearchSession> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Snapshot of all sessions, oldest first.
    pub fn list(&self) -> Vec<ResearchSession> {
        let mut all: Vec<_> = self.sessions.read().values().cloned().collect();
        all.sort_by_key(|s| s.created_at);
        all
    }

    /// Create a new empty session for the topic.
    pub async fn create(&self, topic: &str) -> Result<ResearchSession> {
        let session = ResearchSession::new(topic);
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
        self.persist_and_notify().await?;
        Ok(session)
    }

    /// Destroy a session. The only way a session ever disappears.
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        let removed = self.sessions.write().remove(session_id);
        if removed.is_none() {
            return Err(AppError::NotFound(format!("session {session_id}")));
        }
        self.persist_and_notify().await
    }

    pub async fn rename(&self, session_id: &str, name: &str) -> Result<()> {
        self.update(session_id, |s| s.name = name.to_string())
            .await?;
        Ok(())
    }

    /// Apply a mutation to the session and replace the record atomically.
    ///
    /// Last writer wins per call; callers touching concurrent pipeline state
    /// must keep to their own fields.
    pub async fn update<F>(&self, session_id: &str, mutate: F) -> Result<ResearchSession>
    where
        F: FnOnce(&mut ResearchSession),
    {
        let updated = {
            let mut sessions = self.sessions.write();
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))?;
            mutate(session);
            session.clone()
        };
        self.persist_and_notify().await?;
        Ok(updated)
    }

    /// Append a timestamped entry to the session's audit trail.
    pub async fn log(&self, session_id: &str, message: impl AsRef<str>) -> Result<()> {
        debug!(session = session_id, "log: {}", message.as_ref());
        self.update(session_id, |s| s.push_log(message.as_ref()))
            .await?;
        Ok(())
    }

    async fn persist_and_notify(&self) -> Result<()> {
        let snapshot: Vec<ResearchSession> = {
            let mut all: Vec<_> = self.sessions.read().values().cloned().collect();
            all.sort_by_key(|s| s.created_at);
            all
        };
        self.persistence.replace(&snapshot).await?;
        // No receivers is fine; the signal is best-effort.
        let _ = self.notifier.send(());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stage;

    async fn memory_store() -> SessionStore {
        SessionStore::open(Box::new(MemoryStore)).await.unwrap()
    }

    #[tokio::test]
    async fn create_get_and_delete() {
        let store = memory_store().await;
        let session = store.create("topic A").await.unwrap();

        assert_eq!(store.get(&session.id).unwrap().topic, "topic A");
        assert_eq!(store.list().len(), 1);

        store.delete(&session.id).await.unwrap();
        assert!(store.get(&session.id).is_none());
        assert!(matches!(
            store.delete(&session.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_replaces_the_record_and_notifies() {
        let store = memory_store().await;
        let session = store.create("topic").await.unwrap();
        let mut changed = store.subscribe();

        store
            .update(&session.id, |s| s.stage = Stage::Planning)
            .await
            .unwrap();

        assert_eq!(store.get(&session.id).unwrap().stage, Stage::Planning);
        changed.try_recv().expect("state-changed signal expected");
    }

    #[tokio::test]
    async fn update_unknown_session_is_not_found() {
        let store = memory_store().await;
        let result = store.update("missing", |_| {}).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn json_file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        {
            let store = SessionStore::open(Box::new(JsonFileStore::new(&path)))
                .await
                .unwrap();
            let session = store.create("persisted topic").await.unwrap();
            store.log(&session.id, "a trace entry").await.unwrap();
        }

        let reopened = SessionStore::open(Box::new(JsonFileStore::new(&path)))
            .await
            .unwrap();
        let all = reopened.list();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].topic, "persisted topic");
        assert!(all[0].log.iter().any(|l| l.contains("a trace entry")));
    }

    #[tokio::test]
    async fn json_file_store_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nope.json"));
        assert!(store.load().await.unwrap().is_empty());
    }
}
