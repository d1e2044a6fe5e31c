use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::context::StatusHandle;
use crate::error::Result;
use crate::orchestrator::Orchestrator;

/// One document session. The orchestrator lock serialises requests within the
/// session; the status handle can be read without taking it.
#[derive(Clone)]
pub struct Session {
    pub id: String,
    pub orchestrator: Arc<Mutex<Orchestrator>>,
    pub status: StatusHandle,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(orchestrator: Orchestrator) -> Self {
        let status = orchestrator.status_handle();
        Self {
            id: Uuid::new_v4().to_string(),
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            status,
            created_at: Utc::now(),
        }
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    /// Returns whether a session was removed.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// In-memory implementation of SessionStorage
#[derive(Default)]
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.sessions.remove(id).is_some())
    }
}
