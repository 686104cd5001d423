use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm_client::ModelGateway;
use crate::roleplay::orchestrator::SessionOrchestrator;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("session limit of {0} reached, try again later")]
    Full(usize),
}

/// Bounds on the registry: idle sessions expire after `idle_ttl`, at most `max_sessions` live.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub idle_ttl: Duration,
    pub max_sessions: usize,
}

struct Entry {
    orchestrator: Arc<SessionOrchestrator>,
    last_seen: Instant,
}

/// Registry of live sessions. Each entry is independent and single-flight on its own.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
    gateway: Arc<dyn ModelGateway>,
    limits: SessionLimits,
}

impl SessionStore {
    pub fn new(gateway: Arc<dyn ModelGateway>, limits: SessionLimits) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            gateway,
            limits,
        }
    }

    /// Registers a new idle session. Expired entries are dropped first when at capacity.
    pub async fn create(&self) -> Result<Arc<SessionOrchestrator>, StoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.limits.max_sessions {
            self.evict_expired(&mut sessions);
        }
        if sessions.len() >= self.limits.max_sessions {
            warn!(max_sessions = self.limits.max_sessions, "Session limit reached");
            return Err(StoreError::Full(self.limits.max_sessions));
        }

        let id = Uuid::new_v4();
        let orchestrator = Arc::new(SessionOrchestrator::new(id, self.gateway.clone()));
        sessions.insert(
            id,
            Entry {
                orchestrator: orchestrator.clone(),
                last_seen: Instant::now(),
            },
        );
        info!(session_id = %id, "Session created");
        Ok(orchestrator)
    }

    /// Looks up a session and marks it as recently used.
    pub async fn get(&self, id: Uuid) -> Option<Arc<SessionOrchestrator>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = Instant::now();
        Some(entry.orchestrator.clone())
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops every session idle for longer than the TTL. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        self.evict_expired(&mut sessions)
    }

    /// Runs `sweep_expired` every `period` until the runtime shuts down.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let removed = store.sweep_expired().await;
                if removed > 0 {
                    let remaining = store.len().await;
                    info!(removed, remaining, "Expired idle sessions");
                }
            }
        })
    }

    fn evict_expired(&self, sessions: &mut HashMap<Uuid, Entry>) -> usize {
        let before = sessions.len();
        let ttl = self.limits.idle_ttl;
        sessions.retain(|id, entry| {
            let keep = entry.last_seen.elapsed() <= ttl;
            if !keep {
                debug!(session_id = %id, "Evicting idle session");
            }
            keep
        });
        before - sessions.len()
    }
}
