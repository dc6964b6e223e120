use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::tailoring::session::TailoringSession;

struct Entry {
    session: TailoringSession,
    /// Last creation or mutation.
    touched: Instant,
}

/// In-memory session registry. Idle sessions are dropped by `evict_idle`.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session, lets `init` populate it, and returns its id.
    pub async fn create<T>(&self, init: impl FnOnce(&mut TailoringSession) -> T) -> (Uuid, T) {
        let id = Uuid::new_v4();
        let mut session = TailoringSession::new(id);
        let out = init(&mut session);
        let entry = Entry {
            session,
            touched: Instant::now(),
        };
        self.sessions.write().await.insert(id, entry);
        info!("Session {id} created");
        (id, out)
    }

    pub async fn read<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&TailoringSession) -> T,
    ) -> Result<T, AppError> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(&id).ok_or_else(|| not_found(id))?;
        Ok(f(&entry.session))
    }

    pub async fn update<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut TailoringSession) -> T,
    ) -> Result<T, AppError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id).ok_or_else(|| not_found(id))?;
        entry.touched = Instant::now();
        Ok(f(&mut entry.session))
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), AppError> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| info!("Session {id} removed"))
            .ok_or_else(|| not_found(id))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops every session untouched for longer than `ttl`. Returns how
    /// many were removed.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.touched) <= ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {evicted} idle session(s), {} remain", sessions.len());
        }
        evicted
    }

    /// Runs `evict_idle` every `every` until the runtime shuts down.
    pub fn spawn_sweeper(&self, ttl: Duration, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let evicted = store.evict_idle(ttl).await;
                debug!("Session sweep done ({evicted} evicted)");
            }
        })
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Session {id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_read_remove() {
        let store = SessionStore::new();
        let (id, ()) = store.create(|_| ()).await;
        assert_eq!(store.len().await, 1);

        let seen = store.read(id, |s| s.id()).await.unwrap();
        assert_eq!(seen, id);

        store.remove(id).await.unwrap();
        assert!(matches!(
            store.read(id, |s| s.id()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(store.remove(id).await.is_err());
    }

    #[tokio::test]
    async fn test_update_mutates_in_place() {
        let store = SessionStore::new();
        let (id, ()) = store.create(|_| ()).await;
        store
            .update(id, |s| s.cost_mut().append(Default::default()).steps().len())
            .await
            .unwrap();
        let steps = store.read(id, |s| s.cost().steps().len()).await.unwrap();
        assert_eq!(steps, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_drops_only_stale_sessions() {
        let store = SessionStore::new();
        let ttl = Duration::from_secs(60);
        let (stale, ()) = store.create(|_| ()).await;
        let (active, ()) = store.create(|_| ()).await;

        tokio::time::advance(Duration::from_secs(40)).await;
        store.update(active, |_| ()).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(store.evict_idle(ttl).await, 1);
        assert!(store.read(stale, |_| ()).await.is_err(), "stale session must be gone");
        assert!(store.read(active, |_| ()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_do_not_extend_lifetime() {
        let store = SessionStore::new();
        let (id, ()) = store.create(|_| ()).await;
        tokio::time::advance(Duration::from_secs(50)).await;
        store.read(id, |_| ()).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(store.evict_idle(Duration::from_secs(60)).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_in_background() {
        let store = SessionStore::new();
        store.create(|_| ()).await;
        let sweeper = store.spawn_sweeper(Duration::from_secs(10), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(store.len().await, 0);
        sweeper.abort();
    }
}
