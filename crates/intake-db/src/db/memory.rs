use async_trait::async_trait;
use chrono::Utc;
use intake_core::models::{SessionRecord, SessionStatus};
use intake_core::{AppError, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{Completion, IdentityStore, Reservation};

/// Process-local identity store.
///
/// Used with `IDENTITY_STORE=memory` and in tests. Reservations are atomic because
/// the check and the insert happen under one lock.
#[derive(Clone, Default)]
pub struct MemoryIdentityStore {
    sessions: Arc<Mutex<HashMap<Uuid, SessionRecord>>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a row directly.
    pub async fn seed(&self, id: SessionId, status: SessionStatus) {
        let now = Utc::now();
        let record = SessionRecord {
            id: id.as_uuid(),
            status,
            created_at: now,
            updated_at: now,
            completed_at: (status == SessionStatus::Complete).then_some(now),
        };
        self.sessions.lock().await.insert(id.as_uuid(), record);
    }

    /// Drop a row, as external housekeeping would for an abandoned reservation.
    pub async fn evict(&self, id: SessionId) -> bool {
        self.sessions.lock().await.remove(&id.as_uuid()).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn status(&self, id: SessionId) -> Result<Option<SessionStatus>, AppError> {
        Ok(self
            .sessions
            .lock()
            .await
            .get(&id.as_uuid())
            .map(|record| record.status))
    }

    async fn reserve(&self, id: SessionId) -> Result<Reservation, AppError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&id.as_uuid()) {
            return Ok(Reservation::Duplicate);
        }
        let now = Utc::now();
        sessions.insert(
            id.as_uuid(),
            SessionRecord {
                id: id.as_uuid(),
                status: SessionStatus::Reserved,
                created_at: now,
                updated_at: now,
                completed_at: None,
            },
        );
        Ok(Reservation::Reserved)
    }

    async fn complete(&self, id: SessionId) -> Result<Completion, AppError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&id.as_uuid()) {
            None => Ok(Completion::Unknown),
            Some(record) if record.status == SessionStatus::Complete => {
                Ok(Completion::AlreadyComplete)
            }
            Some(record) => {
                let now = Utc::now();
                record.status = SessionStatus::Complete;
                record.updated_at = now;
                record.completed_at = Some(now);
                Ok(Completion::Completed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::new_session_id;

    #[tokio::test]
    async fn reserve_is_exclusive() {
        let store = MemoryIdentityStore::new();
        let id = new_session_id();

        assert_eq!(store.reserve(id).await.unwrap(), Reservation::Reserved);
        assert_eq!(store.reserve(id).await.unwrap(), Reservation::Duplicate);
        assert!(store.exists(id).await.unwrap());
        assert_eq!(
            store.status(id).await.unwrap(),
            Some(SessionStatus::Reserved)
        );
    }

    #[tokio::test]
    async fn concurrent_reserves_of_one_id_admit_exactly_one() {
        let store = MemoryIdentityStore::new();
        let id = new_session_id();

        let attempts = (0..16).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.reserve(id).await.unwrap() })
        });
        let results = futures::future::join_all(attempts).await;

        let reserved = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Reservation::Reserved)))
            .count();
        assert_eq!(reserved, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn complete_transitions_once() {
        let store = MemoryIdentityStore::new();
        let id = new_session_id();

        assert_eq!(store.complete(id).await.unwrap(), Completion::Unknown);

        store.reserve(id).await.unwrap();
        assert_eq!(store.complete(id).await.unwrap(), Completion::Completed);
        assert_eq!(
            store.complete(id).await.unwrap(),
            Completion::AlreadyComplete
        );
        assert_eq!(
            store.status(id).await.unwrap(),
            Some(SessionStatus::Complete)
        );
    }

    #[tokio::test]
    async fn evicted_ids_can_be_reserved_again() {
        let store = MemoryIdentityStore::new();
        let id = new_session_id();
        store.seed(id, SessionStatus::Reserved).await;

        assert!(store.evict(id).await);
        assert!(!store.exists(id).await.unwrap());
        assert_eq!(store.reserve(id).await.unwrap(), Reservation::Reserved);
    }
}
