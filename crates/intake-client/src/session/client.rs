use super::cache::{CachedSession, SessionCache};
use super::state::{SessionEvent, SessionState};
use crate::api::SessionApi;
use intake_core::{new_session_id, parse_session_id, ApiOutcome, SessionId};
use std::sync::Arc;

/// Keeps the client holding a usable session id.
///
/// The cached id is re-validated on load. An absent or tampered id triggers a hard
/// reset: a new id is minted and every piece of state tied to the old one is
/// dropped, visible through [`SessionState::generation`].
pub struct SessionClient {
    api: Arc<dyn SessionApi>,
    cache: Arc<dyn SessionCache>,
    state: SessionState,
}

impl SessionClient {
    pub fn new(api: Arc<dyn SessionApi>, cache: Arc<dyn SessionCache>) -> Self {
        Self {
            api,
            cache,
            state: SessionState::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// Return the id to attach to the next call, validating or minting as needed.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_session(&mut self) -> ApiOutcome<SessionId> {
        if let (Some(id), true) = (self.state.id(), self.state.is_bound()) {
            return ApiOutcome::Ok(id);
        }

        let cached = match self.cache.load().await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session cache");
                None
            }
        };
        let Some(cached) = cached else {
            if self.state.id().is_some() {
                tracing::warn!("Session cache lost, starting a new session");
                return self.reinitialize().await;
            }
            // First visit: nothing was lost, so no reset notice.
            tracing::info!("No cached session, starting a new one");
            return self.mint().await;
        };

        let presented = match parse_session_id(&cached.id) {
            Ok(id) => id,
            Err(_) => {
                tracing::warn!("Cached session id is malformed, starting a new session");
                return self.reinitialize().await;
            }
        };

        let fresh = !cached.confirmed;
        match self.api.validate_uuid(&cached.id, fresh).await {
            ApiOutcome::Ok(accepted) => {
                self.state.apply(SessionEvent::Confirmed(accepted));
                self.persist(accepted, true).await;
                ApiOutcome::Ok(accepted)
            }
            ApiOutcome::CollisionError {
                replacement: Some(replacement),
                ..
            } => {
                tracing::info!(previous = %presented, replacement = %replacement, fresh, "Session id replaced");
                self.state.apply(SessionEvent::Replaced {
                    previous: presented,
                    replacement,
                });
                self.persist(replacement, true).await;
                ApiOutcome::Ok(replacement)
            }
            ApiOutcome::CollisionError {
                replacement: None, ..
            }
            | ApiOutcome::ValidationError { .. } => {
                tracing::warn!(session = %presented, "Server rejected cached session id");
                self.reinitialize().await
            }
            // Keep the cached id; the next load validates it again.
            failure => failure,
        }
    }

    /// Drop the current identity and mint a new one.
    ///
    /// When the server cannot be reached, an id is generated locally and cached
    /// unconfirmed; the transport failure is still returned, and the next
    /// [`ensure_session`](Self::ensure_session) claims the id with `fresh = true`.
    #[tracing::instrument(skip(self))]
    pub async fn reinitialize(&mut self) -> ApiOutcome<SessionId> {
        self.state.reinitialize();
        if let Err(e) = self.cache.clear().await {
            tracing::warn!(error = %e, "Failed to clear session cache");
        }
        self.mint().await
    }

    async fn mint(&mut self) -> ApiOutcome<SessionId> {
        match self.api.generate_uuid().await {
            ApiOutcome::Ok(id) => {
                self.state.apply(SessionEvent::Confirmed(id));
                self.persist(id, true).await;
                ApiOutcome::Ok(id)
            }
            ApiOutcome::TransportError { message } => {
                let id = new_session_id();
                tracing::warn!(session = %id, error = %message, "Server unreachable, using a provisional session id");
                self.state.apply(SessionEvent::Provisional(id));
                self.persist(id, false).await;
                ApiOutcome::TransportError { message }
            }
            failure => failure,
        }
    }

    async fn persist(&self, id: SessionId, confirmed: bool) {
        let cached = CachedSession {
            id: id.to_string(),
            confirmed,
        };
        if let Err(e) = self.cache.store(&cached).await {
            tracing::warn!(session = %id, error = %e, "Failed to write session cache");
        }
    }
}
