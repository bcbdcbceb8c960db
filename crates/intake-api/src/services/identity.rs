//! Session identity lifecycle: mint, validate, complete and post-collision migration.
//!
//! The identity store's atomic reserve is the only mutual exclusion relied on. Two
//! concurrent mints that draw the same candidate cannot both win the insert, and the
//! loser simply draws again.

use super::notifier::{CompletionNotifier, LogNotifier};
use super::with_timeout;
use crate::error::storage_error;
use intake_core::config::MINT_MAX_ATTEMPTS;
use intake_core::models::SessionStatus;
use intake_core::{new_session_id, parse_session_id, AppError, SessionId};
use intake_db::{Completion, IdentityStore, Reservation};
use intake_storage::{keys, Storage};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of candidate ids. Injectable so collisions can be forced in tests.
pub type IdGenerator = Arc<dyn Fn() -> SessionId + Send + Sync>;

/// Verdict on a presented session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Valid(SessionId),
    /// The id is owned by another session; `replacement` is already reserved.
    Collision {
        previous: SessionId,
        replacement: SessionId,
    },
    /// Not a canonical id. Decided locally, without touching the store.
    Malformed,
}

/// Outcome of copying one session's objects into another namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub copied: usize,
    pub failed: usize,
}

pub struct SessionIdentityManager {
    store: Arc<dyn IdentityStore>,
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn CompletionNotifier>,
    generator: IdGenerator,
    max_attempts: u32,
    store_timeout: Duration,
    storage_timeout: Duration,
}

impl SessionIdentityManager {
    pub fn new(store: Arc<dyn IdentityStore>, storage: Arc<dyn Storage>) -> Self {
        Self {
            store,
            storage,
            notifier: Arc::new(LogNotifier),
            generator: Arc::new(new_session_id),
            max_attempts: MINT_MAX_ATTEMPTS,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    pub fn with_generator(mut self, generator: IdGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn CompletionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Attempts per mint, clamped to `1..=MINT_MAX_ATTEMPTS`.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.clamp(1, MINT_MAX_ATTEMPTS);
        self
    }

    pub fn with_timeouts(mut self, store: Duration, storage: Duration) -> Self {
        self.store_timeout = store;
        self.storage_timeout = storage;
        self
    }

    async fn reserve(&self, id: SessionId) -> Result<Reservation, AppError> {
        with_timeout(self.store_timeout, "identity store reserve", self.store.reserve(id)).await
    }

    async fn status(&self, id: SessionId) -> Result<Option<SessionStatus>, AppError> {
        with_timeout(self.store_timeout, "identity store lookup", self.store.status(id)).await
    }

    /// Reserve a brand new id. Never returns an id the store did not accept.
    #[tracing::instrument(skip(self))]
    pub async fn mint(&self) -> Result<SessionId, AppError> {
        for attempt in 1..=self.max_attempts {
            let candidate = (self.generator)();
            match self.reserve(candidate).await? {
                Reservation::Reserved => {
                    tracing::info!(session_id = %candidate, attempt, "Session id reserved");
                    return Ok(candidate);
                }
                Reservation::Duplicate => {
                    tracing::warn!(
                        session_id = %candidate,
                        attempt,
                        "Session id candidate already taken"
                    );
                }
            }
        }

        tracing::error!(
            attempts = self.max_attempts,
            "Exhausted session id attempts"
        );
        Err(AppError::IdentityExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Check a presented id.
    ///
    /// `fresh` ids were generated by the client and never accepted by the server, so
    /// any existing row means someone else owns them. Non-fresh ids were issued
    /// earlier: a reserved row is theirs, a reclaimed row is re-reserved, and a
    /// completed row belongs to a finished onboarding.
    #[tracing::instrument(skip(self))]
    pub async fn validate(&self, presented: &str, fresh: bool) -> Result<Validation, AppError> {
        let id = match parse_session_id(presented) {
            Ok(id) => id,
            Err(_) => {
                tracing::debug!("Rejected malformed session id");
                return Ok(Validation::Malformed);
            }
        };

        let owned = match (fresh, self.status(id).await?) {
            (false, Some(SessionStatus::Reserved)) => true,
            (false, Some(SessionStatus::Complete)) | (true, Some(_)) => false,
            (_, None) => match self.reserve(id).await? {
                Reservation::Reserved => true,
                // Lost a race for the same id. Only a non-fresh client can still own it.
                Reservation::Duplicate => {
                    !fresh && self.status(id).await? == Some(SessionStatus::Reserved)
                }
            },
        };

        if owned {
            return Ok(Validation::Valid(id));
        }

        let replacement = self.mint().await?;
        tracing::warn!(
            previous = %id,
            replacement = %replacement,
            fresh,
            "Session id collision, issued replacement"
        );

        // A fresh id never had a reserved row of its own, so it owns no objects.
        if !fresh {
            self.spawn_migration(id, replacement);
        }

        Ok(Validation::Collision {
            previous: id,
            replacement,
        })
    }

    fn spawn_migration(&self, from: SessionId, to: SessionId) {
        let storage = self.storage.clone();
        let timeout = self.storage_timeout;
        let span = tracing::info_span!("session_migration", from = %from, to = %to);
        tokio::spawn(
            async move {
                migrate_session(storage.as_ref(), from, to, timeout).await;
            }
            .instrument(span),
        );
    }

    /// Hand-off from the verification service: `reserved -> complete`.
    #[tracing::instrument(skip(self))]
    pub async fn complete(&self, presented: &str) -> Result<(SessionId, Completion), AppError> {
        let id = parse_session_id(presented)?;
        let completion =
            with_timeout(self.store_timeout, "identity store complete", self.store.complete(id))
                .await?;

        if completion == Completion::Completed {
            if let Err(e) = self.notifier.session_completed(id).await {
                tracing::error!(session_id = %id, error = %e, "Completion notification failed");
            }
        }

        Ok((id, completion))
    }
}

/// Copy every object of `from` into the namespace of `to`.
///
/// Best effort: failures are logged and counted, never retried. Originals are left in
/// place because the old session row still exists.
pub async fn migrate_session(
    storage: &dyn Storage,
    from: SessionId,
    to: SessionId,
    timeout: Duration,
) -> MigrationReport {
    let prefix = keys::session_prefix(&from);
    let listed = with_timeout(timeout, "storage list", async {
        storage.list(&prefix).await.map_err(storage_error)
    })
    .await;

    let objects = match listed {
        Ok(objects) => objects,
        Err(e) => {
            tracing::warn!(error = %e, prefix = %prefix, "Could not list objects to migrate");
            return MigrationReport::default();
        }
    };

    let mut report = MigrationReport::default();
    for key in objects
        .iter()
        .filter(|key| keys::key_belongs_to_session(key, &from))
    {
        let target = keys::rebase_key(key, &to);
        let copied = with_timeout(timeout, "storage copy", async {
            storage.copy(key, &target).await.map_err(storage_error)
        })
        .await;

        match copied {
            Ok(_) => report.copied += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(error = %e, from_key = %key, to_key = %target, "Object migration failed");
            }
        }
    }

    tracing::info!(
        copied = report.copied,
        failed = report.failed,
        "Session objects migrated"
    );
    report
}
