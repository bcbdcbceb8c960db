//! Server side of the upload step.
//!
//! The client orchestrator applies the same policy before sending anything; this
//! service re-checks it because the client is unauthenticated.

use super::with_timeout;
use crate::error::storage_error;
use bytes::Bytes;
use intake_core::models::{DeleteFileRequest, SessionStatus, UploadedFile};
use intake_core::{
    parse_session_id, stored_file_name, AppError, FileRejection, SessionId, UploadPolicy,
};
use intake_db::IdentityStore;
use intake_storage::{keys, Storage};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// One `file` part of an upload request.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

pub struct UploadService {
    store: Arc<dyn IdentityStore>,
    storage: Arc<dyn Storage>,
    policy: UploadPolicy,
    store_timeout: Duration,
    storage_timeout: Duration,
}

impl UploadService {
    pub fn new(store: Arc<dyn IdentityStore>, storage: Arc<dyn Storage>) -> Self {
        Self {
            store,
            storage,
            policy: UploadPolicy::default(),
            store_timeout: Duration::from_secs(5),
            storage_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeouts(mut self, store: Duration, storage: Duration) -> Self {
        self.store_timeout = store;
        self.storage_timeout = storage;
        self
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Uploads require a live reservation. Completed sessions are frozen and reclaimed
    /// ones must be re-validated first.
    async fn require_reserved(&self, session_id: SessionId) -> Result<(), AppError> {
        let status = with_timeout(
            self.store_timeout,
            "identity store lookup",
            self.store.status(session_id),
        )
        .await?;

        match status {
            Some(SessionStatus::Reserved) => Ok(()),
            Some(SessionStatus::Complete) => Err(AppError::SessionConflict(
                "Session is already complete".to_string(),
            )),
            None => Err(AppError::SessionConflict(
                "Session is not active, validate it first".to_string(),
            )),
        }
    }

    /// Store a batch of files under the session namespace.
    ///
    /// The whole request is refused if any file breaks the policy or the session
    /// would end up holding more than the allowed number of files. Re-uploading a
    /// name already stored replaces it and does not count twice.
    #[tracing::instrument(skip(self, files), fields(file_count = files.len()))]
    pub async fn upload(
        &self,
        session: &str,
        files: Vec<IncomingFile>,
    ) -> Result<Vec<UploadedFile>, AppError> {
        let session_id = parse_session_id(session)?;

        if files.is_empty() {
            return Err(AppError::InvalidInput("No file provided".to_string()));
        }
        self.policy.check_count(0, files.len())?;

        let mut names = HashSet::new();
        let mut prepared = Vec::with_capacity(files.len());
        for file in files {
            self.policy
                .check_file(&file.content_type, file.data.len() as u64)?;
            let stored_name = stored_file_name(&file.name)?;
            if !names.insert(stored_name.clone()) {
                return Err(FileRejection::DuplicateName { stored_name }.into());
            }
            let key = keys::object_key(&session_id, &stored_name);
            prepared.push((file, key));
        }

        self.require_reserved(session_id).await?;

        let prefix = keys::session_prefix(&session_id);
        let existing = with_timeout(self.storage_timeout, "storage list", async {
            self.storage.list(&prefix).await.map_err(storage_error)
        })
        .await?;
        let kept = existing
            .iter()
            .filter(|key| keys::key_belongs_to_session(key, &session_id))
            .filter(|key| !names.contains(keys::file_name_of(key)))
            .count();
        self.policy.check_count(kept, prepared.len())?;

        let puts = prepared.into_iter().map(|(file, key)| async move {
            let IncomingFile { name, data, .. } = file;
            let size = data.len() as u64;
            let url = with_timeout(self.storage_timeout, "storage put", async {
                self.storage
                    .put(&key, data, &self.policy.accepted_content_type)
                    .await
                    .map_err(storage_error)
            })
            .await?;
            Ok::<_, AppError>(UploadedFile {
                name,
                url,
                key,
                size,
            })
        });
        let uploaded = futures::future::try_join_all(puts).await?;

        tracing::info!(
            session_id = %session_id,
            files = uploaded.len(),
            "Files uploaded"
        );
        Ok(uploaded)
    }

    /// Remove one object. The key (given directly or recovered from its URL) must lie
    /// inside the presented session's namespace.
    #[tracing::instrument(skip(self, request), fields(session_id = %request.session_id))]
    pub async fn delete(&self, request: &DeleteFileRequest) -> Result<String, AppError> {
        let session_id = parse_session_id(&request.session_id)?;

        let key = match (&request.key, &request.url) {
            (Some(key), _) => key.clone(),
            (None, Some(url)) => self.storage.key_from_url(url).ok_or_else(|| {
                AppError::InvalidInput("URL does not point to an uploaded file".to_string())
            })?,
            (None, None) => {
                return Err(AppError::InvalidInput(
                    "Either key or url is required".to_string(),
                ))
            }
        };

        if !keys::key_belongs_to_session(&key, &session_id) {
            return Err(AppError::InvalidInput(
                "File does not belong to this session".to_string(),
            ));
        }

        with_timeout(self.storage_timeout, "storage delete", async {
            self.storage.delete(&key).await.map_err(storage_error)
        })
        .await?;

        tracing::info!(key = %key, "File deleted");
        Ok(key)
    }
}
