//! Concurrent upload of up to three files for one session.
//!
//! Each accepted file gets its own tokio task. Tasks only talk to each other
//! through the shared [`BatchState`], which is updated one event at a time under a
//! lock, and every applied event is re-published on a broadcast channel for the
//! caller.

use super::state::{BatchEvent, BatchState, FileSummary, FileUploadTask, TaskId, TaskState};
use super::transport::{ProgressFn, SelectedFile, TransferError, Transport};
use intake_core::{stored_file_name, FileRejection, SessionId, UploadPolicy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Rejected(#[from] FileRejection),

    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    #[error("task {0} can only be retried after a failed transfer")]
    NotRetryable(TaskId),
}

impl BatchError {
    pub fn user_message(&self) -> String {
        match self {
            BatchError::Rejected(rejection) => rejection.to_string(),
            BatchError::UnknownTask(_) | BatchError::NotRetryable(_) => self.to_string(),
        }
    }
}

/// Bytes and cancellation handle of an accepted file. Locally rejected files never
/// get one.
struct Pending {
    file: SelectedFile,
    cancel: CancellationToken,
}

struct Inner {
    transport: Arc<dyn Transport>,
    policy: UploadPolicy,
    timeout: Duration,
    state: Mutex<BatchState>,
    pending: Mutex<HashMap<TaskId, Pending>>,
    events: broadcast::Sender<BatchEvent>,
    next_id: AtomicU64,
    transfers: TaskTracker,
}

#[derive(Clone)]
pub struct UploadOrchestrator {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (sent.min(total) * 100 / total) as u8
}

impl UploadOrchestrator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_settings(transport, UploadPolicy::default(), DEFAULT_TRANSFER_TIMEOUT)
    }

    /// `timeout` bounds each transfer and each remote deletion.
    pub fn with_settings(
        transport: Arc<dyn Transport>,
        policy: UploadPolicy,
        timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                transport,
                policy,
                timeout,
                state: Mutex::new(BatchState::new()),
                pending: Mutex::new(HashMap::new()),
                events,
                next_id: AtomicU64::new(1),
                transfers: TaskTracker::new(),
            }),
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.inner.policy
    }

    /// Every applied [`BatchEvent`], in the order it hit the state.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.inner.events.subscribe()
    }

    pub fn tasks(&self) -> Vec<FileUploadTask> {
        lock(&self.inner.state).tasks().to_vec()
    }

    pub fn task(&self, id: TaskId) -> Option<FileUploadTask> {
        lock(&self.inner.state).get(id).cloned()
    }

    /// True once at least one file is transferred.
    pub fn is_ready_to_advance(&self) -> bool {
        lock(&self.inner.state).is_ready_to_advance()
    }

    /// Add files to the batch and start their transfers.
    ///
    /// The whole call is refused when the files would not fit next to the ones
    /// already queued, transferring or transferred. Otherwise every file gets a task:
    /// files with the wrong type or size, or whose stored name is already held by a
    /// live task, are `failed` right away and never reach the transport. A batch
    /// bound to another session is discarded first.
    pub fn enqueue(
        &self,
        session: SessionId,
        files: Vec<SelectedFile>,
    ) -> Result<Vec<TaskId>, BatchError> {
        let inner = &self.inner;
        let mut accepted = Vec::new();
        let mut ids = Vec::with_capacity(files.len());

        {
            let mut state = lock(&inner.state);

            let bound = state.tasks().first().map(|t| t.session);
            if bound.is_some_and(|bound| bound != session) {
                tracing::info!(session = %session, "Session changed, discarding upload batch");
                inner.discard_locked(&mut state);
            }

            inner.policy.check_count(state.occupied(), files.len())?;

            for file in files {
                let task = TaskId(inner.next_id.fetch_add(1, Ordering::Relaxed));
                let summary = FileSummary {
                    name: file.name.clone(),
                    size: file.size(),
                    declared_type: file.content_type.clone(),
                };

                let verdict = inner
                    .policy
                    .check_file(&file.content_type, file.size())
                    .and_then(|()| stored_file_name(&file.name))
                    .and_then(|stored_name| {
                        if state.holds_stored_name(&stored_name, None) {
                            Err(FileRejection::DuplicateName { stored_name })
                        } else {
                            Ok(())
                        }
                    });

                match verdict {
                    Ok(()) => {
                        inner.dispatch_locked(
                            &mut state,
                            BatchEvent::Enqueued {
                                task,
                                session,
                                file: summary,
                            },
                        );
                        lock(&inner.pending).insert(
                            task,
                            Pending {
                                file,
                                cancel: CancellationToken::new(),
                            },
                        );
                        accepted.push(task);
                    }
                    Err(rejection) => {
                        tracing::debug!(task = %task, name = %summary.name, reason = %rejection, "File rejected");
                        inner.dispatch_locked(
                            &mut state,
                            BatchEvent::Rejected {
                                task,
                                session,
                                file: summary,
                                reason: rejection.to_string(),
                            },
                        );
                    }
                }
                ids.push(task);
            }
        }

        for task in accepted {
            self.spawn_transfer(task, 1, session);
        }
        Ok(ids)
    }

    /// Start a new attempt for a task whose transfer failed.
    pub fn retry(&self, task: TaskId) -> Result<(), BatchError> {
        let inner = &self.inner;
        let (attempt, session) = {
            let mut state = lock(&inner.state);
            let current = state.get(task).ok_or(BatchError::UnknownTask(task))?;
            if current.state != TaskState::Failed || !lock(&inner.pending).contains_key(&task) {
                return Err(BatchError::NotRetryable(task));
            }
            let stored_name = stored_file_name(&current.name)?;
            if state.holds_stored_name(&stored_name, Some(task)) {
                return Err(FileRejection::DuplicateName { stored_name }.into());
            }
            let (attempt, session) = (current.attempt + 1, current.session);

            inner.policy.check_count(state.occupied(), 1)?;
            inner.dispatch_locked(&mut state, BatchEvent::Requeued { task, attempt });
            (attempt, session)
        };

        tracing::info!(task = %task, attempt, "Retrying upload");
        self.spawn_transfer(task, attempt, session);
        Ok(())
    }

    /// Drop a task in any state.
    ///
    /// A transferred file is deleted remotely and deletion failures are logged without
    /// failing the removal. A running transfer is cancelled; if it still completes,
    /// its result is dropped.
    pub async fn remove(&self, task: TaskId) -> Result<(), BatchError> {
        let inner = &self.inner;
        let removed = {
            let mut state = lock(&inner.state);
            let removed = state.get(task).cloned().ok_or(BatchError::UnknownTask(task))?;
            inner.dispatch_locked(&mut state, BatchEvent::Removed { task });
            removed
        };

        if let Some(pending) = lock(&inner.pending).remove(&task) {
            pending.cancel.cancel();
        }

        if let (TaskState::Transferred, Some(key)) = (removed.state, removed.remote_key.as_deref())
        {
            inner.delete_quietly(removed.session, key).await;
        }
        Ok(())
    }

    /// Drop every task, e.g. after a session reset. Stored files are left alone.
    pub fn discard(&self) {
        let mut state = lock(&self.inner.state);
        self.inner.discard_locked(&mut state);
    }

    /// Wait until every transfer started so far has finished.
    pub async fn settle(&self) {
        let transfers = &self.inner.transfers;
        transfers.close();
        transfers.wait().await;
        transfers.reopen();
    }

    fn spawn_transfer(&self, task: TaskId, attempt: u32, session: SessionId) {
        let inner = self.inner.clone();
        self.inner
            .transfers
            .spawn(async move { inner.run_transfer(task, attempt, session).await });
    }
}

impl Inner {
    /// Apply an event and publish it if it changed the state. Publishing under the
    /// state lock keeps subscribers in the same order as the reducer.
    fn dispatch_locked(&self, state: &mut BatchState, event: BatchEvent) -> bool {
        let applied = state.apply(&event);
        if applied {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        applied
    }

    fn dispatch(&self, event: BatchEvent) -> bool {
        let mut state = lock(&self.state);
        self.dispatch_locked(&mut state, event)
    }

    fn discard_locked(&self, state: &mut BatchState) {
        for (_, pending) in lock(&self.pending).drain() {
            pending.cancel.cancel();
        }
        self.dispatch_locked(state, BatchEvent::Discarded);
    }

    async fn run_transfer(self: Arc<Self>, task: TaskId, attempt: u32, session: SessionId) {
        let (file, cancel) = match lock(&self.pending).get(&task) {
            Some(pending) => (pending.file.clone(), pending.cancel.clone()),
            None => return,
        };
        if cancel.is_cancelled() || !self.dispatch(BatchEvent::Started { task, attempt }) {
            return;
        }

        let progress: ProgressFn = {
            let inner = self.clone();
            let cancel = cancel.clone();
            let last = AtomicU8::new(0);
            Arc::new(move |sent, total| {
                let percent = percent_of(sent, total);
                if cancel.is_cancelled() || last.fetch_max(percent, Ordering::Relaxed) >= percent {
                    return;
                }
                inner.dispatch(BatchEvent::Progress {
                    task,
                    attempt,
                    percent,
                });
            })
        };

        let result = match tokio::time::timeout(
            self.timeout,
            self.transport.transfer(session, &file, progress),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransferError::Timeout),
        };

        match result {
            Ok(uploaded) => {
                let key = uploaded.key.clone();
                let applied = self.dispatch(BatchEvent::Transferred {
                    task,
                    attempt,
                    file: uploaded,
                });
                if applied {
                    lock(&self.pending).remove(&task);
                    tracing::info!(task = %task, attempt, key = %key, "File transferred");
                } else {
                    // Removed or discarded while the bytes were in flight. The key may
                    // already belong to a newer task with the same name.
                    tracing::info!(task = %task, key = %key, "Dropping late upload result");
                }
            }
            Err(e) => {
                tracing::warn!(task = %task, attempt, name = %file.name, error = %e, "File transfer failed");
                self.dispatch(BatchEvent::Failed {
                    task,
                    attempt,
                    error: e.user_message(),
                });
            }
        }
    }

    async fn delete_quietly(&self, session: SessionId, key: &str) {
        let outcome =
            tokio::time::timeout(self.timeout, self.transport.delete(session, key)).await;
        match outcome {
            Ok(Ok(())) => tracing::debug!(key = %key, "Remote file deleted"),
            Ok(Err(e)) => tracing::warn!(key = %key, error = %e, "Failed to delete remote file"),
            Err(_) => tracing::warn!(key = %key, "Timed out deleting remote file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use intake_core::models::UploadedFile;
    use intake_core::new_session_id;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tokio::sync::Semaphore;

    /// Scripted transport. Files named `fail-*` fail until `heal` is called; files
    /// named `slow-*` or whose bytes end in `hold` wait for `release`. Keys of
    /// stored objects are kept in `stored`.
    struct MockTransport {
        transfers: AtomicUsize,
        stored: Mutex<HashSet<String>>,
        deletes: Mutex<Vec<String>>,
        fail_deletes: bool,
        healed: AtomicBool,
        gate: Semaphore,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                transfers: AtomicUsize::new(0),
                stored: Mutex::new(HashSet::new()),
                deletes: Mutex::new(Vec::new()),
                fail_deletes: false,
                healed: AtomicBool::new(false),
                gate: Semaphore::new(0),
            }
        }

        fn failing_deletes() -> Self {
            Self {
                fail_deletes: true,
                ..Self::new()
            }
        }

        fn release(&self) {
            self.gate.add_permits(64);
        }

        fn heal(&self) {
            self.healed.store(true, Ordering::SeqCst);
        }

        fn deleted(&self) -> Vec<String> {
            self.deletes.lock().unwrap().clone()
        }

        fn holds(&self, key: &str) -> bool {
            self.stored.lock().unwrap().contains(key)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn transfer(
            &self,
            session: SessionId,
            file: &SelectedFile,
            progress: ProgressFn,
        ) -> Result<UploadedFile, TransferError> {
            self.transfers.fetch_add(1, Ordering::SeqCst);
            if file.name.starts_with("slow-") || file.data.ends_with(b"hold") {
                let _permit = self.gate.acquire().await;
            }
            if file.name.starts_with("fail-") && !self.healed.load(Ordering::SeqCst) {
                return Err(TransferError::Network("connection reset".to_string()));
            }
            let total = file.size();
            progress(total / 2, total);
            progress(total, total);

            let key = format!("uploads/{}/{}", session, stored_file_name(&file.name).unwrap());
            self.stored.lock().unwrap().insert(key.clone());
            Ok(UploadedFile {
                name: file.name.clone(),
                url: format!("http://localhost:3000/files/{}", key),
                key,
                size: total,
            })
        }

        async fn delete(&self, _session: SessionId, remote_key: &str) -> Result<(), TransferError> {
            self.deletes.lock().unwrap().push(remote_key.to_string());
            self.stored.lock().unwrap().remove(remote_key);
            if self.fail_deletes {
                return Err(TransferError::Server("500: boom".to_string()));
            }
            Ok(())
        }
    }

    fn pdf(name: &str, size: usize) -> SelectedFile {
        SelectedFile::new(name, "application/pdf", Bytes::from(vec![b'%'; size]))
    }

    fn orchestrator(transport: &Arc<MockTransport>) -> UploadOrchestrator {
        UploadOrchestrator::new(transport.clone())
    }

    #[tokio::test]
    async fn pdf_is_transferred_then_text_file_fails_locally() {
        let transport = Arc::new(MockTransport::new());
        let uploads = orchestrator(&transport);
        let session = new_session_id();

        let ids = uploads
            .enqueue(session, vec![pdf("cv.pdf", 2 * 1024 * 1024)])
            .unwrap();
        uploads.settle().await;

        let cv = uploads.task(ids[0]).unwrap();
        assert_eq!(cv.state, TaskState::Transferred);
        assert_eq!(cv.progress_percent, 100);
        assert_eq!(
            cv.remote_key.as_deref(),
            Some(format!("uploads/{}/cv.pdf", session).as_str())
        );
        assert!(uploads.is_ready_to_advance());

        let text = SelectedFile::new("notes.txt", "text/plain", Bytes::from_static(b"hi"));
        let ids = uploads.enqueue(session, vec![text]).unwrap();
        uploads.settle().await;

        let notes = uploads.task(ids[0]).unwrap();
        assert_eq!(notes.state, TaskState::Failed);
        assert_eq!(notes.last_error.as_deref(), Some("unsupported file type"));
        assert_eq!(transport.transfers.load(Ordering::SeqCst), 1);
        assert!(uploads.is_ready_to_advance());
    }

    #[tokio::test]
    async fn invalid_files_never_reach_transport() {
        let transport = Arc::new(MockTransport::new());
        let uploads = orchestrator(&transport);

        let ids = uploads
            .enqueue(
                new_session_id(),
                vec![
                    SelectedFile::new("photo.png", "image/png", Bytes::from_static(b"png")),
                    pdf("huge.pdf", 5_242_881),
                ],
            )
            .unwrap();
        uploads.settle().await;

        let errors: Vec<_> = ids
            .iter()
            .map(|id| uploads.task(*id).unwrap().last_error.unwrap())
            .collect();
        assert_eq!(errors, vec!["unsupported file type", "file too large"]);
        assert_eq!(transport.transfers.load(Ordering::SeqCst), 0);
        assert!(!uploads.is_ready_to_advance());
    }

    #[tokio::test]
    async fn fourth_file_is_refused() {
        let transport = Arc::new(MockTransport::new());
        let uploads = orchestrator(&transport);
        let session = new_session_id();

        let err = uploads
            .enqueue(
                session,
                vec![pdf("a.pdf", 1), pdf("b.pdf", 1), pdf("c.pdf", 1), pdf("d.pdf", 1)],
            )
            .unwrap_err();
        assert_eq!(err.user_message(), "only 3 files allowed");
        assert!(uploads.tasks().is_empty());

        uploads
            .enqueue(session, vec![pdf("a.pdf", 1), pdf("slow-b.pdf", 1), pdf("c.pdf", 1)])
            .unwrap();
        let err = uploads.enqueue(session, vec![pdf("d.pdf", 1)]).unwrap_err();
        assert_eq!(err.user_message(), "only 3 files allowed");

        transport.release();
        uploads.settle().await;
        assert_eq!(transport.transfers.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_recovers_without_touching_siblings() {
        let transport = Arc::new(MockTransport::new());
        let uploads = orchestrator(&transport);
        let session = new_session_id();

        let ids = uploads
            .enqueue(session, vec![pdf("ok.pdf", 10), pdf("fail-net.pdf", 10)])
            .unwrap();
        uploads.settle().await;

        let failed = uploads.task(ids[1]).unwrap();
        assert_eq!(failed.state, TaskState::Failed);
        assert_eq!(
            failed.last_error.as_deref(),
            Some("network error — retry available")
        );
        let sibling_before = uploads.task(ids[0]).unwrap();

        transport.heal();
        uploads.retry(ids[1]).unwrap();
        uploads.settle().await;

        let retried = uploads.task(ids[1]).unwrap();
        assert_eq!(retried.state, TaskState::Transferred);
        assert_eq!(retried.attempt, 2);
        assert!(retried.last_error.is_none());
        assert_eq!(uploads.task(ids[0]).unwrap(), sibling_before);
    }

    #[tokio::test]
    async fn only_failed_tasks_can_be_retried() {
        let transport = Arc::new(MockTransport::new());
        let uploads = orchestrator(&transport);
        let session = new_session_id();

        let ids = uploads
            .enqueue(
                session,
                vec![
                    pdf("ok.pdf", 10),
                    SelectedFile::new("a.txt", "text/plain", Bytes::from_static(b"x")),
                ],
            )
            .unwrap();
        uploads.settle().await;

        assert_eq!(uploads.retry(ids[0]), Err(BatchError::NotRetryable(ids[0])));
        // Locally rejected files stay rejected.
        assert_eq!(uploads.retry(ids[1]), Err(BatchError::NotRetryable(ids[1])));
        assert_eq!(
            uploads.retry(TaskId(999)),
            Err(BatchError::UnknownTask(TaskId(999)))
        );
    }

    #[tokio::test]
    async fn removing_transferred_file_deletes_even_when_delete_fails() {
        let transport = Arc::new(MockTransport::failing_deletes());
        let uploads = orchestrator(&transport);
        let session = new_session_id();

        let ids = uploads.enqueue(session, vec![pdf("cv.pdf", 10)]).unwrap();
        uploads.settle().await;

        uploads.remove(ids[0]).await.unwrap();
        assert!(uploads.tasks().is_empty());
        assert_eq!(
            transport.deleted(),
            vec![format!("uploads/{}/cv.pdf", session)]
        );
        assert!(!uploads.is_ready_to_advance());
    }

    #[tokio::test]
    async fn removing_failed_file_issues_no_delete() {
        let transport = Arc::new(MockTransport::new());
        let uploads = orchestrator(&transport);

        let ids = uploads
            .enqueue(new_session_id(), vec![pdf("fail-x.pdf", 10)])
            .unwrap();
        uploads.settle().await;

        uploads.remove(ids[0]).await.unwrap();
        assert!(transport.deleted().is_empty());
        assert_eq!(
            uploads.remove(ids[0]).await,
            Err(BatchError::UnknownTask(ids[0]))
        );
    }

    #[tokio::test]
    async fn removal_during_transfer_discards_late_completion() {
        let transport = Arc::new(MockTransport::new());
        let uploads = orchestrator(&transport);
        let session = new_session_id();
        let mut events = uploads.subscribe();

        let ids = uploads.enqueue(session, vec![pdf("slow-cv.pdf", 10)]).unwrap();
        loop {
            if let BatchEvent::Started { .. } = events.recv().await.unwrap() {
                break;
            }
        }
        assert_eq!(uploads.task(ids[0]).unwrap().state, TaskState::Transferring);

        uploads.remove(ids[0]).await.unwrap();
        transport.release();
        uploads.settle().await;

        assert!(uploads.tasks().is_empty());
        assert!(transport.deleted().is_empty());
        assert!(transport.holds(&format!("uploads/{}/slow-cv.pdf", session)));
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, BatchEvent::Transferred { .. }));
        }
    }

    #[tokio::test]
    async fn late_completion_leaves_readded_file_in_place() {
        let transport = Arc::new(MockTransport::new());
        let uploads = orchestrator(&transport);
        let session = new_session_id();
        let mut events = uploads.subscribe();

        let held = SelectedFile::new("cv.pdf", "application/pdf", Bytes::from_static(b"%PDF-hold"));
        let first = uploads.enqueue(session, vec![held]).unwrap()[0];
        loop {
            if let BatchEvent::Started { task, .. } = events.recv().await.unwrap() {
                if task == first {
                    break;
                }
            }
        }
        uploads.remove(first).await.unwrap();

        let second = uploads.enqueue(session, vec![pdf("cv.pdf", 10)]).unwrap()[0];
        loop {
            if let BatchEvent::Transferred { task, .. } = events.recv().await.unwrap() {
                if task == second {
                    break;
                }
            }
        }

        transport.release();
        uploads.settle().await;

        let key = format!("uploads/{}/cv.pdf", session);
        let readded = uploads.task(second).unwrap();
        assert_eq!(readded.state, TaskState::Transferred);
        assert_eq!(readded.remote_key.as_deref(), Some(key.as_str()));
        assert!(transport.holds(&key));
        assert!(transport.deleted().is_empty());
        assert_eq!(uploads.tasks().len(), 1);
    }

    #[tokio::test]
    async fn files_sharing_a_stored_name_get_one_task_each() {
        let transport = Arc::new(MockTransport::new());
        let uploads = orchestrator(&transport);
        let session = new_session_id();

        let ids = uploads
            .enqueue(session, vec![pdf("my cv.pdf", 10), pdf("my_cv.pdf", 10)])
            .unwrap();
        uploads.settle().await;

        assert_eq!(uploads.task(ids[0]).unwrap().state, TaskState::Transferred);
        let clash = uploads.task(ids[1]).unwrap();
        assert_eq!(clash.state, TaskState::Failed);
        assert_eq!(
            clash.last_error.as_deref(),
            Some("a file with this name is already added")
        );
        assert_eq!(transport.transfers.load(Ordering::SeqCst), 1);

        // Once the first one is gone the name is free again.
        uploads.remove(ids[0]).await.unwrap();
        let key = format!("uploads/{}/my_cv.pdf", session);
        assert!(!transport.holds(&key));
        let again = uploads.enqueue(session, vec![pdf("my_cv.pdf", 10)]).unwrap()[0];
        uploads.settle().await;
        assert_eq!(uploads.task(again).unwrap().state, TaskState::Transferred);
        assert!(transport.holds(&key));
    }

    #[tokio::test]
    async fn retry_refuses_a_name_taken_in_the_meantime() {
        let transport = Arc::new(MockTransport::new());
        let uploads = orchestrator(&transport);
        let session = new_session_id();

        let failed = uploads.enqueue(session, vec![pdf("fail-cv.pdf", 10)]).unwrap()[0];
        uploads.settle().await;
        assert_eq!(uploads.task(failed).unwrap().state, TaskState::Failed);

        transport.heal();
        let replacement = uploads.enqueue(session, vec![pdf("fail-cv.pdf", 10)]).unwrap()[0];
        uploads.settle().await;
        assert_eq!(
            uploads.task(replacement).unwrap().state,
            TaskState::Transferred
        );

        let err = uploads.retry(failed).unwrap_err();
        assert_eq!(err.user_message(), "a file with this name is already added");
        assert_eq!(uploads.task(failed).unwrap().state, TaskState::Failed);
    }

    #[tokio::test]
    async fn timeout_is_a_transport_failure() {
        let transport = Arc::new(MockTransport::new());
        let uploads = UploadOrchestrator::with_settings(
            transport.clone(),
            UploadPolicy::default(),
            Duration::from_millis(50),
        );

        let ids = uploads
            .enqueue(new_session_id(), vec![pdf("slow-cv.pdf", 10)])
            .unwrap();
        uploads.settle().await;

        let task = uploads.task(ids[0]).unwrap();
        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(
            task.last_error.as_deref(),
            Some("network error — retry available")
        );
    }

    #[tokio::test]
    async fn progress_events_are_monotonic_per_task() {
        let transport = Arc::new(MockTransport::new());
        let uploads = orchestrator(&transport);
        let mut events = uploads.subscribe();

        let ids = uploads
            .enqueue(
                new_session_id(),
                vec![pdf("a.pdf", 100), pdf("b.pdf", 100), pdf("c.pdf", 100)],
            )
            .unwrap();
        uploads.settle().await;

        let mut last: HashMap<TaskId, u8> = HashMap::new();
        while let Ok(event) = events.try_recv() {
            if let BatchEvent::Progress { task, percent, .. } = event {
                let previous = last.insert(task, percent).unwrap_or(0);
                assert!(percent >= previous);
            }
        }
        assert_eq!(last.len(), 3);
        for id in ids {
            assert_eq!(uploads.task(id).unwrap().state, TaskState::Transferred);
        }
    }

    #[tokio::test]
    async fn new_session_discards_previous_batch() {
        let transport = Arc::new(MockTransport::new());
        let uploads = orchestrator(&transport);

        uploads
            .enqueue(new_session_id(), vec![pdf("a.pdf", 1), pdf("b.pdf", 1)])
            .unwrap();
        uploads.settle().await;

        let next = new_session_id();
        let ids = uploads
            .enqueue(next, vec![pdf("c.pdf", 1), pdf("d.pdf", 1)])
            .unwrap();
        uploads.settle().await;

        let tasks = uploads.tasks();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.session == next));
        assert_eq!(tasks.iter().map(|t| t.id).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn percent_is_bounded() {
        assert_eq!(percent_of(0, 0), 100);
        assert_eq!(percent_of(50, 200), 25);
        assert_eq!(percent_of(300, 200), 100);
    }
}
