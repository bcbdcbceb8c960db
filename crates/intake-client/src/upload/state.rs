//! Upload batch state and its reducer.
//!
//! All mutation goes through [`BatchState::apply`]. Events carry the task id and
//! the attempt they belong to, so a late event from a removed task or a superseded
//! attempt is ignored instead of touching a sibling or a newer attempt.

use intake_core::models::UploadedFile;
use intake_core::{stored_file_name, SessionId};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Transferring,
    Transferred,
    Failed,
}

/// What the user selected, as recorded on the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub name: String,
    pub size: u64,
    pub declared_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileUploadTask {
    pub id: TaskId,
    pub session: SessionId,
    pub name: String,
    pub size: u64,
    pub declared_type: String,
    pub state: TaskState,
    pub progress_percent: u8,
    /// Set once transferred; the handle used for deletion.
    pub remote_key: Option<String>,
    pub remote_url: Option<String>,
    pub last_error: Option<String>,
    /// Starts at 1 and grows with every retry.
    pub attempt: u32,
}

impl FileUploadTask {
    /// Whether the task occupies one of the batch's slots.
    pub fn counts_against_limit(&self) -> bool {
        matches!(
            self.state,
            TaskState::Queued | TaskState::Transferring | TaskState::Transferred
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// Accepted locally; transfer starts right away.
    Enqueued {
        task: TaskId,
        session: SessionId,
        file: FileSummary,
    },
    /// Refused locally; no transfer is attempted.
    Rejected {
        task: TaskId,
        session: SessionId,
        file: FileSummary,
        reason: String,
    },
    Started {
        task: TaskId,
        attempt: u32,
    },
    Progress {
        task: TaskId,
        attempt: u32,
        percent: u8,
    },
    Transferred {
        task: TaskId,
        attempt: u32,
        file: UploadedFile,
    },
    Failed {
        task: TaskId,
        attempt: u32,
        error: String,
    },
    /// Back to `queued` for a new attempt.
    Requeued {
        task: TaskId,
        attempt: u32,
    },
    Removed {
        task: TaskId,
    },
    /// The whole batch was dropped (session reset or step exit).
    Discarded,
}

impl BatchEvent {
    pub fn task(&self) -> Option<TaskId> {
        match self {
            BatchEvent::Enqueued { task, .. }
            | BatchEvent::Rejected { task, .. }
            | BatchEvent::Started { task, .. }
            | BatchEvent::Progress { task, .. }
            | BatchEvent::Transferred { task, .. }
            | BatchEvent::Failed { task, .. }
            | BatchEvent::Requeued { task, .. }
            | BatchEvent::Removed { task } => Some(*task),
            BatchEvent::Discarded => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchState {
    tasks: Vec<FileUploadTask>,
}

impl BatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[FileUploadTask] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&FileUploadTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks in `queued`, `transferring` or `transferred`.
    pub fn occupied(&self) -> usize {
        self.tasks.iter().filter(|t| t.counts_against_limit()).count()
    }

    /// Whether a live task other than `except` would be stored as `stored_name`.
    pub fn holds_stored_name(&self, stored_name: &str, except: Option<TaskId>) -> bool {
        self.tasks.iter().any(|t| {
            Some(t.id) != except
                && t.counts_against_limit()
                && stored_file_name(&t.name).is_ok_and(|name| name == stored_name)
        })
    }

    pub fn is_ready_to_advance(&self) -> bool {
        self.tasks.iter().any(|t| t.state == TaskState::Transferred)
    }

    /// Apply one event. Returns false when the event was stale or illegal for the
    /// task's current state and nothing changed.
    pub fn apply(&mut self, event: &BatchEvent) -> bool {
        match event {
            BatchEvent::Enqueued {
                task,
                session,
                file,
            } => self.insert(*task, *session, file, TaskState::Queued, None),
            BatchEvent::Rejected {
                task,
                session,
                file,
                reason,
            } => self.insert(*task, *session, file, TaskState::Failed, Some(reason)),
            BatchEvent::Started { task, attempt } => {
                self.transition(*task, *attempt, TaskState::Queued, |t| {
                    t.state = TaskState::Transferring;
                    t.progress_percent = 0;
                })
            }
            BatchEvent::Progress {
                task,
                attempt,
                percent,
            } => self.transition(*task, *attempt, TaskState::Transferring, |t| {
                t.progress_percent = t.progress_percent.max((*percent).min(100));
            }),
            BatchEvent::Transferred {
                task,
                attempt,
                file,
            } => self.transition(*task, *attempt, TaskState::Transferring, |t| {
                t.state = TaskState::Transferred;
                t.progress_percent = 100;
                t.remote_key = Some(file.key.clone());
                t.remote_url = Some(file.url.clone());
                t.last_error = None;
            }),
            BatchEvent::Failed {
                task,
                attempt,
                error,
            } => self.transition(*task, *attempt, TaskState::Transferring, |t| {
                t.state = TaskState::Failed;
                t.last_error = Some(error.clone());
            }),
            BatchEvent::Requeued { task, attempt } => {
                match self.tasks.iter_mut().find(|t| t.id == *task) {
                    Some(t) if t.state == TaskState::Failed && *attempt == t.attempt + 1 => {
                        t.state = TaskState::Queued;
                        t.attempt = *attempt;
                        t.progress_percent = 0;
                        t.last_error = None;
                        true
                    }
                    _ => false,
                }
            }
            BatchEvent::Removed { task } => {
                let before = self.tasks.len();
                self.tasks.retain(|t| t.id != *task);
                self.tasks.len() != before
            }
            BatchEvent::Discarded => {
                self.tasks.clear();
                true
            }
        }
    }

    fn insert(
        &mut self,
        id: TaskId,
        session: SessionId,
        file: &FileSummary,
        state: TaskState,
        error: Option<&String>,
    ) -> bool {
        if self.get(id).is_some() {
            return false;
        }
        self.tasks.push(FileUploadTask {
            id,
            session,
            name: file.name.clone(),
            size: file.size,
            declared_type: file.declared_type.clone(),
            state,
            progress_percent: 0,
            remote_key: None,
            remote_url: None,
            last_error: error.cloned(),
            attempt: 1,
        });
        true
    }

    fn transition(
        &mut self,
        id: TaskId,
        attempt: u32,
        from: TaskState,
        update: impl FnOnce(&mut FileUploadTask),
    ) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) if task.attempt == attempt && task.state == from => {
                update(task);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::new_session_id;

    fn summary(name: &str) -> FileSummary {
        FileSummary {
            name: name.to_string(),
            size: 10,
            declared_type: "application/pdf".to_string(),
        }
    }

    fn uploaded(key: &str) -> UploadedFile {
        UploadedFile {
            name: "a.pdf".to_string(),
            url: format!("http://localhost:3000/files/{}", key),
            key: key.to_string(),
            size: 10,
        }
    }

    fn enqueue(state: &mut BatchState, id: u64) -> TaskId {
        let task = TaskId(id);
        assert!(state.apply(&BatchEvent::Enqueued {
            task,
            session: new_session_id(),
            file: summary("a.pdf"),
        }));
        task
    }

    #[test]
    fn task_walks_through_transfer() {
        let mut state = BatchState::new();
        let task = enqueue(&mut state, 1);

        assert!(state.apply(&BatchEvent::Started { task, attempt: 1 }));
        assert!(state.apply(&BatchEvent::Progress {
            task,
            attempt: 1,
            percent: 40
        }));
        assert!(state.apply(&BatchEvent::Transferred {
            task,
            attempt: 1,
            file: uploaded("uploads/s/a.pdf")
        }));

        let t = state.get(task).unwrap();
        assert_eq!(t.state, TaskState::Transferred);
        assert_eq!(t.progress_percent, 100);
        assert_eq!(t.remote_key.as_deref(), Some("uploads/s/a.pdf"));
        assert!(state.is_ready_to_advance());
    }

    #[test]
    fn progress_never_goes_backwards() {
        let mut state = BatchState::new();
        let task = enqueue(&mut state, 1);
        state.apply(&BatchEvent::Started { task, attempt: 1 });

        for percent in [10, 60, 30, 250] {
            state.apply(&BatchEvent::Progress {
                task,
                attempt: 1,
                percent,
            });
        }
        assert_eq!(state.get(task).unwrap().progress_percent, 100);
    }

    #[test]
    fn stale_attempt_is_ignored() {
        let mut state = BatchState::new();
        let task = enqueue(&mut state, 1);
        state.apply(&BatchEvent::Started { task, attempt: 1 });
        state.apply(&BatchEvent::Failed {
            task,
            attempt: 1,
            error: "network error".to_string(),
        });
        assert!(state.apply(&BatchEvent::Requeued { task, attempt: 2 }));

        // A late success from attempt 1 must not land on attempt 2.
        assert!(!state.apply(&BatchEvent::Transferred {
            task,
            attempt: 1,
            file: uploaded("uploads/s/a.pdf")
        }));
        assert_eq!(state.get(task).unwrap().state, TaskState::Queued);
        assert!(state.get(task).unwrap().last_error.is_none());
    }

    #[test]
    fn events_for_one_task_leave_siblings_alone() {
        let mut state = BatchState::new();
        let a = enqueue(&mut state, 1);
        let b = enqueue(&mut state, 2);
        state.apply(&BatchEvent::Started { task: a, attempt: 1 });
        state.apply(&BatchEvent::Started { task: b, attempt: 1 });

        state.apply(&BatchEvent::Progress {
            task: a,
            attempt: 1,
            percent: 70,
        });
        state.apply(&BatchEvent::Failed {
            task: a,
            attempt: 1,
            error: "boom".to_string(),
        });

        let b = state.get(b).unwrap();
        assert_eq!(b.state, TaskState::Transferring);
        assert_eq!(b.progress_percent, 0);
        assert!(b.last_error.is_none());
    }

    #[test]
    fn illegal_transitions_are_refused() {
        let mut state = BatchState::new();
        let task = enqueue(&mut state, 1);

        // Retry is only legal from failed.
        assert!(!state.apply(&BatchEvent::Requeued { task, attempt: 2 }));
        // Completion requires a running transfer.
        assert!(!state.apply(&BatchEvent::Transferred {
            task,
            attempt: 1,
            file: uploaded("k")
        }));
        // Duplicate ids are not inserted twice.
        assert!(!state.apply(&BatchEvent::Enqueued {
            task,
            session: new_session_id(),
            file: summary("b.pdf"),
        }));
        assert_eq!(state.tasks().len(), 1);
    }

    #[test]
    fn rejected_files_do_not_occupy_slots() {
        let mut state = BatchState::new();
        enqueue(&mut state, 1);
        state.apply(&BatchEvent::Rejected {
            task: TaskId(2),
            session: new_session_id(),
            file: summary("notes.txt"),
            reason: "unsupported file type".to_string(),
        });

        assert_eq!(state.tasks().len(), 2);
        assert_eq!(state.occupied(), 1);
        assert_eq!(
            state.get(TaskId(2)).unwrap().last_error.as_deref(),
            Some("unsupported file type")
        );
        assert!(!state.is_ready_to_advance());
    }

    #[test]
    fn removal_and_discard() {
        let mut state = BatchState::new();
        let a = enqueue(&mut state, 1);
        enqueue(&mut state, 2);

        assert!(state.apply(&BatchEvent::Removed { task: a }));
        assert!(!state.apply(&BatchEvent::Removed { task: a }));
        assert_eq!(state.tasks().len(), 1);

        state.apply(&BatchEvent::Discarded);
        assert!(state.tasks().is_empty());
    }

    #[test]
    fn stored_names_of_live_tasks_are_held() {
        let mut state = BatchState::new();
        let a = enqueue(&mut state, 1);
        assert!(state.holds_stored_name("a.pdf", None));
        assert!(!state.holds_stored_name("a.pdf", Some(a)));

        state.apply(&BatchEvent::Started { task: a, attempt: 1 });
        state.apply(&BatchEvent::Failed {
            task: a,
            attempt: 1,
            error: "boom".to_string(),
        });
        assert!(!state.holds_stored_name("a.pdf", None));
    }
}
