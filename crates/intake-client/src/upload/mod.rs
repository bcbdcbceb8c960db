mod orchestrator;
mod state;
mod transport;

pub use orchestrator::{BatchError, UploadOrchestrator};
pub use state::{BatchEvent, BatchState, FileSummary, FileUploadTask, TaskId, TaskState};
pub use transport::{
    HttpTransport, ProgressFn, SelectedFile, TransferError, Transport, NETWORK_ERROR_MESSAGE,
};
