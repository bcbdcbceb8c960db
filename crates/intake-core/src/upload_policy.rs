//! Per-batch upload limits.
//!
//! The same policy is enforced twice: by the client orchestrator before any byte is
//! sent, and again by the upload endpoint, which cannot trust the client.

use serde::{Deserialize, Serialize};

pub const MAX_FILES_PER_SESSION: usize = 3;
pub const MAX_FILE_SIZE_BYTES: u64 = 5_242_880;
pub const ACCEPTED_CONTENT_TYPE: &str = "application/pdf";
const MAX_FILENAME_LENGTH: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPolicy {
    pub max_files: usize,
    pub max_file_size_bytes: u64,
    pub accepted_content_type: String,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_files: MAX_FILES_PER_SESSION,
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            accepted_content_type: ACCEPTED_CONTENT_TYPE.to_string(),
        }
    }
}

/// Why a file was refused before transfer. The `Display` text is shown inline next
/// to the file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileRejection {
    #[error("unsupported file type")]
    UnsupportedType { declared: String },

    #[error("file too large")]
    TooLarge { size: u64, limit: u64 },

    #[error("only {limit} files allowed")]
    TooManyFiles { limit: usize },

    #[error("invalid file name")]
    InvalidName { name: String },

    /// Another file in the batch would be stored under the same name.
    #[error("a file with this name is already added")]
    DuplicateName { stored_name: String },
}

impl FileRejection {
    pub fn code(&self) -> &'static str {
        match self {
            FileRejection::UnsupportedType { .. } => "UNSUPPORTED_FILE_TYPE",
            FileRejection::TooLarge { .. } => "FILE_TOO_LARGE",
            FileRejection::TooManyFiles { .. } => "TOO_MANY_FILES",
            FileRejection::InvalidName { .. } => "INVALID_FILE_NAME",
            FileRejection::DuplicateName { .. } => "DUPLICATE_FILE_NAME",
        }
    }
}

impl UploadPolicy {
    /// Check a single file's declared media type and byte length.
    ///
    /// Media type parameters (`; charset=...`) and case are ignored; the essence
    /// must match exactly.
    pub fn check_file(&self, declared_type: &str, size: u64) -> Result<(), FileRejection> {
        let essence = declared_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence != self.accepted_content_type {
            return Err(FileRejection::UnsupportedType {
                declared: declared_type.to_string(),
            });
        }
        if size > self.max_file_size_bytes {
            return Err(FileRejection::TooLarge {
                size,
                limit: self.max_file_size_bytes,
            });
        }
        Ok(())
    }

    /// Check that `incoming` more files fit next to `occupied` ones.
    pub fn check_count(&self, occupied: usize, incoming: usize) -> Result<(), FileRejection> {
        if occupied.saturating_add(incoming) > self.max_files {
            return Err(FileRejection::TooManyFiles {
                limit: self.max_files,
            });
        }
        Ok(())
    }
}

/// Name a client file is stored under, the last segment of its object key.
///
/// Directory parts are dropped and anything outside `[A-Za-z0-9._-]` becomes `_`.
/// Names that still contain `..` are refused. Two files with the same stored name
/// share one object.
pub fn stored_file_name(filename: &str) -> Result<String, FileRejection> {
    let filename_only = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename)
        .trim();

    if filename_only.contains("..") {
        return Err(FileRejection::InvalidName {
            name: filename.to_string(),
        });
    }

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches(|c: char| c == '.' || c == '_').is_empty() {
        return Ok("file.pdf".to_string());
    }

    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_pdf_at_the_size_limit() {
        let policy = UploadPolicy::default();
        assert!(policy
            .check_file("application/pdf", MAX_FILE_SIZE_BYTES)
            .is_ok());
        assert!(policy
            .check_file("Application/PDF; charset=binary", 1024)
            .is_ok());
    }

    #[test]
    fn rejects_other_types() {
        let policy = UploadPolicy::default();
        let err = policy.check_file("image/png", 10).unwrap_err();
        assert_eq!(err.to_string(), "unsupported file type");
        assert_eq!(err.code(), "UNSUPPORTED_FILE_TYPE");
    }

    #[test]
    fn rejects_oversize_files() {
        let policy = UploadPolicy::default();
        let err = policy
            .check_file("application/pdf", MAX_FILE_SIZE_BYTES + 1)
            .unwrap_err();
        assert_eq!(err.to_string(), "file too large");
    }

    #[test]
    fn count_ceiling() {
        let policy = UploadPolicy::default();
        assert!(policy.check_count(0, 3).is_ok());
        assert!(policy.check_count(2, 1).is_ok());
        let err = policy.check_count(3, 1).unwrap_err();
        assert_eq!(err.to_string(), "only 3 files allowed");
    }

    #[test]
    fn stored_name_rejects_path_traversal() {
        assert!(stored_file_name("..").is_err());
        let err = stored_file_name("cv..pdf").unwrap_err();
        assert_eq!(err.to_string(), "invalid file name");
    }

    #[test]
    fn stored_name_keeps_valid_names() {
        assert_eq!(stored_file_name("cv.pdf").unwrap(), "cv.pdf");
        assert_eq!(stored_file_name("my-file_1.pdf").unwrap(), "my-file_1.pdf");
    }

    #[test]
    fn stored_name_drops_directories_and_odd_characters() {
        assert_eq!(stored_file_name("C:\\docs\\my cv.pdf").unwrap(), "my_cv.pdf");
        assert_eq!(stored_file_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(stored_file_name("résumé.pdf").unwrap(), "r_sum_.pdf");
        assert_eq!(stored_file_name("").unwrap(), "file.pdf");
    }

    #[test]
    fn different_names_can_share_a_stored_name() {
        assert_eq!(
            stored_file_name("my cv.pdf").unwrap(),
            stored_file_name("my_cv.pdf").unwrap()
        );
    }
}
