//! Error types for ledger operations

use chainfs_proto::Status;

/// Error type for ledger operations.
///
/// Only [`LedgerError::status`] ever reaches the kernel; the full variant is
/// for logs.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("inode {0} not found")]
    NotFound(u64),

    #[error("inode {0} already exists")]
    AlreadyExists(u64),

    #[error("backend rejected the request: {message}")]
    Rejected { message: String },

    #[error("backend unavailable: {message}")]
    Unavailable { message: String },
}

impl LedgerError {
    /// Create a new rejection error.
    pub fn rejected<S: Into<String>>(message: S) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Create a new availability error.
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Collapse the error into the closed wire status taxonomy.
    pub fn status(&self) -> Status {
        match self {
            Self::NotFound(_) => Status::InodeNotFound,
            Self::AlreadyExists(_) | Self::Rejected { .. } | Self::Unavailable { .. } => {
                Status::Fail
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_collapse() {
        assert_eq!(LedgerError::NotFound(1).status(), Status::InodeNotFound);
        assert_eq!(LedgerError::AlreadyExists(1).status(), Status::Fail);
        assert_eq!(LedgerError::rejected("nope").status(), Status::Fail);
        assert_eq!(LedgerError::unavailable("down").status(), Status::Fail);
    }
}
