use std::fmt;

use crate::record::MalformedRecord;
use crate::store::StoreError;

/// Machine-readable error codes for operator-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    MissingActor,
    MalformedRecord,
    ProductNotFound,
    StageNotFound,
    TaskNotFound,
    StageLocked,
    StoreUnavailable,
    StoreCorrupt,
    InvalidPath,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::MissingActor => "E1003",
            Self::MalformedRecord => "E2001",
            Self::ProductNotFound => "E2002",
            Self::StageNotFound => "E2003",
            Self::TaskNotFound => "E2004",
            Self::StageLocked => "E3001",
            Self::StoreUnavailable => "E5001",
            Self::StoreCorrupt => "E5002",
            Self::InvalidPath => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Workspace not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::MissingActor => "No actor identity",
            Self::MalformedRecord => "Product record is malformed",
            Self::ProductNotFound => "Product not found",
            Self::StageNotFound => "Stage not found",
            Self::TaskNotFound => "Task not found",
            Self::StageLocked => "Stage is locked",
            Self::StoreUnavailable => "Document store unavailable",
            Self::StoreCorrupt => "Document store corrupt",
            Self::InvalidPath => "Invalid document path",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to technicians and operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `sg init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .stagegate/config.toml and retry."),
            Self::MissingActor => Some("Pass --actor or set STAGEGATE_ACTOR."),
            Self::MalformedRecord => {
                Some("The product is shown without a process; report the record to an operator.")
            }
            Self::ProductNotFound | Self::StageNotFound | Self::TaskNotFound => None,
            Self::StageLocked => Some("Finish the previous stage first."),
            Self::StoreUnavailable => Some("Retry once the store is reachable again."),
            Self::StoreCorrupt => Some("Restore the store from a backup or re-import the records."),
            Self::InvalidPath => Some("Use a `/`-separated path such as `xoxo/orders/DH001`."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Kind of entity a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotFoundKind {
    Product,
    Stage,
    Task,
}

impl NotFoundKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Stage => "stage",
            Self::Task => "task",
        }
    }
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a tracking read or mutation that did not succeed.
///
/// `StageLocked` and `NotFound` are rejections of the request; the rest are
/// faults. Callers render both; neither is retried here.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error(transparent)]
    MalformedRecord(#[from] MalformedRecord),

    #[error("stage '{stage_name}' is locked until '{blocked_by_name}' is finished")]
    StageLocked {
        stage: String,
        stage_name: String,
        blocked_by: String,
        blocked_by_name: String,
    },

    #[error("document store unavailable: {0}")]
    TransientIo(#[source] StoreError),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: NotFoundKind, id: String },

    #[error(transparent)]
    Store(StoreError),
}

impl TrackError {
    pub fn not_found(kind: NotFoundKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MalformedRecord(_) => ErrorCode::MalformedRecord,
            Self::StageLocked { .. } => ErrorCode::StageLocked,
            Self::TransientIo(_) => ErrorCode::StoreUnavailable,
            Self::NotFound { kind, .. } => match kind {
                NotFoundKind::Product => ErrorCode::ProductNotFound,
                NotFoundKind::Stage => ErrorCode::StageNotFound,
                NotFoundKind::Task => ErrorCode::TaskNotFound,
            },
            Self::Store(err) => err.code(),
        }
    }

    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// `true` for business-rule rejections, `false` for faults.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::StageLocked { .. } | Self::NotFound { .. })
    }
}

impl From<StoreError> for TrackError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            Self::TransientIo(err)
        } else {
            Self::Store(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, NotFoundKind, TrackError};
    use crate::record::MalformedRecord;
    use crate::store::StoreError;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::MissingActor,
            ErrorCode::MalformedRecord,
            ErrorCode::ProductNotFound,
            ErrorCode::StageNotFound,
            ErrorCode::TaskNotFound,
            ErrorCode::StageLocked,
            ErrorCode::StoreUnavailable,
            ErrorCode::StoreCorrupt,
            ErrorCode::InvalidPath,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::StageLocked.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn stage_locked_hint_is_actionable() {
        assert_eq!(
            ErrorCode::StageLocked.hint(),
            Some("Finish the previous stage first.")
        );
    }

    #[test]
    fn track_errors_map_to_codes() {
        let locked = TrackError::StageLocked {
            stage: "wf_2".into(),
            stage_name: "May".into(),
            blocked_by: "wf_1".into(),
            blocked_by_name: "Cắt".into(),
        };
        assert_eq!(locked.code(), ErrorCode::StageLocked);
        assert!(locked.is_rejection());
        assert_eq!(locked.hint(), Some("Finish the previous stage first."));
        assert_eq!(
            locked.to_string(),
            "stage 'May' is locked until 'Cắt' is finished"
        );

        let missing = TrackError::not_found(NotFoundKind::Task, "t9");
        assert_eq!(missing.code(), ErrorCode::TaskNotFound);
        assert_eq!(missing.to_string(), "task 't9' not found");

        let malformed = TrackError::from(MalformedRecord::new("workflows/wf", "bad"));
        assert!(!malformed.is_rejection());
        assert_eq!(malformed.code(), ErrorCode::MalformedRecord);
    }

    #[test]
    fn store_errors_split_into_transient_and_fatal() {
        let transient = TrackError::from(StoreError::Unavailable("offline".into()));
        assert!(matches!(transient, TrackError::TransientIo(_)));
        assert_eq!(transient.code(), ErrorCode::StoreUnavailable);

        let fatal = TrackError::from(StoreError::Corrupt {
            path: "xoxo/orders/DH001".into(),
            reason: "bad json".into(),
        });
        assert!(matches!(fatal, TrackError::Store(_)));
        assert_eq!(fatal.code(), ErrorCode::StoreCorrupt);
    }
}
