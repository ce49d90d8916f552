use std::fmt::Display;

/// Failures surfaced by the ingest and OCR pipeline.
///
/// Every variant carries a short human-readable `message` and optional
/// `details`; the HTTP layer turns both into the JSON error envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<String>,
    },
    #[error("{message}")]
    Storage {
        message: String,
        details: Option<String>,
    },
    #[error("{message}")]
    BackendUnavailable {
        message: String,
        details: Option<String>,
    },
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: impl Display) -> Self {
        Self::Validation {
            message: message.into(),
            details: Some(details.to_string()),
        }
    }

    pub fn storage(message: impl Into<String>, details: impl Display) -> Self {
        Self::Storage {
            message: message.into(),
            details: Some(details.to_string()),
        }
    }

    pub fn backend_unavailable(message: impl Into<String>, details: impl Display) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
            details: Some(details.to_string()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. }
            | Self::Storage { message, .. }
            | Self::BackendUnavailable { message, .. } => message,
        }
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Validation { details, .. }
            | Self::Storage { details, .. }
            | Self::BackendUnavailable { details, .. } => details.as_deref(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Appends a note to `details`, keeping whatever was already there.
    pub fn with_note(self, note: &str) -> Self {
        let merge = |details: Option<String>| match details {
            Some(existing) => Some(format!("{}. {}", existing, note)),
            None => Some(note.to_string()),
        };

        match self {
            Self::Validation { message, details } => Self::Validation {
                message,
                details: merge(details),
            },
            Self::Storage { message, details } => Self::Storage {
                message,
                details: merge(details),
            },
            Self::BackendUnavailable { message, details } => Self::BackendUnavailable {
                message,
                details: merge(details),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_is_client_error() {
        let error = PipelineError::validation("No file uploaded");

        assert!(error.is_client_error());
        assert_eq!(error.message(), "No file uploaded");
        assert_eq!(error.details(), None);
        assert_eq!(error.to_string(), "No file uploaded");
    }

    #[test]
    fn test_backend_and_storage_errors_are_not_client_errors() {
        assert!(!PipelineError::storage("disk", "full").is_client_error());
        assert!(!PipelineError::backend_unavailable("ocr", "timeout").is_client_error());
    }

    #[test]
    fn test_with_note_appends_to_existing_details() {
        let error = PipelineError::backend_unavailable("Failed to process OCR", "quota exceeded")
            .with_note("retry later");

        assert_eq!(error.details(), Some("quota exceeded. retry later"));
    }

    #[test]
    fn test_with_note_sets_details_when_absent() {
        let error = PipelineError::validation("bad").with_note("fix it");

        assert_eq!(error.details(), Some("fix it"));
    }
}
