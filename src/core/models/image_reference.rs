use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::models::PipelineError;
use crate::global_constants;

/// Opaque handle to an image held by a transient store.
///
/// Disk stores hand out absolute file paths, the memory store hands out
/// `memory://<uuid>` tokens. Only the store that issued a reference knows how
/// to resolve it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageReference(String);

impl ImageReference {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Parses a client-supplied reference; blank input is a client error.
    pub fn parse_client_supplied(raw: Option<&str>) -> Result<Self, PipelineError> {
        match raw.map(str::trim) {
            Some(value) if !value.is_empty() => Ok(Self(value.to_string())),
            _ => Err(PipelineError::validation(
                global_constants::ERROR_MISSING_FILE_PATH,
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn memory_token(&self) -> Option<&str> {
        self.0.strip_prefix(global_constants::MEMORY_REFERENCE_PREFIX)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
