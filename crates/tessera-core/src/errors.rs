use crate::apply::Conflict;
use tessera_core_types::RequestId;
use thiserror::Error;

/// Result type alias using TesseraError
pub type Result<T> = std::result::Result<T, TesseraError>;

/// Result type alias using the structured ExError facility
pub type ExResult<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure that can leave the engine is classified into one of these
/// kinds. Each kind maps to a stable error code for programmatic handling
/// and to a distinct process exit status for the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Patch documents
    /// The patch document is malformed or lacks a required key
    InvalidPatch,
    /// The patch names a dataset that is absent from the target snapshot
    UnknownDataset,
    /// A ref or commit could not be resolved
    UnknownRef,
    /// One or more changes conflict with the current state
    PatchDoesNotApply,
    /// Every change in the patch was a no-op
    NoChanges,
    /// A no-commit apply was requested without a working copy
    NoWorkingCopy,

    // Storage
    /// The annotation store is mounted read-only (logged, never surfaced)
    ReadOnlyStorage,
    /// An object or path is missing from the object store
    NotFound,
    /// An object failed to decode
    CorruptObject,

    // Validation
    InvalidInput,
    /// No committer identity is configured
    MissingIdentity,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
    /// A ref moved underneath a compare-and-set update
    Concurrency,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidPatch => "ERR_INVALID_PATCH",
            ExErrorKind::UnknownDataset => "ERR_UNKNOWN_DATASET",
            ExErrorKind::UnknownRef => "ERR_UNKNOWN_REF",
            ExErrorKind::PatchDoesNotApply => "ERR_PATCH_DOES_NOT_APPLY",
            ExErrorKind::NoChanges => "ERR_NO_CHANGES",
            ExErrorKind::NoWorkingCopy => "ERR_NO_WORKING_COPY",
            ExErrorKind::ReadOnlyStorage => "ERR_READ_ONLY_STORAGE",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::CorruptObject => "ERR_CORRUPT_OBJECT",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::MissingIdentity => "ERR_MISSING_IDENTITY",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Process exit status reported by the command line for this kind
    pub fn exit_code(&self) -> i32 {
        match self {
            ExErrorKind::InvalidPatch => 1,
            ExErrorKind::InvalidInput => 2,
            ExErrorKind::NoChanges => 44,
            ExErrorKind::NoWorkingCopy => 45,
            ExErrorKind::MissingIdentity => 46,
            ExErrorKind::NotFound => 50,
            ExErrorKind::UnknownDataset => 51,
            ExErrorKind::UnknownRef => 52,
            ExErrorKind::PatchDoesNotApply => 53,
            _ => 3,
        }
    }
}

/// Canonical structured error type
///
/// Carries classification fields for programmatic handling plus context
/// for reporting. A `PatchDoesNotApply` error carries every conflict found
/// in the patch, not just the first.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    dataset: Option<String>,
    item: Option<String>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<ExError>>,
    conflicts: Vec<Conflict>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            dataset: None,
            item: None,
            request_id: None,
            message: String::new(),
            source: None,
            conflicts: Vec::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add dataset context
    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    /// Add item context (a meta item name, primary key or object id)
    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attach the full list of conflicts found while evaluating a patch
    pub fn with_conflicts(mut self, conflicts: Vec<Conflict>) -> Self {
        self.conflicts = conflicts;
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the process exit status for this error
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the dataset context, if any
    pub fn dataset(&self) -> Option<&str> {
        self.dataset.as_deref()
    }

    /// Get the item context, if any
    pub fn item(&self) -> Option<&str> {
        self.item.as_deref()
    }

    /// Get the request ID context, if any
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Get the attached conflicts (empty unless kind is `PatchDoesNotApply`)
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(dataset) = &self.dataset {
            write!(f, " (dataset: {})", dataset)?;
        }
        if let Some(item) = &self.item {
            write!(f, " (item: {})", item)?;
        }
        if !self.conflicts.is_empty() {
            write!(f, " ({} conflicts)", self.conflicts.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain errors raised by the pure core (objects, trees, datasets, wire format)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TesseraError {
    // ===== Object store =====
    /// Object is absent from the store
    #[error("Object not found: {id}")]
    ObjectNotFound { id: String },

    /// Object bytes could not be decoded
    #[error("Corrupt object {id}: {reason}")]
    CorruptObject { id: String, reason: String },

    /// Object exists but is of a different kind than requested
    #[error("Object {id} is a {actual}, expected a {expected}")]
    WrongObjectKind {
        id: String,
        expected: String,
        actual: String,
    },

    /// String is not a valid object id
    #[error("Invalid object id: {value}")]
    InvalidObjectId { value: String },

    // ===== Trees =====
    /// Path is absent from a tree
    #[error("Path not found in tree: {path}")]
    PathNotFound { path: String },

    /// Path names a blob where a tree was required
    #[error("Not a tree: {path}")]
    NotATree { path: String },

    /// Path component is empty or otherwise unusable
    #[error("Invalid tree path: {path}")]
    InvalidPath { path: String },

    // ===== Datasets =====
    /// Dataset is absent from the snapshot
    #[error("Dataset not found: {dataset}")]
    DatasetNotFound { dataset: String },

    /// Dataset schema is missing or malformed
    #[error("Invalid schema for dataset {dataset}: {reason}")]
    InvalidSchema { dataset: String, reason: String },

    /// Feature lacks a usable primary key
    #[error("Invalid primary key in dataset {dataset}: {reason}")]
    InvalidPrimaryKey { dataset: String, reason: String },

    /// Geometry column value is not hex-encoded
    #[error("Invalid geometry in dataset {dataset}, column {column}")]
    InvalidGeometry { dataset: String, column: String },

    /// Meta item name is not one this dataset kind can hold
    #[error("Unrecognised meta item: {name}")]
    InvalidMetaItem { name: String },

    // ===== Patch documents =====
    /// Patch document is structurally invalid
    #[error("{reason}")]
    InvalidPatch { reason: String },

    /// Timestamp or offset in a header could not be parsed
    #[error("Invalid timestamp: {value}")]
    InvalidTimestamp { value: String },

    // ===== Serialization =====
    /// JSON encoding/decoding failure
    #[error("JSON error: {reason}")]
    Json { reason: String },
}

impl From<serde_json::Error> for TesseraError {
    fn from(err: serde_json::Error) -> Self {
        TesseraError::Json {
            reason: err.to_string(),
        }
    }
}

impl From<TesseraError> for ExError {
    fn from(err: TesseraError) -> Self {
        let message = err.to_string();
        match err {
            TesseraError::ObjectNotFound { id } => ExError::new(ExErrorKind::NotFound)
                .with_item(id)
                .with_message(message),

            TesseraError::CorruptObject { id, .. } | TesseraError::WrongObjectKind { id, .. } => {
                ExError::new(ExErrorKind::CorruptObject)
                    .with_item(id)
                    .with_message(message)
            }

            TesseraError::InvalidObjectId { value } => ExError::new(ExErrorKind::InvalidInput)
                .with_item(value)
                .with_message(message),

            TesseraError::PathNotFound { path } => ExError::new(ExErrorKind::NotFound)
                .with_item(path)
                .with_message(message),

            TesseraError::NotATree { path } | TesseraError::InvalidPath { path } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_item(path)
                    .with_message(message)
            }

            TesseraError::DatasetNotFound { dataset } => {
                ExError::new(ExErrorKind::UnknownDataset)
                    .with_dataset(dataset)
                    .with_message(message)
            }

            TesseraError::InvalidSchema { dataset, .. } => ExError::new(ExErrorKind::CorruptObject)
                .with_dataset(dataset)
                .with_message(message),

            TesseraError::InvalidPrimaryKey { dataset, .. }
            | TesseraError::InvalidGeometry { dataset, .. } => {
                ExError::new(ExErrorKind::InvalidPatch)
                    .with_dataset(dataset)
                    .with_message(message)
            }

            TesseraError::InvalidMetaItem { name } => ExError::new(ExErrorKind::InvalidPatch)
                .with_item(name)
                .with_message(message),

            TesseraError::InvalidPatch { .. } | TesseraError::InvalidTimestamp { .. } => {
                ExError::new(ExErrorKind::InvalidPatch).with_message(message)
            }

            TesseraError::Json { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for ExError {
    fn from(err: serde_json::Error) -> Self {
        ExError::new(ExErrorKind::Serialization).with_message(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_every_taxonomy_kind_has_its_own_exit_code() {
        let kinds = [
            ExErrorKind::InvalidPatch,
            ExErrorKind::UnknownDataset,
            ExErrorKind::UnknownRef,
            ExErrorKind::PatchDoesNotApply,
            ExErrorKind::NoChanges,
            ExErrorKind::NoWorkingCopy,
        ];
        let mut codes: Vec<i32> = kinds.iter().map(|k| k.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert!(codes.iter().all(|c| *c != 0));
    }

    #[test]
    fn test_error_builder() {
        let err = ExError::new(ExErrorKind::UnknownDataset)
            .with_op("validate_patch")
            .with_dataset("nz_roads")
            .with_message("not in this repository");

        assert_eq!(err.kind(), ExErrorKind::UnknownDataset);
        assert_eq!(err.code(), "ERR_UNKNOWN_DATASET");
        assert_eq!(err.op(), Some("validate_patch"));
        assert_eq!(err.dataset(), Some("nz_roads"));
        assert!(err.conflicts().is_empty());
    }

    #[test]
    fn test_display_includes_code_and_message() {
        let err = ExError::new(ExErrorKind::NoChanges).with_message("No changes to commit");
        let s = err.to_string();
        assert!(s.contains("ERR_NO_CHANGES"));
        assert!(s.contains("No changes to commit"));
    }

    #[test]
    fn test_domain_error_conversion() {
        let err: ExError = TesseraError::DatasetNotFound {
            dataset: "ds".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ExErrorKind::UnknownDataset);
        assert_eq!(err.dataset(), Some("ds"));

        let err: ExError = TesseraError::InvalidPatch {
            reason: "Failed to parse JSON patch file".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ExErrorKind::InvalidPatch);
        assert_eq!(err.message(), "Failed to parse JSON patch file");
    }

    #[test]
    fn test_source_chain() {
        let inner = ExError::new(ExErrorKind::Io).with_message("disk");
        let outer = ExError::new(ExErrorKind::Persistence).with_source(inner);
        assert_eq!(outer.source_error().unwrap().kind(), ExErrorKind::Io);
        assert!(std::error::Error::source(&outer).is_some());
    }
}
