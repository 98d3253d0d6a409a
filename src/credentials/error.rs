use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// A wire value that cannot be turned back into the value it claims to hold.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("buffer of {available} bytes is shorter than the 4-byte length prefix")]
    Truncated { available: usize },
    #[error("declared length {declared} is not a valid string length")]
    InvalidLength { declared: i32 },
    #[error("declared length {declared} does not match {available} available bytes")]
    LengthMismatch { declared: i32, available: usize },
    #[error("expected 0x00 terminator, found {found:#04x}")]
    MissingTerminator { found: u8 },
    #[error("string content is not valid UTF-8")]
    InvalidUtf8,
    #[error("content is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("expected {expected} value, found {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("field is missing")]
    Missing,
}

/// Decoding failure attributed to a document field.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed wire value in `{field}`: {source}")]
pub struct MalformedField {
    pub field: String,
    #[source]
    pub source: CodecError,
}

impl MalformedField {
    pub fn new(field: impl Into<String>, source: CodecError) -> Self {
        Self {
            field: field.into(),
            source,
        }
    }
}

/// A document refused by the collection's validation rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema violation on `{field}`: {reason}")]
pub struct SchemaViolation {
    pub field: String,
    pub reason: String,
}

impl SchemaViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("a new hash must come with a newly generated salt")]
    SaltReused,
}

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    MalformedWireValue(#[from] MalformedField),
    #[error("store rejected document: {0}")]
    SchemaViolation(SchemaViolation),
    #[error("no credentials matched {key} filter")]
    NotFound { key: String },
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("collection does not implement {0}")]
    CapabilityUnimplemented(&'static str),
    #[error("credentials {0} already exist")]
    DuplicateId(Uuid),
    #[error("credentials have no id; insert them first")]
    MissingId,
}

impl RepoError {
    /// Only transport failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepoError::StoreUnavailable(_))
    }
}

impl From<StoreError> for RepoError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Rejected(v) => RepoError::SchemaViolation(v),
            StoreError::DuplicateId(id) => RepoError::DuplicateId(id),
            StoreError::Unavailable(msg) => RepoError::StoreUnavailable(msg),
            StoreError::Unsupported(op) => RepoError::CapabilityUnimplemented(op),
        }
    }
}
