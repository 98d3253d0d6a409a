//! The document-collection capability the credentials repository runs on.

pub mod memory;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::credentials::error::SchemaViolation;
use crate::credentials::wire::{WireDocument, WireField};

/// Default database holding the credentials collection.
pub const AUTH_DATABASE: &str = "auth";
/// Default name of the credentials collection.
pub const CREDENTIALS_COLLECTION: &str = "credentials";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("document failed validation: {0}")]
    Rejected(SchemaViolation),
    #[error("duplicate _id {0}")]
    DuplicateId(Uuid),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0} is not supported by this collection")]
    Unsupported(&'static str),
}

/// Value side of an equality filter, before wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Id(Uuid),
    Str(String),
    Bool(bool),
    /// Secret bytes; compared in their hex-wrapped wire form.
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn to_wire(&self) -> WireField {
        match self {
            FieldValue::Id(id) => WireField::ObjectId(*id),
            FieldValue::Str(s) => WireField::string(s),
            FieldValue::Bool(b) => WireField::Bool(*b),
            FieldValue::Bytes(b) => WireField::secret(b),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Id(id) => write!(f, "{id}"),
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<Uuid> for FieldValue {
    fn from(id: Uuid) -> Self {
        FieldValue::Id(id)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Single-field equality filter, matched on wire values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub key: String,
    pub value: WireField,
}

impl Filter {
    pub fn eq(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into().to_wire(),
        }
    }

    pub fn matches(&self, doc: &WireDocument) -> bool {
        doc.get(&self.key) == Some(&self.value)
    }
}

/// Which document wins when a filter matches several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchOrder {
    /// First inserted.
    Oldest,
    /// Last inserted.
    #[default]
    Newest,
    /// Greatest `ts_updated`, falling back to `ts_created`; ties go to the
    /// last inserted.
    LatestTimestamp,
}

impl FromStr for MatchOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oldest" => Ok(MatchOrder::Oldest),
            "newest" => Ok(MatchOrder::Newest),
            "latest-timestamp" | "latest_timestamp" => Ok(MatchOrder::LatestTimestamp),
            other => anyhow::bail!("unknown match order {other:?}"),
        }
    }
}

/// Partial update: fields to overwrite and fields to drop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Update {
    pub set: WireDocument,
    pub unset: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteResult {
    pub deleted: u64,
}

/// Operations the repository needs from a document collection. Update and
/// delete are optional; collections without them keep the defaults.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Stores `doc`, assigning an `_id` when it has none, and returns the id.
    async fn insert_one(&self, doc: WireDocument) -> Result<Uuid, StoreError>;

    async fn find_one(
        &self,
        filter: &Filter,
        order: MatchOrder,
    ) -> Result<Option<WireDocument>, StoreError>;

    async fn update_by_id(&self, _id: Uuid, _update: Update) -> Result<UpdateResult, StoreError> {
        Err(StoreError::Unsupported("update_by_id"))
    }

    async fn delete_one(
        &self,
        _filter: &Filter,
        _order: MatchOrder,
    ) -> Result<DeleteResult, StoreError> {
        Err(StoreError::Unsupported("delete_one"))
    }
}
