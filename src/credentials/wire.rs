use time::OffsetDateTime;
use uuid::Uuid;

use crate::credentials::codec::{self, WireValue};
use crate::credentials::error::CodecError;

/// One typed value inside a stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireField {
    ObjectId(Uuid),
    String(WireValue),
    Bool(bool),
    Timestamp(OffsetDateTime),
}

impl WireField {
    pub fn string(s: &str) -> Self {
        WireField::String(codec::frame(s))
    }

    pub fn secret(bytes: &[u8]) -> Self {
        WireField::String(codec::encode(bytes))
    }

    /// Store type name, as used in validation rules.
    pub fn kind(&self) -> &'static str {
        match self {
            WireField::ObjectId(_) => "objectId",
            WireField::String(_) => "string",
            WireField::Bool(_) => "bool",
            WireField::Timestamp(_) => "timestamp",
        }
    }

    pub fn as_object_id(&self) -> Result<Uuid, CodecError> {
        match self {
            WireField::ObjectId(id) => Ok(*id),
            other => Err(other.unexpected("objectId")),
        }
    }

    pub fn as_str(&self) -> Result<&str, CodecError> {
        match self {
            WireField::String(v) => v.as_str(),
            other => Err(other.unexpected("string")),
        }
    }

    pub fn as_secret(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            WireField::String(v) => codec::decode(v.as_bytes()),
            other => Err(other.unexpected("string")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, CodecError> {
        match self {
            WireField::Bool(b) => Ok(*b),
            other => Err(other.unexpected("bool")),
        }
    }

    pub fn as_timestamp(&self) -> Result<OffsetDateTime, CodecError> {
        match self {
            WireField::Timestamp(ts) => Ok(*ts),
            other => Err(other.unexpected("timestamp")),
        }
    }

    fn unexpected(&self, expected: &'static str) -> CodecError {
        CodecError::UnexpectedType {
            expected,
            found: self.kind(),
        }
    }
}

/// A document as the store holds it: named fields in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireDocument {
    fields: Vec<(String, WireField)>,
}

impl WireDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: WireField) {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: WireField) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&WireField> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<WireField> {
        let idx = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WireField)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
