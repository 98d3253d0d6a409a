//! Validation rules the credentials collection applies to every write.
//!
//! Rules are plain data so the same set can be checked in process (see
//! [`crate::store::memory::MemoryCollection`]) and rendered as a `$jsonSchema`
//! validator for a real collection.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::credentials::error::SchemaViolation;
use crate::credentials::repo_types::fields;
use crate::credentials::wire::{WireDocument, WireField};

/// Minimum number of bytes in a stored hash.
pub const HASH_MIN_LENGTH: usize = 32;
/// Minimum number of bytes in a stored salt.
pub const SALT_MIN_LENGTH: usize = 32;

const EMAIL_PATTERN: &str = r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#;
const HEX_PATTERN: &str = r"^[0-9a-fA-F]+$";

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(EMAIL_PATTERN).unwrap();
    static ref HEX_RE: Regex = Regex::new(HEX_PATTERN).unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[derive(Debug, Clone)]
pub enum Constraint {
    /// Store type name, see [`WireField::kind`].
    Kind(&'static str),
    /// Minimum string length in characters.
    MinLength(usize),
    /// The whole string must match.
    Pattern(&'static Regex),
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub name: &'static str,
    pub required: bool,
    pub constraints: Vec<Constraint>,
}

impl FieldRule {
    pub fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            constraints: Vec::new(),
        }
    }

    pub fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            constraints: Vec::new(),
        }
    }

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn check(&self, value: &WireField) -> Result<(), SchemaViolation> {
        let violation = |reason: String| SchemaViolation::new(self.name, reason);
        for constraint in &self.constraints {
            match constraint {
                Constraint::Kind(kind) => {
                    if value.kind() != *kind {
                        return Err(violation(format!(
                            "expected {kind}, found {}",
                            value.kind()
                        )));
                    }
                }
                Constraint::MinLength(min) => {
                    let s = value
                        .as_str()
                        .map_err(|e| violation(format!("unreadable string: {e}")))?;
                    let len = s.chars().count();
                    if len < *min {
                        return Err(violation(format!(
                            "length {len} is below the minimum of {min}"
                        )));
                    }
                }
                Constraint::Pattern(re) => {
                    let s = value
                        .as_str()
                        .map_err(|e| violation(format!("unreadable string: {e}")))?;
                    if !re.is_match(s) {
                        return Err(violation(format!(
                            "does not match pattern {}",
                            re.as_str()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Declarative rule set for one collection.
#[derive(Debug, Clone)]
pub struct Schema {
    rules: Vec<FieldRule>,
    additional_properties: bool,
}

impl Schema {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self {
            rules,
            additional_properties: true,
        }
    }

    /// Rejects documents carrying fields that no rule declares.
    pub fn deny_unknown_fields(mut self) -> Self {
        self.additional_properties = false;
        self
    }

    /// Rules for the credentials collection with the default minimum lengths.
    pub fn credentials() -> Self {
        Self::credentials_with(HASH_MIN_LENGTH, SALT_MIN_LENGTH)
    }

    /// Rules for the credentials collection. Minimums are in bytes; the
    /// stored hex strings must be twice as long.
    pub fn credentials_with(hash_min_bytes: usize, salt_min_bytes: usize) -> Self {
        let secret = |name, min_bytes: usize| {
            FieldRule::required(name)
                .with(Constraint::Kind("string"))
                .with(Constraint::MinLength(min_bytes * 2))
                .with(Constraint::Pattern(&HEX_RE))
        };
        let timestamp = |name| FieldRule::optional(name).with(Constraint::Kind("timestamp"));

        Self::new(vec![
            FieldRule::optional(fields::ID).with(Constraint::Kind("objectId")),
            FieldRule::required(fields::EMAIL)
                .with(Constraint::Kind("string"))
                .with(Constraint::Pattern(&EMAIL_RE)),
            secret(fields::HASH, hash_min_bytes),
            secret(fields::SALT, salt_min_bytes),
            FieldRule::required(fields::VALIDATED).with(Constraint::Kind("bool")),
            timestamp(fields::CREATED),
            timestamp(fields::UPDATED),
            timestamp(fields::EXPIRES),
        ])
        .deny_unknown_fields()
    }

    /// Checks rules in declaration order, then unknown fields in document
    /// order. The first violation found is returned.
    pub fn validate(&self, doc: &WireDocument) -> Result<(), SchemaViolation> {
        for rule in &self.rules {
            match doc.get(rule.name) {
                Some(value) => rule.check(value)?,
                None if rule.required => {
                    return Err(SchemaViolation::new(rule.name, "required field is missing"))
                }
                None => {}
            }
        }

        if !self.additional_properties {
            if let Some((key, _)) = doc
                .iter()
                .find(|(key, _)| !self.rules.iter().any(|r| r.name == *key))
            {
                return Err(SchemaViolation::new(key, "field is not allowed"));
            }
        }
        Ok(())
    }

    /// Renders the rules as a `$jsonSchema` collection validator.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for rule in &self.rules {
            let mut prop = Map::new();
            for constraint in &rule.constraints {
                match constraint {
                    Constraint::Kind(kind) => {
                        prop.insert("bsonType".into(), json!(kind));
                    }
                    Constraint::MinLength(min) => {
                        prop.insert("minLength".into(), json!(min));
                    }
                    Constraint::Pattern(re) => {
                        prop.insert("pattern".into(), json!(re.as_str()));
                    }
                }
            }
            properties.insert(rule.name.into(), Value::Object(prop));
        }

        let required: Vec<&str> = self
            .rules
            .iter()
            .filter(|r| r.required)
            .map(|r| r.name)
            .collect();

        json!({
            "$jsonSchema": {
                "bsonType": "object",
                "required": required,
                "properties": properties,
                "additionalProperties": self.additional_properties,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::credentials::codec;
    use crate::credentials::repo_types::CredentialsDocument;
    use time::macros::datetime;

    fn valid_doc() -> WireDocument {
        let clock = FixedClock::new(datetime!(2024-01-01 0:00 UTC));
        CredentialsDocument::new("user@example.com", vec![0x11; 32], vec![0x22; 32], &clock)
            .to_wire()
    }

    fn violation_field(doc: &WireDocument) -> String {
        Schema::credentials().validate(doc).unwrap_err().field
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(is_valid_email("user@[192.168.0.1]"));
        assert!(is_valid_email("\"odd local\"@example.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("user@example.c"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spa ce@example.com"));
    }

    #[test]
    fn accepts_a_fresh_document() {
        assert_eq!(Schema::credentials().validate(&valid_doc()), Ok(()));
    }

    #[test]
    fn rejects_short_hash() {
        let mut doc = valid_doc();
        doc.insert(fields::HASH, WireField::String(codec::frame(&"a".repeat(62))));
        let err = Schema::credentials().validate(&doc).unwrap_err();
        assert_eq!(err.field, "hash");
        assert!(err.reason.contains("62"));
    }

    #[test]
    fn rejects_non_hex_salt() {
        let mut doc = valid_doc();
        let mut salt = "0".repeat(63);
        salt.push('g');
        doc.insert(fields::SALT, WireField::String(codec::frame(&salt)));
        assert_eq!(violation_field(&doc), "salt");
    }

    #[test]
    fn rejects_bad_email() {
        let mut doc = valid_doc();
        doc.insert(fields::EMAIL, WireField::string("not-an-email"));
        assert_eq!(violation_field(&doc), "email");
    }

    #[test]
    fn rejects_missing_required_field() {
        let mut doc = valid_doc();
        doc.remove(fields::VALIDATED);
        let err = Schema::credentials().validate(&doc).unwrap_err();
        assert_eq!(err.field, "validated");
        assert_eq!(err.reason, "required field is missing");
    }

    #[test]
    fn rejects_wrong_kind() {
        let mut doc = valid_doc();
        doc.insert(fields::VALIDATED, WireField::string("false"));
        assert_eq!(violation_field(&doc), "validated");
    }

    #[test]
    fn rejects_unknown_field() {
        let doc = valid_doc().with("password", WireField::string("hunter2"));
        let err = Schema::credentials().validate(&doc).unwrap_err();
        assert_eq!(err.field, "password");
    }

    #[test]
    fn rejects_broken_framing() {
        let mut doc = valid_doc();
        doc.insert(
            fields::HASH,
            WireField::String(codec::WireValue::from_raw(vec![9u8, 0, 0, 0, b'a'])),
        );
        let err = Schema::credentials().validate(&doc).unwrap_err();
        assert_eq!(err.field, "hash");
        assert!(err.reason.starts_with("unreadable string"));
    }

    #[test]
    fn custom_minimums_scale_to_hex_length() {
        let clock = FixedClock::new(datetime!(2024-01-01 0:00 UTC));
        let doc = CredentialsDocument::new("a@b.com", vec![1; 16], vec![2; 16], &clock).to_wire();
        assert!(Schema::credentials().validate(&doc).is_err());
        assert!(Schema::credentials_with(16, 16).validate(&doc).is_ok());
    }

    #[test]
    fn renders_json_schema() {
        let schema = Schema::credentials().to_json_schema();
        let inner = &schema["$jsonSchema"];

        assert_eq!(inner["bsonType"], "object");
        assert_eq!(
            inner["required"],
            json!(["email", "hash", "salt", "validated"])
        );
        assert_eq!(inner["additionalProperties"], false);
        assert_eq!(inner["properties"]["hash"]["minLength"], 64);
        assert_eq!(inner["properties"]["salt"]["pattern"], HEX_PATTERN);
        assert_eq!(inner["properties"]["_id"]["bsonType"], "objectId");
        assert_eq!(inner["properties"]["ts_toexpire"]["bsonType"], "timestamp");
    }
}
