use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::clock::Clock;
use crate::credentials::error::{CodecError, DocumentError, MalformedField};
use crate::credentials::wire::{WireDocument, WireField};

pub type CredentialsId = Uuid;

/// Stored field names.
pub mod fields {
    pub const ID: &str = "_id";
    pub const EMAIL: &str = "email";
    pub const HASH: &str = "hash";
    pub const SALT: &str = "salt";
    pub const VALIDATED: &str = "validated";
    pub const CREATED: &str = "ts_created";
    pub const UPDATED: &str = "ts_updated";
    pub const EXPIRES: &str = "ts_toexpire";
}

/// Credentials record in the credentials collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialsDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<CredentialsId>,    // assigned by the store on insert
    pub email: String,                // login address
    #[serde(skip_serializing)]
    pub hash: Vec<u8>,                // salted password hash, never exposed in JSON
    #[serde(skip_serializing)]
    pub salt: Vec<u8>,                // regenerated with every new hash
    pub validated: bool,              // reset whenever email changes
    #[serde(rename = "ts_created")]
    pub created_at: OffsetDateTime,   // construction time, never mutated
    #[serde(rename = "ts_updated", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(rename = "ts_toexpire", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<OffsetDateTime>,
}

impl CredentialsDocument {
    /// Builds unpersisted credentials. Nothing is validated here; the
    /// collection checks the document against its schema on write.
    pub fn new(
        email: impl Into<String>,
        hash: Vec<u8>,
        salt: Vec<u8>,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            id: None,
            email: email.into(),
            hash,
            salt,
            validated: false,
            created_at: clock.now(),
            updated_at: None,
            expires_at: None,
        }
    }

    /// Changes the login address; the new address has not been validated.
    pub fn set_email(&mut self, email: impl Into<String>, clock: &dyn Clock) {
        self.email = email.into();
        self.validated = false;
        self.touch(clock);
    }

    /// Replaces the password hash together with the salt it was derived with.
    pub fn replace_secret(
        &mut self,
        hash: Vec<u8>,
        salt: Vec<u8>,
        clock: &dyn Clock,
    ) -> Result<(), DocumentError> {
        if salt == self.salt {
            return Err(DocumentError::SaltReused);
        }
        self.hash = hash;
        self.salt = salt;
        self.touch(clock);
        Ok(())
    }

    pub fn mark_validated(&mut self, clock: &dyn Clock) {
        self.validated = true;
        self.touch(clock);
    }

    pub fn set_expiry(&mut self, expires_at: Option<OffsetDateTime>, clock: &dyn Clock) {
        self.expires_at = expires_at;
        self.touch(clock);
    }

    /// Advisory: nothing in the store acts on the expiry yet.
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        self.expires_at.is_some_and(|at| clock.now() > at)
    }

    pub(crate) fn touch(&mut self, clock: &dyn Clock) {
        self.updated_at = Some(clock.now());
    }

    /// Renders the document in its stored shape. `_id` is left out until the
    /// store has assigned one.
    pub fn to_wire(&self) -> WireDocument {
        let mut doc = WireDocument::new();
        if let Some(id) = self.id {
            doc.insert(fields::ID, WireField::ObjectId(id));
        }
        doc.insert(fields::EMAIL, WireField::string(&self.email));
        doc.insert(fields::HASH, WireField::secret(&self.hash));
        doc.insert(fields::SALT, WireField::secret(&self.salt));
        doc.insert(fields::VALIDATED, WireField::Bool(self.validated));
        doc.insert(fields::CREATED, WireField::Timestamp(self.created_at));
        if let Some(ts) = self.updated_at {
            doc.insert(fields::UPDATED, WireField::Timestamp(ts));
        }
        if let Some(ts) = self.expires_at {
            doc.insert(fields::EXPIRES, WireField::Timestamp(ts));
        }
        doc
    }

    /// Rebuilds credentials from a stored document, decoding hash and salt.
    pub fn from_wire(doc: &WireDocument) -> Result<Self, MalformedField> {
        fn required<'a>(doc: &'a WireDocument, key: &str) -> Result<&'a WireField, MalformedField> {
            doc.get(key)
                .ok_or_else(|| MalformedField::new(key, CodecError::Missing))
        }
        fn optional<T>(
            doc: &WireDocument,
            key: &str,
            read: impl Fn(&WireField) -> Result<T, CodecError>,
        ) -> Result<Option<T>, MalformedField> {
            doc.get(key)
                .map(|f| read(f).map_err(|e| MalformedField::new(key, e)))
                .transpose()
        }
        let at = |key: &'static str| move |e: CodecError| MalformedField::new(key, e);

        Ok(Self {
            id: optional(doc, fields::ID, WireField::as_object_id)?,
            email: required(doc, fields::EMAIL)?
                .as_str()
                .map_err(at(fields::EMAIL))?
                .to_owned(),
            hash: required(doc, fields::HASH)?
                .as_secret()
                .map_err(at(fields::HASH))?,
            salt: required(doc, fields::SALT)?
                .as_secret()
                .map_err(at(fields::SALT))?,
            validated: required(doc, fields::VALIDATED)?
                .as_bool()
                .map_err(at(fields::VALIDATED))?,
            // not required by the schema; an absent stamp reads as the epoch
            created_at: optional(doc, fields::CREATED, WireField::as_timestamp)?
                .unwrap_or(OffsetDateTime::UNIX_EPOCH),
            updated_at: optional(doc, fields::UPDATED, WireField::as_timestamp)?,
            expires_at: optional(doc, fields::EXPIRES, WireField::as_timestamp)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, SystemClock};
    use crate::credentials::codec;
    use time::macros::datetime;

    fn secret(fill: u8) -> Vec<u8> {
        vec![fill; 32]
    }

    #[test]
    fn new_stamps_creation_time_from_clock() {
        let clock = FixedClock::new(datetime!(1992-05-28 23:12:11 +05:00));
        let creds = CredentialsDocument::new("matt@hoiland.com", secret(1), secret(2), &clock);

        assert_eq!(creds.created_at, datetime!(1992-05-28 23:12:11 +05:00));
        assert_eq!(creds.email, "matt@hoiland.com");
        assert_eq!(creds.hash, secret(1));
        assert_eq!(creds.salt, secret(2));
        assert!(!creds.validated);
        assert!(creds.id.is_none());
        assert!(creds.updated_at.is_none());
        assert!(creds.expires_at.is_none());
    }

    #[test]
    fn new_with_system_clock_is_recent() {
        let creds = CredentialsDocument::new("a@b.com", secret(1), secret(2), &SystemClock);
        assert!(time::OffsetDateTime::now_utc() - creds.created_at < time::Duration::seconds(1));
    }

    #[test]
    fn set_email_resets_validation() {
        let clock = FixedClock::new(datetime!(2024-01-01 0:00 UTC));
        let mut creds = CredentialsDocument::new("a@b.com", secret(1), secret(2), &clock);
        creds.mark_validated(&clock);
        assert!(creds.validated);

        clock.advance(time::Duration::hours(1));
        creds.set_email("c@d.com", &clock);
        assert!(!creds.validated);
        assert_eq!(creds.updated_at, Some(datetime!(2024-01-01 1:00 UTC)));
        assert_eq!(creds.created_at, datetime!(2024-01-01 0:00 UTC));
    }

    #[test]
    fn replace_secret_requires_fresh_salt() {
        let clock = FixedClock::new(datetime!(2024-01-01 0:00 UTC));
        let mut creds = CredentialsDocument::new("a@b.com", secret(1), secret(2), &clock);

        assert_eq!(
            creds.replace_secret(secret(3), secret(2), &clock),
            Err(DocumentError::SaltReused)
        );
        assert_eq!(creds.hash, secret(1));
        assert!(creds.updated_at.is_none());

        creds.replace_secret(secret(3), secret(4), &clock).unwrap();
        assert_eq!(creds.hash, secret(3));
        assert_eq!(creds.salt, secret(4));
        assert!(creds.updated_at.is_some());
    }

    #[test]
    fn expiry_is_advisory() {
        let clock = FixedClock::new(datetime!(2024-01-01 0:00 UTC));
        let mut creds = CredentialsDocument::new("a@b.com", secret(1), secret(2), &clock);
        assert!(!creds.is_expired(&clock));

        creds.set_expiry(Some(datetime!(2024-02-01 0:00 UTC)), &clock);
        assert!(!creds.is_expired(&clock));
        clock.set(datetime!(2024-03-01 0:00 UTC));
        assert!(creds.is_expired(&clock));
    }

    #[test]
    fn wire_form_hex_wraps_secrets() {
        let clock = FixedClock::new(datetime!(2024-01-01 0:00 UTC));
        let creds = CredentialsDocument::new("a@b.com", vec![0xab; 32], secret(0), &clock);
        let doc = creds.to_wire();

        assert!(!doc.contains_key(fields::ID));
        assert!(!doc.contains_key(fields::UPDATED));
        match doc.get(fields::HASH) {
            Some(WireField::String(v)) => assert_eq!(v.as_str().unwrap(), "ab".repeat(32)),
            other => panic!("unexpected hash field: {other:?}"),
        }
        assert_eq!(CredentialsDocument::from_wire(&doc).unwrap(), creds);
    }

    #[test]
    fn from_wire_reports_undecodable_salt() {
        let clock = FixedClock::new(datetime!(2024-01-01 0:00 UTC));
        let mut doc = CredentialsDocument::new("a@b.com", secret(1), secret(2), &clock).to_wire();
        doc.insert(fields::SALT, WireField::String(codec::frame("not hex at all!!")));

        let err = CredentialsDocument::from_wire(&doc).unwrap_err();
        assert_eq!(err.field, fields::SALT);
        assert!(matches!(err.source, CodecError::InvalidHex(_)));
    }

    #[test]
    fn from_wire_reports_missing_field() {
        let doc = WireDocument::new().with(fields::EMAIL, WireField::string("a@b.com"));
        let err = CredentialsDocument::from_wire(&doc).unwrap_err();
        assert_eq!(err, MalformedField::new(fields::HASH, CodecError::Missing));
    }

    #[test]
    fn from_wire_reads_absent_creation_time_as_epoch() {
        let clock = FixedClock::new(datetime!(2024-01-01 0:00 UTC));
        let mut doc = CredentialsDocument::new("a@b.com", secret(1), secret(2), &clock).to_wire();
        doc.remove(fields::CREATED);

        let creds = CredentialsDocument::from_wire(&doc).unwrap();
        assert_eq!(creds.created_at, OffsetDateTime::UNIX_EPOCH);
        assert_eq!(creds.hash, secret(1));
    }

    #[test]
    fn from_wire_rejects_mistyped_creation_time() {
        let clock = FixedClock::new(datetime!(2024-01-01 0:00 UTC));
        let mut doc = CredentialsDocument::new("a@b.com", secret(1), secret(2), &clock).to_wire();
        doc.insert(fields::CREATED, WireField::Bool(true));

        let err = CredentialsDocument::from_wire(&doc).unwrap_err();
        assert_eq!(err.field, fields::CREATED);
        assert!(matches!(err.source, CodecError::UnexpectedType { .. }));
    }

    #[test]
    fn json_never_carries_secrets() {
        let clock = FixedClock::new(datetime!(2024-01-01 0:00 UTC));
        let creds = CredentialsDocument::new("a@b.com", secret(7), secret(9), &clock);
        let json = serde_json::to_value(&creds).unwrap();

        assert_eq!(json["email"], "a@b.com");
        assert_eq!(json["validated"], false);
        assert!(json.get("hash").is_none());
        assert!(json.get("salt").is_none());
        assert!(json.get("_id").is_none());
        assert!(json.get("ts_created").is_some());
    }
}
