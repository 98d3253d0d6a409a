use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::clock::Clock;
use crate::credentials::error::RepoError;
use crate::credentials::repo_types::{fields, CredentialsDocument, CredentialsId};
use crate::credentials::wire::WireDocument;
use crate::store::{Collection, FieldValue, Filter, MatchOrder, Update};

/// Fields an update may touch. `_id` and `ts_created` are never rewritten.
const MUTABLE_FIELDS: [&str; 6] = [
    fields::EMAIL,
    fields::HASH,
    fields::SALT,
    fields::VALIDATED,
    fields::UPDATED,
    fields::EXPIRES,
];

/// CRUD over the credentials collection. Holds no document state; every call
/// goes straight to the collection.
pub struct CredentialsRepository<C: Collection + ?Sized> {
    collection: Arc<C>,
    clock: Arc<dyn Clock>,
    order: MatchOrder,
}

impl<C: Collection + ?Sized> Clone for CredentialsRepository<C> {
    fn clone(&self) -> Self {
        Self {
            collection: Arc::clone(&self.collection),
            clock: Arc::clone(&self.clock),
            order: self.order,
        }
    }
}

impl<C: Collection + ?Sized> CredentialsRepository<C> {
    pub fn new(collection: Arc<C>, clock: Arc<dyn Clock>) -> Self {
        Self {
            collection,
            clock,
            order: MatchOrder::default(),
        }
    }

    /// Sets which document wins when a lookup or delete matches several.
    pub fn with_match_order(mut self, order: MatchOrder) -> Self {
        self.order = order;
        self
    }

    pub fn match_order(&self) -> MatchOrder {
        self.order
    }

    /// Inserts `doc` and returns the id the store assigned. `doc` itself is
    /// left untouched.
    #[instrument(skip(self, doc), fields(email = %doc.email))]
    pub async fn insert(&self, doc: &CredentialsDocument) -> Result<CredentialsId, RepoError> {
        let id = self
            .collection
            .insert_one(doc.to_wire())
            .await
            .map_err(|e| {
                warn!(error = %e, "insert credentials failed");
                RepoError::from(e)
            })?;
        info!(%id, "credentials inserted");
        Ok(id)
    }

    /// Finds the credentials whose `key` equals `value`, picking among
    /// several matches by the repository's match order.
    pub async fn find_by_field(
        &self,
        key: &str,
        value: impl Into<FieldValue>,
    ) -> Result<CredentialsDocument, RepoError> {
        self.find_by_field_ordered(key, value, self.order).await
    }

    #[instrument(skip(self, value))]
    pub async fn find_by_field_ordered(
        &self,
        key: &str,
        value: impl Into<FieldValue>,
        order: MatchOrder,
    ) -> Result<CredentialsDocument, RepoError> {
        let value = value.into();
        let filter = Filter::eq(key, value.clone());
        let wire = self
            .collection
            .find_one(&filter, order)
            .await?
            .ok_or_else(|| {
                debug!(%value, "no credentials matched");
                RepoError::NotFound {
                    key: key.to_owned(),
                }
            })?;

        CredentialsDocument::from_wire(&wire).map_err(|e| {
            error!(error = %e, "stored credentials cannot be decoded");
            RepoError::from(e)
        })
    }

    pub async fn find_by_id(&self, id: CredentialsId) -> Result<CredentialsDocument, RepoError> {
        self.find_by_field(fields::ID, id).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<CredentialsDocument, RepoError> {
        self.find_by_field(fields::EMAIL, email).await
    }

    /// Writes the mutable fields of `doc` over the stored document with the
    /// same id, refreshing `updated_at`, and returns the stored result.
    #[instrument(skip(self, doc), fields(id = ?doc.id))]
    pub async fn update(
        &self,
        doc: &CredentialsDocument,
    ) -> Result<CredentialsDocument, RepoError> {
        let id = doc.id.ok_or(RepoError::MissingId)?;
        let mut updated = doc.clone();
        updated.touch(self.clock.as_ref());

        let wire = updated.to_wire();
        let mut set = WireDocument::new();
        for key in MUTABLE_FIELDS {
            if let Some(value) = wire.get(key) {
                set.insert(key, value.clone());
            }
        }
        let unset = if updated.expires_at.is_none() {
            vec![fields::EXPIRES.to_string()]
        } else {
            Vec::new()
        };

        let res = self
            .collection
            .update_by_id(id, Update { set, unset })
            .await
            .map_err(|e| {
                warn!(error = %e, "update credentials failed");
                RepoError::from(e)
            })?;
        if res.matched == 0 {
            return Err(RepoError::NotFound {
                key: fields::ID.to_owned(),
            });
        }
        info!(%id, modified = res.modified, "credentials updated");
        self.find_by_id(id).await
    }

    /// Deletes the stored copy of `doc`, located by its id.
    pub async fn delete(&self, doc: &CredentialsDocument) -> Result<(), RepoError> {
        let id = doc.id.ok_or(RepoError::MissingId)?;
        self.delete_by_id(id).await
    }

    pub async fn delete_by_id(&self, id: CredentialsId) -> Result<(), RepoError> {
        self.delete_by_field(fields::ID, id).await
    }

    pub async fn delete_by_email(&self, email: &str) -> Result<(), RepoError> {
        self.delete_by_field(fields::EMAIL, email).await
    }

    pub async fn delete_by_field(
        &self,
        key: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), RepoError> {
        self.delete_by_field_ordered(key, value, self.order).await
    }

    #[instrument(skip(self, value))]
    pub async fn delete_by_field_ordered(
        &self,
        key: &str,
        value: impl Into<FieldValue>,
        order: MatchOrder,
    ) -> Result<(), RepoError> {
        let filter = Filter::eq(key, value);
        let res = self.collection.delete_one(&filter, order).await?;
        if res.deleted == 0 {
            return Err(RepoError::NotFound {
                key: key.to_owned(),
            });
        }
        info!("credentials deleted");
        Ok(())
    }
}
