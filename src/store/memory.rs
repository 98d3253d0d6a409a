use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{Collection, DeleteResult, Filter, MatchOrder, StoreError, Update, UpdateResult};
use crate::credentials::error::SchemaViolation;
use crate::credentials::repo_types::fields;
use crate::credentials::schema::Schema;
use crate::credentials::wire::{WireDocument, WireField};

/// In-process collection. Keeps documents in insertion order and, when given
/// a schema, validates every write the way the real store does.
#[derive(Debug)]
pub struct MemoryCollection {
    docs: RwLock<Vec<WireDocument>>,
    schema: Option<Schema>,
    available: AtomicBool,
}

impl MemoryCollection {
    pub fn new(schema: Option<Schema>) -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
            schema,
            available: AtomicBool::new(true),
        }
    }

    /// Collection guarded by the default credentials schema.
    pub fn credentials() -> Self {
        Self::new(Some(Schema::credentials()))
    }

    /// While unavailable every operation fails with `StoreError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("collection is offline".into()))
        }
    }

    fn validate(&self, doc: &WireDocument) -> Result<(), StoreError> {
        match &self.schema {
            Some(schema) => schema.validate(doc).map_err(StoreError::Rejected),
            None => Ok(()),
        }
    }
}

fn id_of(doc: &WireDocument) -> Option<Uuid> {
    doc.get(fields::ID).and_then(|f| f.as_object_id().ok())
}

fn recency(doc: &WireDocument) -> Option<OffsetDateTime> {
    doc.get(fields::UPDATED)
        .or_else(|| doc.get(fields::CREATED))
        .and_then(|f| f.as_timestamp().ok())
}

fn select(docs: &[WireDocument], filter: &Filter, order: MatchOrder) -> Option<usize> {
    let mut matching = docs
        .iter()
        .enumerate()
        .filter(|(_, doc)| filter.matches(doc));
    let picked = match order {
        MatchOrder::Oldest => matching.next(),
        MatchOrder::Newest => matching.last(),
        MatchOrder::LatestTimestamp => matching.max_by_key(|(_, doc)| recency(doc)),
    };
    picked.map(|(idx, _)| idx)
}

#[async_trait]
impl Collection for MemoryCollection {
    async fn insert_one(&self, doc: WireDocument) -> Result<Uuid, StoreError> {
        self.ensure_available()?;
        self.validate(&doc)?;

        let mut docs = self.docs.write().await;
        let id = match doc.get(fields::ID) {
            Some(field) => field.as_object_id().map_err(|e| {
                StoreError::Rejected(SchemaViolation::new(fields::ID, e.to_string()))
            })?,
            None => Uuid::new_v4(),
        };
        if docs.iter().any(|d| id_of(d) == Some(id)) {
            return Err(StoreError::DuplicateId(id));
        }

        let mut stored = WireDocument::new().with(fields::ID, WireField::ObjectId(id));
        for (key, value) in doc.iter().filter(|(k, _)| *k != fields::ID) {
            stored.insert(key, value.clone());
        }
        docs.push(stored);
        debug!(%id, count = docs.len(), "document inserted");
        Ok(id)
    }

    async fn find_one(
        &self,
        filter: &Filter,
        order: MatchOrder,
    ) -> Result<Option<WireDocument>, StoreError> {
        self.ensure_available()?;
        let docs = self.docs.read().await;
        Ok(select(&docs, filter, order).map(|idx| docs[idx].clone()))
    }

    async fn update_by_id(&self, id: Uuid, update: Update) -> Result<UpdateResult, StoreError> {
        self.ensure_available()?;
        let mut docs = self.docs.write().await;
        let Some(idx) = docs.iter().position(|d| id_of(d) == Some(id)) else {
            return Ok(UpdateResult::default());
        };

        let mut merged = docs[idx].clone();
        for (key, value) in update.set.iter() {
            if key == fields::ID && value.as_object_id().ok() != Some(id) {
                return Err(StoreError::Rejected(SchemaViolation::new(
                    fields::ID,
                    "_id is immutable",
                )));
            }
            merged.insert(key, value.clone());
        }
        for key in &update.unset {
            merged.remove(key);
        }
        self.validate(&merged)?;

        let modified = u64::from(merged != docs[idx]);
        docs[idx] = merged;
        debug!(%id, modified, "document updated");
        Ok(UpdateResult {
            matched: 1,
            modified,
        })
    }

    async fn delete_one(
        &self,
        filter: &Filter,
        order: MatchOrder,
    ) -> Result<DeleteResult, StoreError> {
        self.ensure_available()?;
        let mut docs = self.docs.write().await;
        let Some(idx) = select(&docs, filter, order) else {
            return Ok(DeleteResult::default());
        };
        docs.remove(idx);
        debug!(key = %filter.key, "document deleted");
        Ok(DeleteResult { deleted: 1 })
    }
}
