use std::sync::Arc;

use crate::clock::{Clock, FixedClock};
use crate::config::AppConfig;
use crate::credentials::schema::Schema;
use crate::credentials::CredentialsRepository;
use crate::store::memory::MemoryCollection;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
    pub collection: Arc<MemoryCollection>,
    pub credentials: CredentialsRepository<MemoryCollection>,
}

impl AppState {
    pub fn from_parts(config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        let schema =
            Schema::credentials_with(config.store.hash_min_bytes, config.store.salt_min_bytes);
        let collection = Arc::new(MemoryCollection::new(Some(schema)));
        let credentials = CredentialsRepository::new(collection.clone(), clock.clone())
            .with_match_order(config.store.match_order);
        Self {
            config: Arc::new(config),
            clock,
            collection,
            credentials,
        }
    }

    /// Default config on a clock frozen at the unix epoch.
    pub fn fake() -> Self {
        let clock = Arc::new(FixedClock::new(time::OffsetDateTime::UNIX_EPOCH));
        Self::from_parts(AppConfig::default(), clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::StoreConfig;
    use crate::credentials::CredentialsDocument;
    use crate::store::MatchOrder;

    #[tokio::test]
    async fn fake_state_round_trips_credentials() {
        let state = AppState::fake();
        let doc =
            CredentialsDocument::new("a@b.com", vec![1; 32], vec![2; 32], state.clock.as_ref());
        let id = state.credentials.insert(&doc).await.unwrap();

        let found = state.credentials.find_by_id(id).await.unwrap();
        assert_eq!(found.created_at, time::OffsetDateTime::UNIX_EPOCH);
        assert_eq!(state.collection.len().await, 1);
    }

    #[tokio::test]
    async fn config_drives_schema_and_order() {
        let config = AppConfig {
            store: StoreConfig {
                hash_min_bytes: 64,
                match_order: MatchOrder::Oldest,
                ..StoreConfig::default()
            },
            ..AppConfig::default()
        };
        let state = AppState::from_parts(config, Arc::new(SystemClock));
        assert_eq!(state.credentials.match_order(), MatchOrder::Oldest);

        let doc =
            CredentialsDocument::new("a@b.com", vec![1; 32], vec![2; 32], state.clock.as_ref());
        assert!(state.credentials.insert(&doc).await.is_err());
    }
}
