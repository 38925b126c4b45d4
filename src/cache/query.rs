use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use super::key::QueryKey;
use super::store::CacheStore;
use crate::configuration::CacheSettings;
use crate::connectors::{ConnectorError, DataGateway};
use crate::models::{DealsWithCompanies, UserRating};
use crate::services::catalog::{self, DealQuery, DealsPage};

/// How long each class of data stays fresh.
#[derive(Debug, Clone, Copy)]
pub struct Freshness {
    pub lists: Duration,
    pub per_user: Duration,
}

impl From<&CacheSettings> for Freshness {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            lists: Duration::from_secs(settings.deals_stale_secs),
            per_user: Duration::from_secs(settings.user_stale_secs),
        }
    }
}

impl Default for Freshness {
    fn default() -> Self {
        Freshness::from(&CacheSettings::default())
    }
}

/// Read-through access to the cache with stale-while-revalidate.
#[derive(Clone)]
pub struct QueryClient {
    store: Arc<CacheStore>,
    gateway: Arc<dyn DataGateway>,
    freshness: Freshness,
    in_flight: Arc<Mutex<HashSet<QueryKey>>>,
}

impl QueryClient {
    pub fn new(store: Arc<CacheStore>, gateway: Arc<dyn DataGateway>, freshness: Freshness) -> Self {
        Self {
            store,
            gateway,
            freshness,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Fresh entries are served as is. Stale or invalidated entries are
    /// served immediately while one background refresh runs. Missing entries
    /// are fetched in the foreground. A failed fetch leaves the cache alone.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: QueryKey,
        fresh_for: Duration,
        fetcher: F,
    ) -> Result<T, ConnectorError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ConnectorError>> + Send + 'static,
    {
        if let Some(entry) = self.store.get(&key) {
            match serde_json::from_value::<T>((*entry.payload).clone()) {
                Ok(cached) => {
                    if entry.is_stale(fresh_for) {
                        self.revalidate(key, fetcher);
                    }
                    return Ok(cached);
                }
                Err(err) => {
                    tracing::warn!(cache_key = %key, error = %err, "cached payload does not decode, refetching");
                }
            }
        }

        let span = tracing::info_span!("query_fetch", cache_key = %key);
        let value = fetcher().instrument(span).await?;
        let payload = serde_json::to_value(&value)
            .map_err(|err| ConnectorError::Internal(format!("Cache encode failed: {}", err)))?;
        self.store.set(key, payload);
        Ok(value)
    }

    fn revalidate<T, F, Fut>(&self, key: QueryKey, fetcher: F)
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ConnectorError>> + Send + 'static,
    {
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if !in_flight.insert(key.clone()) {
                return;
            }
        }

        let store = self.store.clone();
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            match fetcher().await {
                Ok(value) => match serde_json::to_value(&value) {
                    Ok(payload) => store.set(key.clone(), payload),
                    Err(err) => tracing::warn!(cache_key = %key, error = %err, "background refresh encode failed"),
                },
                Err(err) => {
                    tracing::warn!(cache_key = %key, error = %err, "background refresh failed, keeping stale data");
                }
            }
            in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        });
    }

    pub fn is_refreshing(&self, key: &QueryKey) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    pub async fn deals(&self) -> Result<DealsWithCompanies, ConnectorError> {
        let gateway = self.gateway.clone();
        self.fetch(QueryKey::deals(), self.freshness.lists, move || async move {
            gateway.fetch_deals().await
        })
        .await
    }

    pub async fn deals_page(&self, query: &DealQuery) -> Result<DealsPage, ConnectorError> {
        let gateway = self.gateway.clone();
        let owned = query.clone();
        self.fetch(
            QueryKey::deals_page(query),
            self.freshness.lists,
            move || async move {
                let all = gateway.fetch_deals().await?;
                Ok(catalog::paginate(&all.deals, &owned))
            },
        )
        .await
    }

    pub async fn user_rating(
        &self,
        user_id: Uuid,
        company_id: Uuid,
    ) -> Result<Option<UserRating>, ConnectorError> {
        let gateway = self.gateway.clone();
        self.fetch(
            QueryKey::user_rating(user_id, company_id),
            self.freshness.per_user,
            move || async move { gateway.fetch_user_rating(user_id, company_id).await },
        )
        .await
    }
}
