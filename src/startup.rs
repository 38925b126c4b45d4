use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStore, Freshness, QueryClient};
use crate::configuration::Settings;
use crate::connectors::{BackendClient, ConnectorError, DataGateway};
use crate::services::{BrowserOpener, ClickTracker, Notifier, RatingCoordinator, TracingNotifier};

/// Everything a front end needs, wired around one cache store.
pub struct OentexApp {
    pub settings: Settings,
    pub store: Arc<CacheStore>,
    pub gateway: Arc<dyn DataGateway>,
    pub queries: QueryClient,
    pub coordinator: RatingCoordinator,
    pub clicks: ClickTracker,
}

impl OentexApp {
    /// Connect to the configured backend.
    pub fn build(settings: Settings) -> Result<Self, ConnectorError> {
        tracing::info!(base_url = %settings.backend.base_url, "Connecting to backend");
        let gateway: Arc<dyn DataGateway> = Arc::new(BackendClient::new(settings.backend.clone())?);
        Ok(Self::with_gateway(settings, gateway, Arc::new(TracingNotifier)))
    }

    pub fn with_gateway(
        settings: Settings,
        gateway: Arc<dyn DataGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let store = Arc::new(CacheStore::new());
        let queries = QueryClient::new(
            store.clone(),
            gateway.clone(),
            Freshness::from(&settings.cache),
        );
        let coordinator = RatingCoordinator::new(store.clone(), gateway.clone(), notifier);
        let clicks = ClickTracker::new(gateway.clone(), Arc::new(BrowserOpener));

        Self {
            settings,
            store,
            gateway,
            queries,
            coordinator,
            clicks,
        }
    }

    pub fn signup_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.auth.signup_timeout_secs)
    }
}
