use std::sync::Arc;

use tracing::Instrument;

use crate::connectors::DataGateway;
use crate::models::Deal;

/// Opens an affiliate link for the user.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Opens links in the system browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserOpener;

impl LinkOpener for BrowserOpener {
    fn open(&self, url: &str) -> std::io::Result<()> {
        webbrowser::open(url)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("could not open {url}: {source}")]
pub struct OpenLinkError {
    pub url: String,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickOutcome {
    /// Counter after the increment, when tracking went through.
    pub clicks: Option<u64>,
}

pub struct ClickTracker {
    gateway: Arc<dyn DataGateway>,
    opener: Arc<dyn LinkOpener>,
}

impl ClickTracker {
    pub fn new(gateway: Arc<dyn DataGateway>, opener: Arc<dyn LinkOpener>) -> Self {
        Self { gateway, opener }
    }

    /// Open the deal's link, then count the click.
    ///
    /// Counting is best effort: a tracking failure is logged and the link is
    /// still considered followed.
    pub async fn follow(&self, deal: &Deal) -> Result<ClickOutcome, OpenLinkError> {
        self.opener
            .open(&deal.affiliate_link)
            .map_err(|source| OpenLinkError {
                url: deal.affiliate_link.clone(),
                source,
            })?;

        let span = tracing::info_span!("track_click", deal_id = %deal.id);
        let clicks = match self
            .gateway
            .increment_deal_click(deal.id)
            .instrument(span)
            .await
        {
            Ok(updated) => Some(updated.clicks),
            Err(err) => {
                tracing::warn!(deal_id = %deal.id, error = %err, "click tracking failed");
                None
            }
        };

        Ok(ClickOutcome { clicks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::MockBackend;
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingOpener {
        opened: Mutex<Vec<String>>,
        fail: bool,
    }

    impl LinkOpener for RecordingOpener {
        fn open(&self, url: &str) -> std::io::Result<()> {
            if self.fail {
                return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no browser"));
            }
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn deal() -> Deal {
        Deal {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            title: "Open an account".to_string(),
            description: None,
            value: None,
            terms: None,
            affiliate_link: "https://partner.example/ref/42".to_string(),
            is_active: true,
            starts_at: None,
            ends_at: None,
            clicks: 7,
            commission_rate: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn counts_the_click_after_opening() {
        let deal = deal();
        let backend = Arc::new(MockBackend::new().with_deals([deal.clone()]));
        let opener = Arc::new(RecordingOpener::default());
        let tracker = ClickTracker::new(backend.clone(), opener.clone());

        let outcome = tracker.follow(&deal).await.unwrap();

        assert_eq!(outcome.clicks, Some(8));
        assert_eq!(*opener.opened.lock().unwrap(), vec![deal.affiliate_link.clone()]);
        assert_eq!(backend.deal(deal.id).await.unwrap().clicks, 8);
    }

    /// The link opens even when the counter cannot be written.
    #[tokio::test]
    async fn tracking_failure_still_opens_link() {
        let deal = deal();
        let backend = Arc::new(MockBackend::new().with_deals([deal.clone()]));
        backend.fail_clicks(true);
        let opener = Arc::new(RecordingOpener::default());
        let tracker = ClickTracker::new(backend, opener.clone());

        let outcome = tracker.follow(&deal).await.unwrap();

        assert_eq!(outcome.clicks, None);
        assert_eq!(opener.opened.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn open_failure_is_reported_and_not_counted() {
        let deal = deal();
        let backend = Arc::new(MockBackend::new().with_deals([deal.clone()]));
        let opener = Arc::new(RecordingOpener {
            fail: true,
            ..Default::default()
        });
        let tracker = ClickTracker::new(backend.clone(), opener);

        let err = tracker.follow(&deal).await.unwrap_err();

        assert_eq!(err.url, deal.affiliate_link);
        assert_eq!(backend.deal(deal.id).await.unwrap().clicks, 7);
    }
}
