use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use super::connector::DataGateway;
use super::join::from_cards;
use super::types::{
    AggregateResponse, IncrementClickRequest, SignUpRequest, SignUpResponse, SubmitRatingRequest,
    UserRatingRow,
};
use crate::connectors::config::BackendConfig;
use crate::connectors::errors::ConnectorError;
use crate::models::{CompanyAggregate, Deal, DealCard, DealsWithCompanies, Rating, UserRating};

const BASE_BACKOFF_MS: u64 = 100;
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Delay before retry number `attempt`, doubling from 100ms up to a 5s cap.
fn backoff_delay(attempt: usize) -> Duration {
    let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    let factor = 1_u64.checked_shl(exponent).unwrap_or(u64::MAX);
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(factor)).min(MAX_BACKOFF)
}

/// HTTP client for the hosted backend's REST and auth endpoints
pub struct BackendClient {
    base_url: String,
    http_client: reqwest::Client,
    api_key: Option<String>,
    access_token: Option<String>,
    retry_attempts: usize,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self, ConnectorError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("oentex/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ConnectorError::Internal(format!("HTTP client error: {}", err)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
            api_key: config.api_key,
            access_token: config.access_token,
            retry_attempts: config.retry_attempts.max(1),
        })
    }

    /// Use the signed-in user's token instead of the public key for
    /// `Authorization`.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn bearer(&self) -> Option<String> {
        self.access_token
            .as_ref()
            .or(self.api_key.as_ref())
            .map(|token| format!("Bearer {}", token))
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http_client
            .request(method, format!("{}{}", self.base_url, path));

        if let Some(key) = &self.api_key {
            builder = builder.header("apikey", key);
        }
        if let Some(auth) = self.bearer() {
            builder = builder.header("Authorization", auth);
        }
        builder
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ConnectorError> {
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|err| ConnectorError::HttpError(err.to_string()))?;

        if !status.is_success() {
            return Err(ConnectorError::from_status(status, text));
        }

        serde_json::from_str::<T>(&text).map_err(|_| ConnectorError::InvalidResponse(text))
    }

    /// GET with retry and exponential backoff on transient failures.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ConnectorError> {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let span = tracing::info_span!("backend_http_get", path, attempt);

            let result = match self
                .request(Method::GET, path)
                .query(query)
                .send()
                .instrument(span)
                .await
            {
                Ok(resp) => Self::decode::<T>(resp).await,
                Err(err) => Err(ConnectorError::from(err)),
            };

            match result {
                Err(err) if err.is_transient() && attempt < self.retry_attempts => {
                    tracing::debug!(error = %err, path, attempt, "retrying backend read");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
                other => return other,
            }
        }
    }

    /// Single-attempt POST; mutations are never replayed.
    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ConnectorError> {
        let span = tracing::info_span!("backend_http_post", path);
        let resp = self
            .request(Method::POST, path)
            .json(body)
            .send()
            .instrument(span)
            .await
            .map_err(|err| {
                tracing::error!("backend POST {} failed: {:?}", path, err);
                ConnectorError::from(err)
            })?;

        Self::decode(resp).await
    }
}

#[async_trait::async_trait]
impl DataGateway for BackendClient {
    async fn fetch_deals(&self) -> Result<DealsWithCompanies, ConnectorError> {
        // companies are embedded through the deals.company_id foreign key
        let cards: Vec<DealCard> = self
            .get(
                "/rest/v1/deals",
                &[
                    ("select", "*,company:companies(*)".to_string()),
                    ("is_active", "eq.true".to_string()),
                    ("order", "created_at.desc".to_string()),
                ],
            )
            .await?;

        let catalog = from_cards(cards);
        tracing::debug!(
            deals = catalog.deals.len(),
            companies = catalog.companies.len(),
            "fetched deals catalog"
        );

        Ok(catalog)
    }

    async fn fetch_user_rating(
        &self,
        user_id: Uuid,
        company_id: Uuid,
    ) -> Result<Option<UserRating>, ConnectorError> {
        let rows: Vec<UserRatingRow> = self
            .get(
                "/rest/v1/user_ratings",
                &[
                    ("select", "*".to_string()),
                    ("user_id", format!("eq.{}", user_id)),
                    ("company_id", format!("eq.{}", company_id)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        rows.into_iter().next().map(UserRating::try_from).transpose()
    }

    async fn increment_deal_click(&self, deal_id: Uuid) -> Result<Deal, ConnectorError> {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum DealResponse {
            Row(Deal),
            Rows(Vec<Deal>),
        }

        let resp: DealResponse = self
            .post(
                "/rest/v1/rpc/increment_deal_clicks",
                &IncrementClickRequest { deal_id },
            )
            .await?;

        match resp {
            DealResponse::Row(deal) => Ok(deal),
            DealResponse::Rows(rows) => rows
                .into_iter()
                .next()
                .ok_or_else(|| ConnectorError::NotFound(format!("Deal {} not found", deal_id))),
        }
    }

    async fn submit_rating(
        &self,
        user_id: Uuid,
        company_id: Uuid,
        rating: &Rating,
        existing_rating_id: Option<Uuid>,
    ) -> Result<CompanyAggregate, ConnectorError> {
        let body = SubmitRatingRequest::new(user_id, company_id, rating, existing_rating_id);
        let resp: AggregateResponse = self
            .post("/rest/v1/rpc/submit_company_rating", &body)
            .await?;

        resp.into_aggregate().ok_or_else(|| {
            ConnectorError::InvalidResponse(format!(
                "no aggregate returned for company {}",
                company_id
            ))
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpResponse, ConnectorError> {
        self.post("/auth/v1/signup", &SignUpRequest { email, password })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(1), Duration::from_millis(100));
        assert_eq!(backoff_delay(2), Duration::from_millis(200));
        assert_eq!(backoff_delay(6), Duration::from_millis(3200));
        assert_eq!(backoff_delay(7), MAX_BACKOFF);
        assert_eq!(backoff_delay(64), MAX_BACKOFF);
        assert_eq!(backoff_delay(usize::MAX), MAX_BACKOFF);
    }
}
