use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::connector::DataGateway;
use super::join::join_deals;
use super::types::SignUpResponse;
use crate::connectors::errors::ConnectorError;
use crate::models::{Company, CompanyAggregate, Deal, DealsWithCompanies, Rating, UserRating};
use crate::services::aggregator::{round_one_decimal, submission_score};

#[derive(Default)]
struct MockState {
    deals: Vec<Deal>,
    companies: HashMap<Uuid, Company>,
    ratings: HashMap<(Uuid, Uuid), UserRating>,
    registered: Vec<String>,
}

/// In-memory backend for tests and offline runs.
///
/// Recomputes company aggregates on every rating write the way the hosted
/// procedure does, and can be told to fail reads or writes.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
    fail_reads: AtomicBool,
    fail_submissions: AtomicBool,
    fail_clicks: AtomicBool,
    submit_delay: Mutex<Option<Duration>>,
    signup_delay: Mutex<Option<Duration>>,
    submit_calls: AtomicUsize,
    read_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_companies(mut self, companies: impl IntoIterator<Item = Company>) -> Self {
        let state = self.state.get_mut();
        for company in companies {
            state.companies.insert(company.id, company);
        }
        self
    }

    pub fn with_deals(mut self, deals: impl IntoIterator<Item = Deal>) -> Self {
        self.state.get_mut().deals.extend(deals);
        self
    }

    pub fn with_rating(mut self, rating: UserRating) -> Self {
        self.state
            .get_mut()
            .ratings
            .insert((rating.user_id, rating.company_id), rating);
        self
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_submissions(&self, fail: bool) {
        self.fail_submissions.store(fail, Ordering::SeqCst);
    }

    pub fn fail_clicks(&self, fail: bool) {
        self.fail_clicks.store(fail, Ordering::SeqCst);
    }

    pub async fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock().await = Some(delay);
    }

    pub async fn set_signup_delay(&self, delay: Duration) {
        *self.signup_delay.lock().await = Some(delay);
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub async fn company(&self, company_id: Uuid) -> Option<Company> {
        self.state.lock().await.companies.get(&company_id).cloned()
    }

    pub async fn deal(&self, deal_id: Uuid) -> Option<Deal> {
        self.state
            .lock()
            .await
            .deals
            .iter()
            .find(|d| d.id == deal_id)
            .cloned()
    }

    pub async fn registered(&self) -> Vec<String> {
        self.state.lock().await.registered.clone()
    }

    fn unavailable(what: &str) -> ConnectorError {
        ConnectorError::ServiceUnavailable(format!("mock backend: {} failed", what))
    }
}

#[async_trait::async_trait]
impl DataGateway for MockBackend {
    async fn fetch_deals(&self) -> Result<DealsWithCompanies, ConnectorError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable("fetch_deals"));
        }

        let state = self.state.lock().await;
        let deals = state.deals.iter().filter(|d| d.is_active).cloned().collect();
        let companies = state.companies.values().cloned().collect();
        Ok(join_deals(deals, companies))
    }

    async fn fetch_user_rating(
        &self,
        user_id: Uuid,
        company_id: Uuid,
    ) -> Result<Option<UserRating>, ConnectorError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable("fetch_user_rating"));
        }

        Ok(self
            .state
            .lock()
            .await
            .ratings
            .get(&(user_id, company_id))
            .cloned())
    }

    async fn increment_deal_click(&self, deal_id: Uuid) -> Result<Deal, ConnectorError> {
        if self.fail_clicks.load(Ordering::SeqCst) {
            return Err(Self::unavailable("increment_deal_click"));
        }

        let mut state = self.state.lock().await;
        let deal = state
            .deals
            .iter_mut()
            .find(|d| d.id == deal_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("Deal {} not found", deal_id)))?;
        deal.clicks += 1;
        Ok(deal.clone())
    }

    async fn submit_rating(
        &self,
        user_id: Uuid,
        company_id: Uuid,
        rating: &Rating,
        existing_rating_id: Option<Uuid>,
    ) -> Result<CompanyAggregate, ConnectorError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.submit_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(Self::unavailable("submit_rating"));
        }

        let mut state = self.state.lock().await;
        let stored = state.ratings.get(&(user_id, company_id));
        let previous = match (existing_rating_id, stored) {
            (None, None) => None,
            (None, Some(_)) => {
                return Err(ConnectorError::HttpError(format!(
                    "backend error 409 Conflict: rating for user {} and company {} already exists",
                    user_id, company_id
                )))
            }
            (Some(id), Some(row)) if row.id == id => Some(submission_score(&row.rating)),
            (Some(id), _) => {
                return Err(ConnectorError::NotFound(format!("Rating {} not found", id)))
            }
        };

        let company = state
            .companies
            .get_mut(&company_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("Company {} not found", company_id)))?;

        let count = company.total_reviews as f64;
        let sum = company.overall_rating * count;
        let score = submission_score(rating);
        let (sum, count) = match previous {
            Some(previous) => (sum - previous + score, count),
            None => (sum + score, count + 1.0),
        };
        company.total_reviews = count as u32;
        company.overall_rating = if count > 0.0 {
            round_one_decimal(sum / count)
        } else {
            0.0
        };
        let aggregate = company.aggregate();

        let now = Utc::now();
        let stored = state
            .ratings
            .entry((user_id, company_id))
            .or_insert_with(|| UserRating {
                id: existing_rating_id.unwrap_or_else(Uuid::new_v4),
                user_id,
                company_id,
                rating: rating.clone(),
                created_at: now,
                updated_at: now,
            });
        stored.rating = rating.clone();
        stored.updated_at = now;

        Ok(aggregate)
    }

    async fn sign_up(&self, email: &str, _password: &str) -> Result<SignUpResponse, ConnectorError> {
        let delay = *self.signup_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.state.lock().await.registered.push(email.to_string());
        Ok(SignUpResponse {
            user_id: Some(Uuid::new_v4()),
            email: Some(email.to_string()),
            confirmation_sent_at: Some(Utc::now()),
        })
    }
}
