use uuid::Uuid;

use super::types::SignUpResponse;
use crate::connectors::errors::ConnectorError;
use crate::models::{CompanyAggregate, Deal, DealsWithCompanies, Rating, UserRating};

/// Remote data gateway for the hosted backend.
/// Allows mocking in tests and swapping implementations.
#[async_trait::async_trait]
pub trait DataGateway: Send + Sync {
    /// Active deals, newest first, each joined to its company.
    /// A deal whose company is missing keeps `company: None`.
    async fn fetch_deals(&self) -> Result<DealsWithCompanies, ConnectorError>;

    /// The user's rating of a company, `None` if they never rated it.
    async fn fetch_user_rating(
        &self,
        user_id: Uuid,
        company_id: Uuid,
    ) -> Result<Option<UserRating>, ConnectorError>;

    /// Server-side atomic increment of the click counter.
    async fn increment_deal_click(&self, deal_id: Uuid) -> Result<Deal, ConnectorError>;

    /// Upsert the user's rating and return the recomputed company aggregate.
    /// `existing_rating_id` selects update over insert.
    async fn submit_rating(
        &self,
        user_id: Uuid,
        company_id: Uuid,
        rating: &Rating,
        existing_rating_id: Option<Uuid>,
    ) -> Result<CompanyAggregate, ConnectorError>;

    /// Email/password account registration.
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpResponse, ConnectorError>;
}
