use std::fmt;
use uuid::Uuid;

use crate::services::catalog::DealQuery;

/// Resource kind half of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKind {
    /// Every active deal joined to its company
    Deals,
    /// One filtered/sorted page of the catalog
    DealsPage,
    /// A user's own rating of one company
    UserRating,
    /// A single company record
    Company,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Deals => "deals",
            QueryKind::DealsPage => "deals_page",
            QueryKind::UserRating => "user_rating",
            QueryKind::Company => "company",
        }
    }
}

/// Composite cache key: resource kind plus serialized parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    kind: QueryKind,
    params: String,
}

impl QueryKey {
    pub fn new(kind: QueryKind, params: impl Into<String>) -> Self {
        Self {
            kind,
            params: params.into(),
        }
    }

    pub fn deals() -> Self {
        Self::new(QueryKind::Deals, "")
    }

    pub fn deals_page(query: &DealQuery) -> Self {
        Self::new(QueryKind::DealsPage, query.cache_params())
    }

    pub fn user_rating(user_id: Uuid, company_id: Uuid) -> Self {
        Self::new(
            QueryKind::UserRating,
            format!("user={}&company={}", user_id, company_id),
        )
    }

    pub fn company(company_id: Uuid) -> Self {
        Self::new(QueryKind::Company, format!("id={}", company_id))
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn params(&self) -> &str {
        &self.params
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            f.write_str(self.kind.as_str())
        } else {
            write!(f, "{}?{}", self.kind.as_str(), self.params)
        }
    }
}
