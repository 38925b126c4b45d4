use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Company;

pub const UNKNOWN_COMPANY: &str = "Unknown Company";

/// A promotional offer, as stored in the `deals` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deal {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Bonus text, e.g. "$200 sign-up bonus"
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub terms: Option<DealTerms>,
    pub affiliate_link: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub commission_rate: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Deal {
    /// Active flag set and `now` inside the optional time window.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.starts_at.map_or(true, |start| start <= now)
            && self.ends_at.map_or(true, |end| now < end)
    }
}

/// Terms are stored either as one free-text blob or as a list of clauses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DealTerms {
    List(Vec<String>),
    Text(String),
}

impl DealTerms {
    pub fn lines(&self) -> Vec<&str> {
        match self {
            DealTerms::List(items) => items.iter().map(String::as_str).collect(),
            DealTerms::Text(text) => text.lines().filter(|l| !l.trim().is_empty()).collect(),
        }
    }
}

/// A deal joined with a snapshot of its company, as shown on a card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DealCard {
    #[serde(flatten)]
    pub deal: Deal,
    #[serde(default)]
    pub company: Option<Company>,
}

impl DealCard {
    pub fn company_name(&self) -> &str {
        self.company
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or(UNKNOWN_COMPANY)
    }
}

/// Result of the deals read: joined cards plus the companies they reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DealsWithCompanies {
    pub deals: Vec<DealCard>,
    pub companies: Vec<Company>,
}
