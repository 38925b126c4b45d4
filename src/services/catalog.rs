use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::DealCard;

pub const DEFAULT_PER_PAGE: usize = 12;
pub const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealSort {
    #[default]
    Newest,
    Rating,
    Popular,
    Commission,
}

impl DealSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealSort::Newest => "newest",
            DealSort::Rating => "rating",
            DealSort::Popular => "popular",
            DealSort::Commission => "commission",
        }
    }
}

impl fmt::Display for DealSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "newest" => Ok(DealSort::Newest),
            "rating" => Ok(DealSort::Rating),
            "popular" => Ok(DealSort::Popular),
            "commission" => Ok(DealSort::Commission),
            other => Err(format!(
                "unknown sort '{}', expected newest, rating, popular or commission",
                other
            )),
        }
    }
}

/// Catalog filters, sort order and page selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: DealSort,
    /// 1-based
    pub page: usize,
    pub per_page: usize,
}

impl Default for DealQuery {
    fn default() -> Self {
        Self {
            category: None,
            search: None,
            sort: DealSort::default(),
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl DealQuery {
    /// Stable parameter string for the cache key.
    pub fn cache_params(&self) -> String {
        let normalize = |value: &Option<String>| {
            value
                .as_deref()
                .map(|v| urlencoding::encode(&v.trim().to_lowercase()).into_owned())
                .unwrap_or_default()
        };

        format!(
            "category={}&search={}&sort={}&page={}&per_page={}",
            normalize(&self.category),
            normalize(&self.search),
            self.sort,
            self.page.max(1),
            self.per_page.clamp(1, MAX_PER_PAGE),
        )
    }

    fn matches(&self, card: &DealCard) -> bool {
        if let Some(category) = self.category.as_deref().filter(|c| !c.trim().is_empty()) {
            let company_category = card.company.as_ref().and_then(|c| c.category.as_deref());
            if !company_category.map_or(false, |c| c.eq_ignore_ascii_case(category.trim())) {
                return false;
            }
        }

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let haystacks = [
                Some(card.deal.title.as_str()),
                card.deal.description.as_deref(),
                Some(card.company_name()),
            ];
            if !haystacks
                .iter()
                .flatten()
                .any(|h| h.to_lowercase().contains(&needle))
            {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealsPage {
    pub items: Vec<DealCard>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

fn compare(sort: DealSort, a: &DealCard, b: &DealCard) -> Ordering {
    let newest = b.deal.created_at.cmp(&a.deal.created_at);
    match sort {
        DealSort::Newest => newest,
        DealSort::Rating => {
            // unrated companies sort after every rated one
            let score = |card: &DealCard| {
                card.company
                    .as_ref()
                    .filter(|c| c.total_reviews > 0)
                    .map(|c| c.overall_rating)
            };
            match (score(a), score(b)) {
                (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then(newest)
        }
        DealSort::Popular => b.deal.clicks.cmp(&a.deal.clicks).then(newest),
        DealSort::Commission => match (a.deal.commission_rate, b.deal.commission_rate) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then(newest),
    }
}

/// Filter, sort and cut one page out of the catalog.
pub fn paginate(cards: &[DealCard], query: &DealQuery) -> DealsPage {
    let per_page = query.per_page.clamp(1, MAX_PER_PAGE);
    let page = query.page.max(1);

    let mut matching: Vec<&DealCard> = cards.iter().filter(|c| query.matches(c)).collect();
    matching.sort_by(|a, b| compare(query.sort, a, b));

    let total = matching.len();
    let total_pages = total.div_ceil(per_page);
    let items = matching
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .cloned()
        .collect();

    DealsPage {
        items,
        page,
        per_page,
        total,
        total_pages,
    }
}
