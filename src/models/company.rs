use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A rated company, as stored in the `companies` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub overall_rating: f64,
    #[serde(default)]
    pub total_reviews: u32,
}

impl Company {
    pub fn aggregate(&self) -> CompanyAggregate {
        CompanyAggregate {
            overall_rating: self.overall_rating,
            total_reviews: self.total_reviews,
        }
    }

    /// Zero reviews is "no ratings yet", never a zero-star rating.
    pub fn rating_display(&self) -> RatingDisplay {
        self.aggregate().display()
    }
}

/// The rating pair of a company. The two values only ever move together.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CompanyAggregate {
    pub overall_rating: f64,
    pub total_reviews: u32,
}

impl CompanyAggregate {
    pub fn display(&self) -> RatingDisplay {
        if self.total_reviews == 0 {
            RatingDisplay::NoRatings
        } else {
            RatingDisplay::Rated {
                overall_rating: self.overall_rating,
                total_reviews: self.total_reviews,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingDisplay {
    NoRatings,
    Rated { overall_rating: f64, total_reviews: u32 },
}

impl std::fmt::Display for RatingDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RatingDisplay::NoRatings => write!(f, "No ratings yet"),
            RatingDisplay::Rated {
                overall_rating,
                total_reviews,
            } => {
                let noun = if *total_reviews == 1 { "review" } else { "reviews" };
                write!(f, "{:.1} ★ ({} {})", overall_rating, total_reviews, noun)
            }
        }
    }
}

/// Partial update merged over embedded company copies.
///
/// Only built from a [`CompanyAggregate`], so a patch can never carry the
/// average without the review count.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyPatch {
    fields: Map<String, Value>,
}

impl CompanyPatch {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl From<CompanyAggregate> for CompanyPatch {
    fn from(aggregate: CompanyAggregate) -> Self {
        let mut fields = Map::new();
        fields.insert(
            "overall_rating".to_string(),
            serde_json::json!(aggregate.overall_rating),
        );
        fields.insert(
            "total_reviews".to_string(),
            serde_json::json!(aggregate.total_reviews),
        );
        Self { fields }
    }
}
