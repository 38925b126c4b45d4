use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::connectors::errors::ConnectorError;
use crate::models::{CategoryScores, CompanyAggregate, RateCategory, Rating, UserRating};

/// Row of the `user_ratings` table: one overall column plus one nullable
/// column per category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRatingRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    #[serde(default)]
    pub overall_rating: Option<f64>,
    #[serde(flatten)]
    pub scores: CategoryColumns,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryColumns {
    #[serde(default)]
    pub usability_rating: Option<u8>,
    #[serde(default)]
    pub support_rating: Option<u8>,
    #[serde(default)]
    pub fees_rating: Option<u8>,
    #[serde(default)]
    pub payouts_rating: Option<u8>,
    #[serde(default)]
    pub reliability_rating: Option<u8>,
    #[serde(default)]
    pub transparency_rating: Option<u8>,
}

impl CategoryColumns {
    fn slot(&mut self, category: RateCategory) -> &mut Option<u8> {
        match category {
            RateCategory::Usability => &mut self.usability_rating,
            RateCategory::Support => &mut self.support_rating,
            RateCategory::Fees => &mut self.fees_rating,
            RateCategory::Payouts => &mut self.payouts_rating,
            RateCategory::Reliability => &mut self.reliability_rating,
            RateCategory::Transparency => &mut self.transparency_rating,
        }
    }

    fn get(&self, category: RateCategory) -> Option<u8> {
        match category {
            RateCategory::Usability => self.usability_rating,
            RateCategory::Support => self.support_rating,
            RateCategory::Fees => self.fees_rating,
            RateCategory::Payouts => self.payouts_rating,
            RateCategory::Reliability => self.reliability_rating,
            RateCategory::Transparency => self.transparency_rating,
        }
    }

    fn to_scores(&self) -> Result<CategoryScores, ConnectorError> {
        let mut scores = CategoryScores::new();
        for category in RateCategory::ALL {
            if let Some(value) = self.get(category) {
                scores
                    .set(category, value)
                    .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;
            }
        }
        Ok(scores)
    }
}

impl From<&CategoryScores> for CategoryColumns {
    fn from(scores: &CategoryScores) -> Self {
        let mut columns = CategoryColumns::default();
        for (category, value) in scores.rated() {
            *columns.slot(category) = Some(value);
        }
        columns
    }
}

impl TryFrom<UserRatingRow> for UserRating {
    type Error = ConnectorError;

    fn try_from(row: UserRatingRow) -> Result<Self, Self::Error> {
        let scores = row.scores.to_scores()?;
        let rating = if !scores.is_unrated() {
            Rating::Categories(scores)
        } else {
            let overall = row.overall_rating.ok_or_else(|| {
                ConnectorError::InvalidResponse(format!("rating {} has no scores", row.id))
            })?;
            Rating::overall(overall.round() as u8)
                .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?
        };

        Ok(UserRating {
            id: row.id,
            user_id: row.user_id,
            company_id: row.company_id,
            rating,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Body of the `submit_company_rating` procedure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmitRatingRequest {
    pub user_id: Uuid,
    pub company_id: Uuid,
    /// Existing row to update; a new row is inserted when absent
    pub rating_id: Option<Uuid>,
    pub overall_rating: Option<u8>,
    #[serde(flatten)]
    pub scores: CategoryColumns,
}

impl SubmitRatingRequest {
    pub fn new(
        user_id: Uuid,
        company_id: Uuid,
        rating: &Rating,
        rating_id: Option<Uuid>,
    ) -> Self {
        let (overall_rating, scores) = match rating {
            Rating::Overall(score) => (Some(score.get()), CategoryColumns::default()),
            Rating::Categories(scores) => (None, CategoryColumns::from(scores)),
        };

        Self {
            user_id,
            company_id,
            rating_id,
            overall_rating,
            scores,
        }
    }
}

/// PostgREST returns procedure results either as an object or as a one-row
/// array depending on how the function is declared.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum AggregateResponse {
    Row(CompanyAggregate),
    Rows(Vec<CompanyAggregate>),
}

impl AggregateResponse {
    pub(crate) fn into_aggregate(self) -> Option<CompanyAggregate> {
        match self {
            AggregateResponse::Row(row) => Some(row),
            AggregateResponse::Rows(rows) => rows.into_iter().next(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct IncrementClickRequest {
    pub deal_id: Uuid,
}

#[derive(Debug, Serialize)]
pub(crate) struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignUpResponse {
    #[serde(default, alias = "id")]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub confirmation_sent_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> UserRatingRow {
        UserRatingRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..Default::default()
        }
    }

    #[test]
    fn row_with_categories_becomes_category_rating() {
        let mut r = row();
        r.overall_rating = Some(4.5);
        r.scores.usability_rating = Some(4);
        r.scores.fees_rating = Some(5);

        match UserRating::try_from(r).unwrap().rating {
            Rating::Categories(scores) => {
                assert_eq!(scores.get(RateCategory::Usability), Some(4));
                assert_eq!(scores.get(RateCategory::Fees), Some(5));
                assert_eq!(scores.get(RateCategory::Support), None);
            }
            other => panic!("expected categories, got {:?}", other),
        }
    }

    #[test]
    fn row_with_overall_only_becomes_quick_rating() {
        let mut r = row();
        r.overall_rating = Some(3.0);
        assert_eq!(UserRating::try_from(r).unwrap().rating, Rating::overall(3).unwrap());
    }

    #[test]
    fn empty_row_is_invalid() {
        assert!(matches!(
            UserRating::try_from(row()),
            Err(ConnectorError::InvalidResponse(_))
        ));
    }

    #[test]
    fn submit_request_carries_one_mode() {
        let scores = CategoryScores::new()
            .with(RateCategory::Usability, 4)
            .unwrap()
            .with(RateCategory::Support, 0)
            .unwrap();
        let request = SubmitRatingRequest::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            &Rating::Categories(scores),
            None,
        );
        let body = serde_json::to_value(&request).unwrap();
        assert!(body["overall_rating"].is_null());
        assert_eq!(body["usability_rating"], 4);
        assert!(body["support_rating"].is_null());
        assert!(body["rating_id"].is_null());
    }

    #[test]
    fn aggregate_response_accepts_object_or_rows() {
        let one: AggregateResponse =
            serde_json::from_str(r#"{"overall_rating": 4.1, "total_reviews": 10}"#).unwrap();
        let rows: AggregateResponse =
            serde_json::from_str(r#"[{"overall_rating": 4.1, "total_reviews": 10}]"#).unwrap();
        let expected = CompanyAggregate {
            overall_rating: 4.1,
            total_reviews: 10,
        };
        assert_eq!(one.into_aggregate(), Some(expected));
        assert_eq!(rows.into_aggregate(), Some(expected));
    }
}
