use crate::models::{self, CategoryScores, RateCategory, RatingValidationError};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;

/// Rating form as posted by the rating dialog.
///
/// Quick mode fills `overall_rating`, detailed mode fills `categories`.
/// Exactly one of the two must be present.
#[derive(Serialize, Deserialize, Debug, Default, Validate)]
pub struct RatingForm {
    #[validate(minimum = 1)]
    #[validate(maximum = 5)]
    pub overall_rating: Option<u8>,
    #[validate]
    pub categories: Option<CategoryScoresForm>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Validate)]
pub struct CategoryScoresForm {
    #[validate(maximum = 5)]
    pub usability: Option<u8>,
    #[validate(maximum = 5)]
    pub support: Option<u8>,
    #[validate(maximum = 5)]
    pub fees: Option<u8>,
    #[validate(maximum = 5)]
    pub payouts: Option<u8>,
    #[validate(maximum = 5)]
    pub reliability: Option<u8>,
    #[validate(maximum = 5)]
    pub transparency: Option<u8>,
}

impl CategoryScoresForm {
    pub fn set(&mut self, category: RateCategory, value: u8) {
        let slot = match category {
            RateCategory::Usability => &mut self.usability,
            RateCategory::Support => &mut self.support,
            RateCategory::Fees => &mut self.fees,
            RateCategory::Payouts => &mut self.payouts,
            RateCategory::Reliability => &mut self.reliability,
            RateCategory::Transparency => &mut self.transparency,
        };
        *slot = Some(value);
    }

    fn entries(&self) -> [(RateCategory, Option<u8>); 6] {
        [
            (RateCategory::Usability, self.usability),
            (RateCategory::Support, self.support),
            (RateCategory::Fees, self.fees),
            (RateCategory::Payouts, self.payouts),
            (RateCategory::Reliability, self.reliability),
            (RateCategory::Transparency, self.transparency),
        ]
    }
}

impl RatingForm {
    pub fn quick(overall_rating: u8) -> Self {
        Self {
            overall_rating: Some(overall_rating),
            categories: None,
        }
    }

    pub fn detailed(categories: CategoryScoresForm) -> Self {
        Self {
            overall_rating: None,
            categories: Some(categories),
        }
    }
}

impl TryFrom<RatingForm> for models::Rating {
    type Error = RatingValidationError;

    fn try_from(form: RatingForm) -> Result<Self, Self::Error> {
        if let Err(errors) = form.validate() {
            tracing::debug!("rating form rejected: {}", errors);
            let value = form
                .overall_rating
                .map(|v| v as i64)
                .unwrap_or_else(|| {
                    form.categories
                        .iter()
                        .flat_map(|c| c.entries())
                        .filter_map(|(_, v)| v)
                        .max()
                        .unwrap_or_default() as i64
                });
            return Err(RatingValidationError::ScoreOutOfRange {
                value,
                min: 0,
                max: models::MAX_SCORE,
            });
        }

        match (form.overall_rating, form.categories) {
            (Some(_), Some(categories))
                if categories.entries().iter().any(|(_, v)| v.unwrap_or(0) > 0) =>
            {
                Err(RatingValidationError::BothModes)
            }
            (Some(overall), _) => models::Rating::overall(overall),
            (None, Some(categories)) => {
                let mut scores = CategoryScores::new();
                for (category, value) in categories.entries() {
                    if let Some(value) = value {
                        scores.set(category, value)?;
                    }
                }
                models::Rating::categories(scores)
            }
            (None, None) => Err(RatingValidationError::Empty),
        }
    }
}
