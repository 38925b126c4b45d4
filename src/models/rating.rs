use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::RateCategory;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RatingValidationError {
    #[error("score {value} is outside {min}..={max}")]
    ScoreOutOfRange { value: i64, min: u8, max: u8 },
    #[error("at least one category must be rated")]
    NoCategoryRated,
    #[error("a rating is either an overall score or category scores, not both")]
    BothModes,
    #[error("no rating given")]
    Empty,
}

/// A single star score, 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = RatingValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (MIN_SCORE..=MAX_SCORE).contains(&value) {
            Ok(Score(value))
        } else {
            Err(RatingValidationError::ScoreOutOfRange {
                value: value as i64,
                min: MIN_SCORE,
                max: MAX_SCORE,
            })
        }
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

/// Per-category scores. A category scored 0, or missing, is unrated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScores(BTreeMap<RateCategory, u8>);

impl CategoryScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, category: RateCategory, value: u8) -> Result<(), RatingValidationError> {
        if value > MAX_SCORE {
            return Err(RatingValidationError::ScoreOutOfRange {
                value: value as i64,
                min: 0,
                max: MAX_SCORE,
            });
        }
        self.0.insert(category, value);
        Ok(())
    }

    pub fn with(mut self, category: RateCategory, value: u8) -> Result<Self, RatingValidationError> {
        self.set(category, value)?;
        Ok(self)
    }

    pub fn get(&self, category: RateCategory) -> Option<u8> {
        self.0.get(&category).copied().filter(|v| *v > 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RateCategory, u8)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    /// Categories with a positive score.
    pub fn rated(&self) -> impl Iterator<Item = (RateCategory, u8)> + '_ {
        self.iter().filter(|(_, v)| *v > 0)
    }

    pub fn is_unrated(&self) -> bool {
        self.rated().next().is_none()
    }
}

/// One submission: either a quick overall score or detailed category scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum Rating {
    Overall(Score),
    Categories(CategoryScores),
}

impl Rating {
    pub fn overall(value: u8) -> Result<Self, RatingValidationError> {
        Ok(Rating::Overall(Score::try_from(value)?))
    }

    pub fn categories(scores: CategoryScores) -> Result<Self, RatingValidationError> {
        if scores.is_unrated() {
            return Err(RatingValidationError::NoCategoryRated);
        }
        Ok(Rating::Categories(scores))
    }
}

/// A user's stored rating for one company. Upserted by (user, company).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRating {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub rating: Rating,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
