//! Rating aggregation.
//!
//! Pure functions. The values produced here are provisional: the backend
//! recomputes the company aggregate over every stored review, and that
//! result replaces whatever was computed locally.

use crate::models::{CategoryScores, CompanyAggregate, Rating, MAX_SCORE};

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Average of the rated categories, one decimal. Unrated (zero) categories
/// are left out rather than counted as zero. 0.0 when nothing is rated.
pub fn compute_provisional_average(scores: &CategoryScores) -> f64 {
    let (sum, count) = scores
        .rated()
        .fold((0u32, 0u32), |(sum, count), (_, value)| {
            (sum + value as u32, count + 1)
        });

    if count == 0 {
        return 0.0;
    }
    round_one_decimal(sum as f64 / count as f64)
}

/// The single score a submission contributes to the company average.
pub fn submission_score(rating: &Rating) -> f64 {
    match rating {
        Rating::Overall(score) => score.get() as f64,
        Rating::Categories(scores) => compute_provisional_average(scores),
    }
}

/// Interim company aggregate shown while a rating write is in flight.
///
/// A new rating adds one review to the running mean. When the user is
/// editing a rating whose previous score is known, the count stays and the
/// previous score is swapped out of the mean.
pub fn provisional_aggregate(
    current: CompanyAggregate,
    score: f64,
    previous_score: Option<f64>,
) -> CompanyAggregate {
    let count = current.total_reviews as f64;
    let sum = if current.total_reviews == 0 {
        0.0
    } else {
        current.overall_rating * count
    };

    let (sum, total_reviews) = match previous_score {
        Some(previous) if current.total_reviews > 0 => {
            (sum - previous + score, current.total_reviews)
        }
        _ => (sum + score, current.total_reviews + 1),
    };

    let overall_rating =
        round_one_decimal(sum / total_reviews as f64).clamp(0.0, MAX_SCORE as f64);

    CompanyAggregate {
        overall_rating,
        total_reviews,
    }
}
