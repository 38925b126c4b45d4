use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named aspects of a company that can be scored in detailed mode.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RateCategory {
    Usability,
    Support,
    Fees,
    Payouts,
    Reliability,
    Transparency,
}

impl RateCategory {
    pub const ALL: [RateCategory; 6] = [
        RateCategory::Usability,
        RateCategory::Support,
        RateCategory::Fees,
        RateCategory::Payouts,
        RateCategory::Reliability,
        RateCategory::Transparency,
    ];

    /// Column name of the score in the `user_ratings` table.
    pub fn column(&self) -> &'static str {
        match self {
            RateCategory::Usability => "usability_rating",
            RateCategory::Support => "support_rating",
            RateCategory::Fees => "fees_rating",
            RateCategory::Payouts => "payouts_rating",
            RateCategory::Reliability => "reliability_rating",
            RateCategory::Transparency => "transparency_rating",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RateCategory::Usability => "usability",
            RateCategory::Support => "support",
            RateCategory::Fees => "fees",
            RateCategory::Payouts => "payouts",
            RateCategory::Reliability => "reliability",
            RateCategory::Transparency => "transparency",
        }
    }
}

impl fmt::Display for RateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        RateCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == needle)
            .ok_or_else(|| format!("unknown rating category: {}", s))
    }
}
