//! Risk scoring and trend
//!
//! Impact score is `severity × probability` with low=1, medium=2, high=3, so
//! scores range over {1, 2, 3, 4, 6, 9}. Ratings and trend are computed on
//! read and never stored.

use serde::Serialize;
use utoipa::ToSchema;

use crate::data::types::{RiskLevel, RiskRow};

impl RiskLevel {
    pub fn score(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

pub fn risk_score(severity: RiskLevel, probability: RiskLevel) -> u8 {
    severity.score() * probability.score()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskRating {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskRating {
    pub fn from_score(score: u8) -> Self {
        match score {
            6.. => Self::Critical,
            4..=5 => Self::High,
            2..=3 => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn of(severity: RiskLevel, probability: RiskLevel) -> Self {
        Self::from_score(risk_score(severity, probability))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskTrend {
    Increasing,
    Stable,
    Decreasing,
}

fn is_elevated(risk: &RiskRow) -> bool {
    risk.severity == RiskLevel::High || risk.probability == RiskLevel::High
}

/// Trend over the active (not closed) risks.
///
/// No elevated risk (including no active risk at all) is `Decreasing`;
/// elevated at or above 30% of active is `Increasing`.
pub fn risk_trend<'a>(risks: impl IntoIterator<Item = &'a RiskRow>) -> RiskTrend {
    let (active, elevated) = risks
        .into_iter()
        .filter(|r| r.status.is_active())
        .fold((0usize, 0usize), |(active, elevated), r| {
            (active + 1, elevated + usize::from(is_elevated(r)))
        });

    if elevated == 0 {
        RiskTrend::Decreasing
    } else if elevated * 10 >= active * 3 {
        RiskTrend::Increasing
    } else {
        RiskTrend::Stable
    }
}

/// Per-rating counts are over active risks only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RatingCounts {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
    pub critical: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RiskSummary {
    pub total: u32,
    pub active: u32,
    pub by_rating: RatingCounts,
    pub trend: RiskTrend,
}

impl RiskSummary {
    pub fn from_risks(risks: &[RiskRow]) -> Self {
        let mut by_rating = RatingCounts::default();
        let mut active = 0;
        for risk in risks.iter().filter(|r| r.status.is_active()) {
            active += 1;
            let slot = match RiskRating::of(risk.severity, risk.probability) {
                RiskRating::Low => &mut by_rating.low,
                RiskRating::Medium => &mut by_rating.medium,
                RiskRating::High => &mut by_rating.high,
                RiskRating::Critical => &mut by_rating.critical,
            };
            *slot += 1;
        }

        Self {
            total: risks.len() as u32,
            active,
            by_rating,
            trend: risk_trend(risks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::RiskStatus;

    fn risk(severity: RiskLevel, probability: RiskLevel, status: RiskStatus) -> RiskRow {
        RiskRow {
            id: cuid2::create_id(),
            project_id: "p".to_string(),
            title: "r".to_string(),
            description: None,
            severity,
            probability,
            status,
            mitigation_plan: None,
            owner_id: None,
            created_by: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_rating_table() {
        use RiskLevel::*;
        let table = [
            (Low, Low, 1, RiskRating::Low),
            (Low, Medium, 2, RiskRating::Medium),
            (Medium, Low, 2, RiskRating::Medium),
            (Low, High, 3, RiskRating::Medium),
            (High, Low, 3, RiskRating::Medium),
            (Medium, Medium, 4, RiskRating::High),
            (Medium, High, 6, RiskRating::Critical),
            (High, Medium, 6, RiskRating::Critical),
            (High, High, 9, RiskRating::Critical),
        ];
        for (severity, probability, score, rating) in table {
            assert_eq!(risk_score(severity, probability), score);
            assert_eq!(RiskRating::of(severity, probability), rating, "{severity}/{probability}");
        }
    }

    #[test]
    fn test_from_score_boundaries() {
        assert_eq!(RiskRating::from_score(0), RiskRating::Low);
        assert_eq!(RiskRating::from_score(5), RiskRating::High);
        assert_eq!(RiskRating::from_score(6), RiskRating::Critical);
    }

    #[test]
    fn test_trend_no_active_is_decreasing() {
        assert_eq!(risk_trend(&Vec::<RiskRow>::new()), RiskTrend::Decreasing);
        let closed = [risk(RiskLevel::High, RiskLevel::High, RiskStatus::Closed)];
        assert_eq!(risk_trend(&closed), RiskTrend::Decreasing);
    }

    #[test]
    fn test_trend_thresholds() {
        let low = || risk(RiskLevel::Low, RiskLevel::Low, RiskStatus::Open);
        let elevated = || risk(RiskLevel::Low, RiskLevel::High, RiskStatus::Mitigating);

        // 3 of 10 is exactly 30%
        let mut risks: Vec<_> = (0..7).map(|_| low()).collect();
        risks.extend((0..3).map(|_| elevated()));
        assert_eq!(risk_trend(&risks), RiskTrend::Increasing);

        // 1 of 4 is 25%
        let risks = vec![low(), low(), low(), elevated()];
        assert_eq!(risk_trend(&risks), RiskTrend::Stable);

        let risks = vec![low(), low()];
        assert_eq!(risk_trend(&risks), RiskTrend::Decreasing);
    }

    #[test]
    fn test_summary_ignores_closed_in_counts() {
        let risks = vec![
            risk(RiskLevel::High, RiskLevel::High, RiskStatus::Open),
            risk(RiskLevel::Medium, RiskLevel::Medium, RiskStatus::Open),
            risk(RiskLevel::Low, RiskLevel::Low, RiskStatus::Mitigating),
            risk(RiskLevel::High, RiskLevel::High, RiskStatus::Closed),
        ];
        let summary = RiskSummary::from_risks(&risks);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.active, 3);
        assert_eq!(
            summary.by_rating,
            RatingCounts {
                low: 1,
                medium: 0,
                high: 1,
                critical: 1
            }
        );
        assert_eq!(summary.trend, RiskTrend::Increasing);
    }
}
