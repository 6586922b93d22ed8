//! Score combination and risk banding.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::sources::SourceResult;

/// Risk classification derived from a combined score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Dangerous,
}

impl RiskLevel {
    /// Bands are inclusive-lower, exclusive-upper; 100 is dangerous.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s < 20.0 => RiskLevel::Safe,
            s if s < 40.0 => RiskLevel::Low,
            s if s < 60.0 => RiskLevel::Medium,
            s if s < 80.0 => RiskLevel::High,
            _ => RiskLevel::Dangerous,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Dangerous => "dangerous",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mean score over the sources that answered; `None` when none did.
pub fn combined_score(results: &[SourceResult]) -> Option<f64> {
    let scores: Vec<f64> = results
        .iter()
        .filter(|r| r.succeeded)
        .filter_map(|r| r.risk_score)
        .collect();

    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}
