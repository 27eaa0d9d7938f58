// src/risk.rs
//! Threshold bucketing of the raw model score.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scores strictly above this are reported as phishing.
pub const PHISHING_THRESHOLD: f64 = 0.5;

/// Lower bounds (exclusive) of each bucket, checked top-down.
const BUCKETS: [(f64, RiskLevel); 4] = [
    (0.8, RiskLevel::VeryHigh),
    (0.6, RiskLevel::High),
    (0.4, RiskLevel::Medium),
    (0.2, RiskLevel::Low),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Very High")]
    VeryHigh,
    High,
    Medium,
    Low,
    #[serde(rename = "Very Low")]
    VeryLow,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::VeryHigh => "Very High",
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
            RiskLevel::VeryLow => "Very Low",
        }
    }

    pub fn from_score(score: f64) -> Self {
        BUCKETS
            .iter()
            .find(|(floor, _)| score > *floor)
            .map(|(_, level)| *level)
            .unwrap_or(RiskLevel::VeryLow)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response payload of `/analyze`. Every field is derived from `raw_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub is_phishing: bool,
    /// `raw_score * 100`.
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub raw_score: f64,
}

impl AnalysisResult {
    /// Phishing verdict in one of the two top buckets; clients show an extra
    /// warning for these.
    pub fn is_high_risk(&self) -> bool {
        self.is_phishing && matches!(self.risk_level, RiskLevel::High | RiskLevel::VeryHigh)
    }
}

/// No clamping: the scorer is trusted to stay within `[0, 1]`.
pub fn classify(raw_score: f64) -> AnalysisResult {
    AnalysisResult {
        is_phishing: raw_score > PHISHING_THRESHOLD,
        confidence: raw_score * 100.0,
        risk_level: RiskLevel::from_score(raw_score),
        raw_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_top_down() {
        assert_eq!(classify(0.9).risk_level, RiskLevel::VeryHigh);
        assert_eq!(classify(0.7).risk_level, RiskLevel::High);
        assert_eq!(classify(0.5).risk_level, RiskLevel::Medium);
        assert_eq!(classify(0.3).risk_level, RiskLevel::Low);
        assert_eq!(classify(0.1).risk_level, RiskLevel::VeryLow);
    }

    #[test]
    fn bucket_bounds_are_exclusive() {
        assert_eq!(classify(0.8).risk_level, RiskLevel::High);
        assert_eq!(classify(0.6).risk_level, RiskLevel::Medium);
        assert_eq!(classify(0.4).risk_level, RiskLevel::Low);
        assert_eq!(classify(0.2).risk_level, RiskLevel::VeryLow);
        assert_eq!(classify(0.0).risk_level, RiskLevel::VeryLow);
        assert_eq!(classify(1.0).risk_level, RiskLevel::VeryHigh);
    }

    #[test]
    fn phishing_flag_is_strictly_above_half() {
        assert!(!classify(0.5).is_phishing);
        assert!(classify(0.50001).is_phishing);
        assert!(!classify(0.0).is_phishing);
    }

    #[test]
    fn confidence_and_raw_score_pass_through() {
        let r = classify(0.95);
        assert!((r.confidence - 95.0).abs() < 1e-9);
        assert_eq!(r.raw_score, 0.95);
        assert!(r.is_phishing);
    }

    #[test]
    fn high_risk_needs_phishing_verdict_and_top_bucket() {
        assert!(classify(0.9).is_high_risk());
        assert!(classify(0.7).is_high_risk());
        assert!(!classify(0.55).is_high_risk(), "Medium bucket");
        assert!(!classify(0.1).is_high_risk());

        let mut r = classify(0.9);
        r.is_phishing = false;
        assert!(!r.is_high_risk());
    }

    #[test]
    fn serializes_with_display_labels() {
        let v = serde_json::to_value(classify(0.9)).unwrap();
        assert_eq!(v["risk_level"], "Very High");
        let v = serde_json::to_value(classify(0.1)).unwrap();
        assert_eq!(v["risk_level"], "Very Low");
        assert_eq!(v["is_phishing"], false);
        assert_eq!(RiskLevel::Medium.to_string(), "Medium");
    }
}
