//! Request/response types for the on-demand analysis endpoint.

use serde::{Deserialize, Serialize};

use crate::risk::RiskLevel;

/// Confidence reported for every successful analysis. The engine does not
/// return one.
pub const FIXED_CONFIDENCE: u8 = 98;

/// Explanation attached to results synthesized after a failed call.
pub const UNREACHABLE_EXPLANATION: &str =
    "Backend Connection Failed: analysis backend unreachable.";

/// A single ad-hoc risk query.
///
/// `amount` is `NaN` when the user-supplied text did not parse; it is
/// forwarded untouched and serializes as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub amount: f64,
    pub location: String,
    pub category_label: String,
}

impl AnalysisRequest {
    pub fn new(
        amount: f64,
        location: impl Into<String>,
        category_label: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            location: location.into(),
            category_label: category_label.into(),
        }
    }

    /// Build a request from raw form text. Only the amount is parsed.
    pub fn from_fields(
        amount: &str,
        location: impl Into<String>,
        category_label: impl Into<String>,
    ) -> Self {
        Self::new(parse_amount(amount), location, category_label)
    }

    /// Body sent to `POST /analyze`.
    pub fn to_body(&self) -> AnalysisRequestBody {
        AnalysisRequestBody {
            amount: self.amount,
            location: self.location.clone(),
            merchant_type: self.category_label.clone(),
        }
    }
}

/// Parse user-entered amount text, yielding `NaN` for anything non-numeric.
pub fn parse_amount(text: &str) -> f64 {
    text.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Wire body of `POST /analyze`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRequestBody {
    pub amount: f64,
    pub location: String,
    pub merchant_type: String,
}

/// Wire body of a successful `POST /analyze` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub risk_level: String,
    /// Fraction in `0..=1`.
    pub risk_score: f64,
    pub explanation: String,
}

/// Displayable outcome of one analysis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub risk_level: RiskLevel,
    /// Percentage in `0..=100`.
    pub risk_score: u8,
    pub explanation: String,
    /// Percentage in `0..=100`.
    pub confidence: u8,
}

impl AnalysisResult {
    /// Map an engine response into a result with the given confidence.
    pub fn from_response(response: &AnalysisResponse, confidence: u8) -> Self {
        Self {
            risk_level: RiskLevel::from_label(&response.risk_level),
            risk_score: score_percent(response.risk_score),
            explanation: response.explanation.clone(),
            confidence: confidence.min(100),
        }
    }

    /// Result reported when the backend could not be reached or answered
    /// with something unusable.
    pub fn backend_unreachable() -> Self {
        Self {
            risk_level: RiskLevel::Error,
            risk_score: 0,
            explanation: UNREACHABLE_EXPLANATION.to_string(),
            confidence: 0,
        }
    }

    pub fn is_error(&self) -> bool {
        self.risk_level.is_error()
    }

    /// Badge text, e.g. `Suspicious (73%)`.
    pub fn badge(&self) -> String {
        format!("{} ({}%)", self.risk_level, self.risk_score)
    }
}

/// Scale a `0..=1` fraction to a rounded percentage.
///
/// Halves round away from zero, so `0.005` becomes `1`. Out-of-range input is
/// clamped.
pub fn score_percent(fraction: f64) -> u8 {
    let scaled = (fraction * 100.0).round();
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(level: &str, score: f64) -> AnalysisResponse {
        AnalysisResponse {
            risk_level: level.into(),
            risk_score: score,
            explanation: "High amount ($50000)".into(),
        }
    }

    #[test]
    fn score_rounds_to_nearest() {
        assert_eq!(score_percent(0.73), 73);
        assert_eq!(score_percent(0.005), 1);
        assert_eq!(score_percent(0.004), 0);
        assert_eq!(score_percent(0.999), 100);
    }

    #[test]
    fn score_is_clamped() {
        assert_eq!(score_percent(1.7), 100);
        assert_eq!(score_percent(-0.2), 0);
        assert_eq!(score_percent(f64::NAN), 0);
    }

    #[test]
    fn response_maps_into_result() {
        let result = AnalysisResult::from_response(&response("Suspicious", 0.73), FIXED_CONFIDENCE);
        assert_eq!(result.risk_level, RiskLevel::Suspicious);
        assert_eq!(result.risk_score, 73);
        assert_eq!(result.confidence, 98);
        assert_eq!(result.explanation, "High amount ($50000)");
        assert_eq!(result.badge(), "Suspicious (73%)");
    }

    #[test]
    fn unreachable_result_is_error_level() {
        let result = AnalysisResult::backend_unreachable();
        assert!(result.is_error());
        assert_eq!(result.risk_score, 0);
        assert_eq!(result.confidence, 0);
        assert!(result.explanation.contains("unreachable"));
    }

    #[test]
    fn non_numeric_amount_becomes_nan() {
        let request = AnalysisRequest::from_fields("fifty", "London", "Amazon");
        assert!(request.amount.is_nan());

        let request = AnalysisRequest::from_fields(" 1250.5 ", "London", "Amazon");
        assert_eq!(request.amount, 1250.5);
    }

    #[test]
    fn body_uses_wire_field_names() {
        let request = AnalysisRequest::new(50_000.0, "North Korea", "GamblingToken");
        let json = serde_json::to_value(request.to_body()).unwrap();
        assert_eq!(json["amount"], 50_000.0);
        assert_eq!(json["location"], "North Korea");
        assert_eq!(json["merchant_type"], "GamblingToken");
    }

    #[test]
    fn nan_amount_serializes_as_null() {
        let request = AnalysisRequest::from_fields("", "Tokyo", "Uber");
        let json = serde_json::to_value(request.to_body()).unwrap();
        assert!(json["amount"].is_null());
    }
}
