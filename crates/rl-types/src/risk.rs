use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorical risk verdict shown by the console.
///
/// The analysis engine reports free-form labels; [`RiskLevel::from_label`]
/// folds them into the three display buckets. `Error` never comes off the
/// wire and is only synthesized when an analysis call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Normal,
    Suspicious,
    HighRisk,
    Error,
}

impl RiskLevel {
    /// Map an engine label onto a display level.
    ///
    /// `Normal` and `Suspicious` are matched case-insensitively; every other
    /// label (`Fraud`, `High Risk`, unknown future labels) is high risk.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case("normal") {
            RiskLevel::Normal
        } else if label.eq_ignore_ascii_case("suspicious") {
            RiskLevel::Suspicious
        } else {
            RiskLevel::HighRisk
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Normal => "Normal",
            RiskLevel::Suspicious => "Suspicious",
            RiskLevel::HighRisk => "High Risk",
            RiskLevel::Error => "Error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RiskLevel::Error)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
