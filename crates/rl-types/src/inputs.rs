//! Editable analyzer form model.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisRequest;

pub const DEFAULT_TOKEN: &str = "GamblingToken";
pub const DEFAULT_AMOUNT: &str = "50000";
pub const DEFAULT_NETWORK: &str = "North Korea";

/// Raw text fields of the analyzer form.
///
/// `wallet` is shown to the user but never sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerInputs {
    pub wallet: String,
    pub token: String,
    pub amount: String,
    pub network: String,
}

impl Default for AnalyzerInputs {
    fn default() -> Self {
        Self {
            wallet: random_wallet(),
            token: DEFAULT_TOKEN.to_string(),
            amount: DEFAULT_AMOUNT.to_string(),
            network: DEFAULT_NETWORK.to_string(),
        }
    }
}

impl AnalyzerInputs {
    pub fn to_request(&self) -> AnalysisRequest {
        AnalysisRequest::from_fields(&self.amount, self.network.clone(), self.token.clone())
    }
}

/// Placeholder wallet address: `0x` followed by 8 hex digits.
pub fn random_wallet() -> String {
    format!("0x{:08x}", rand::rng().random::<u32>())
}
