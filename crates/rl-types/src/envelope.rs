//! Stream envelopes pushed over `/ws/stream` and the display records derived
//! from them.

use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::EnvelopeError;
use crate::risk::RiskLevel;

/// Transaction half of a valid envelope. Extra server fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeTransaction {
    pub merchant_type: String,
    /// Any finite JSON number, including ones outside `Decimal`'s range.
    pub amount: f64,
    pub time: String,
}

/// Analysis half of a valid envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeAnalysis {
    pub risk_level: String,
}

/// A single message received over the telemetry subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEnvelope {
    Analyzed {
        transaction: EnvelopeTransaction,
        analysis: EnvelopeAnalysis,
    },
    Error {
        message: String,
    },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    error: Option<serde_json::Value>,
    transaction: Option<EnvelopeTransaction>,
    analysis: Option<EnvelopeAnalysis>,
}

impl StreamEnvelope {
    /// Parse a text frame. Any non-null `error` field wins over the payload.
    pub fn parse(payload: &str) -> Result<Self, EnvelopeError> {
        let raw: RawEnvelope =
            serde_json::from_str(payload).map_err(|e| EnvelopeError::Malformed {
                message: e.to_string(),
            })?;

        if let Some(error) = raw.error.filter(|e| !e.is_null()) {
            let message = match error {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            return Ok(StreamEnvelope::Error { message });
        }

        let transaction = raw.transaction.ok_or(EnvelopeError::Incomplete {
            missing: "transaction",
        })?;
        let analysis = raw.analysis.ok_or(EnvelopeError::Incomplete {
            missing: "analysis",
        })?;

        Ok(StreamEnvelope::Analyzed {
            transaction,
            analysis,
        })
    }

    /// Parse and reject error envelopes, yielding only displayable payloads.
    pub fn parse_valid(
        payload: &str,
    ) -> Result<(EnvelopeTransaction, EnvelopeAnalysis), EnvelopeError> {
        match Self::parse(payload)? {
            StreamEnvelope::Analyzed {
                transaction,
                analysis,
            } => Ok((transaction, analysis)),
            StreamEnvelope::Error { message } => Err(EnvelopeError::ErrorEnvelope { message }),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StreamEnvelope::Error { .. })
    }
}

/// Client-generated record identifier, e.g. `tx-3fa91c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id. Not cryptographically strong; callers that need
    /// uniqueness check against the ids they already hold.
    pub fn random() -> Self {
        let bits: u32 = rand::rng().random::<u32>() & 0x00FF_FFFF;
        Self(format!("tx-{bits:06x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display-ready representation of one valid envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub id: RecordId,
    pub asset: String,
    /// Locale-formatted amount, see [`format_number`].
    pub amount: String,
    pub level: RiskLevel,
    pub time: String,
}

impl TelemetryRecord {
    pub fn from_envelope(
        id: RecordId,
        transaction: &EnvelopeTransaction,
        analysis: &EnvelopeAnalysis,
    ) -> Self {
        Self {
            id,
            asset: transaction.merchant_type.clone(),
            amount: format_number(transaction.amount),
            level: RiskLevel::from_label(&analysis.risk_level),
            time: transaction.time.clone(),
        }
    }
}

/// Render a wire amount the way an en-US locale does.
///
/// Amounts within `Decimal`'s range go through [`format_amount`]; larger
/// magnitudes only have an integer part worth printing.
pub fn format_number(amount: f64) -> String {
    match Decimal::from_f64(amount) {
        Some(decimal) => format_amount(decimal),
        None => group_digits(
            &amount.abs().trunc().to_string(),
            None,
            amount.is_sign_negative(),
        ),
    }
}

/// Render an amount the way an en-US locale does: up to three fraction
/// digits, no trailing zeros, comma-grouped thousands.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount
        .round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    let digits = rounded.abs().to_string();
    match digits.split_once('.') {
        Some((integer, fraction)) => {
            group_digits(integer, Some(fraction), rounded.is_sign_negative())
        }
        None => group_digits(&digits, None, rounded.is_sign_negative()),
    }
}

fn group_digits(integer: &str, fraction: Option<&str>, negative: bool) -> String {
    let mut out = String::with_capacity(integer.len() + integer.len() / 3 + 8);
    if negative {
        out.push('-');
    }
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}
