//! On-demand risk queries against the analysis endpoint.

use rl_types::{AnalysisError, AnalysisRequest, AnalysisResult, FIXED_CONFIDENCE};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::transport::AnalysisTransport;

/// Issues single-shot analysis calls and normalizes every outcome into an
/// [`AnalysisResult`].
///
/// No retry, caching, or deduplication: each call sends exactly one request
/// and concurrent calls are independent. Cloning shares the transport.
pub struct AnalysisRequestClient<T: AnalysisTransport> {
    transport: Arc<T>,
    confidence: u8,
}

impl<T: AnalysisTransport> Clone for AnalysisRequestClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            confidence: self.confidence,
        }
    }
}

impl<T: AnalysisTransport> AnalysisRequestClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            confidence: FIXED_CONFIDENCE,
        }
    }

    /// Override the confidence attached to successful results.
    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = confidence.min(100);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one analysis. Never fails: transport errors, non-success statuses
    /// and unreadable bodies all come back as an `Error`-level result.
    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        let request_id = Uuid::new_v4();
        match self.try_analyze(request).await {
            Ok(result) => {
                info!(
                    %request_id,
                    level = %result.risk_level,
                    score = result.risk_score,
                    "analysis completed"
                );
                result
            }
            Err(e) => {
                warn!(%request_id, error = %e, "analysis failed, backend unreachable");
                AnalysisResult::backend_unreachable()
            }
        }
    }

    /// Like [`AnalysisRequestClient::analyze`] but surfaces the failure cause.
    pub async fn try_analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisError> {
        let body = request.to_body();
        let response = self.transport.post_analysis(&body).await?;
        Ok(AnalysisResult::from_response(&response, self.confidence))
    }
}
