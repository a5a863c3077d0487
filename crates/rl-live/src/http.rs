//! `reqwest`-backed analysis transport.

use async_trait::async_trait;
use rl_types::{AnalysisError, AnalysisRequestBody, AnalysisResponse};

use crate::transport::AnalysisTransport;

/// Posts analysis requests to the backend over HTTP.
///
/// No timeout is configured; the transport default applies.
#[derive(Debug, Clone)]
pub struct HttpAnalysisTransport {
    pub url: String,
    pub client: reqwest::Client,
}

impl HttpAnalysisTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AnalysisTransport for HttpAnalysisTransport {
    async fn post_analysis(
        &self,
        body: &AnalysisRequestBody,
    ) -> Result<AnalysisResponse, AnalysisError> {
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| AnalysisError::Transport {
                message: format!("HTTP request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(AnalysisError::Status {
                status: response.status().as_u16(),
            });
        }

        response
            .json::<AnalysisResponse>()
            .await
            .map_err(|e| AnalysisError::Body {
                message: format!("Failed to parse JSON response: {}", e),
            })
    }
}
