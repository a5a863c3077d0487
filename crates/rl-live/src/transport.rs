//! Transport abstraction for the analysis endpoint and the telemetry feed.

use async_trait::async_trait;
use rl_types::{AnalysisError, AnalysisRequestBody, AnalysisResponse, StreamError};

/// Request/response channel to `POST /analyze`.
///
/// Implementations may talk to the real backend over HTTP (see
/// [`super::http::HttpAnalysisTransport`]) or answer from a script (see
/// [`super::sandbox::SandboxAnalysisTransport`]).
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    /// Send one analysis request. Exactly one outbound request per call.
    async fn post_analysis(
        &self,
        body: &AnalysisRequestBody,
    ) -> Result<AnalysisResponse, AnalysisError>;
}

/// Factory for telemetry subscriptions.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a new subscription.
    async fn connect(&self) -> Result<Box<dyn StreamConnection>, StreamError>;

    /// Human-readable endpoint, used in logs.
    fn endpoint(&self) -> &str;
}

/// A live subscription. The client only reads from it.
#[async_trait]
pub trait StreamConnection: Send {
    /// Next text payload.
    ///
    /// `Ok(None)` means the server closed gracefully, `Err` means the
    /// connection dropped. Callers treat both as a disconnect.
    async fn next_message(&mut self) -> Result<Option<String>, StreamError>;

    /// Close the subscription from the client side.
    async fn close(&mut self) -> Result<(), StreamError>;
}
