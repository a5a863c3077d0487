//! A console session: on-demand analysis plus the live telemetry feed.

use parking_lot::Mutex;
use rl_telemetry::{ConnectionState, ConnectionWatcher, EventSink};
use rl_types::{AnalysisRequest, AnalysisResult, AnalyzerInputs, RlResult, TelemetryRecord};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use crate::analysis::AnalysisRequestClient;
use crate::config::ConsoleConfig;
use crate::consumer::{StreamConsumer, StreamHandle};
use crate::http::HttpAnalysisTransport;
use crate::transport::{AnalysisTransport, StreamTransport};
use crate::ws::WsStreamTransport;

/// The "most recent result" shown under the analyzer form.
///
/// Overwritten by whichever call completes last; overlapping calls are not
/// sequenced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSlot {
    in_flight: usize,
    latest: Option<AnalysisResult>,
}

impl ResultSlot {
    fn begin(&mut self) {
        self.in_flight += 1;
        self.latest = None;
    }

    fn complete(&mut self, result: AnalysisResult) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.latest = Some(result);
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn latest(&self) -> Option<&AnalysisResult> {
        self.latest.as_ref()
    }
}

/// One running console session. Generic over the analysis transport so a
/// sandbox backend can stand in for the real one.
///
/// The stream consumer starts with the session and is torn down by
/// [`RiskConsole::shutdown`] or when the session is dropped.
pub struct RiskConsole<A: AnalysisTransport> {
    config: ConsoleConfig,
    analyzer: AnalysisRequestClient<A>,
    slot: Arc<Mutex<ResultSlot>>,
    stream: StreamHandle,
}

impl RiskConsole<HttpAnalysisTransport> {
    /// Session against the real backend named in `config`.
    pub fn from_config(config: ConsoleConfig, events: EventSink) -> RlResult<Self> {
        config.validate()?;
        let analysis = HttpAnalysisTransport::new(config.analyze_url()?);
        let stream = WsStreamTransport::new(config.stream_url()?);
        Ok(Self::start(config, analysis, stream, events))
    }
}

impl<A: AnalysisTransport + 'static> RiskConsole<A> {
    /// Start a session; the stream consumer is spawned immediately.
    pub fn start<S: StreamTransport + 'static>(
        config: ConsoleConfig,
        analysis: A,
        stream: S,
        events: EventSink,
    ) -> Self {
        let analyzer =
            AnalysisRequestClient::new(analysis).with_confidence(config.fixed_confidence);
        let stream = StreamConsumer::new(stream, config.consumer_config(), events).spawn();
        info!(backend = %config.backend_url, "console session started");

        Self {
            config,
            analyzer,
            slot: Arc::new(Mutex::new(ResultSlot::default())),
            stream,
        }
    }

    /// Run one analysis and publish it to the result slot.
    ///
    /// The request runs to completion on its own task even if the caller
    /// stops waiting, so the slot is still updated on arrival.
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisResult {
        self.slot.lock().begin();

        let analyzer = self.analyzer.clone();
        let slot = Arc::clone(&self.slot);
        let task = tokio::spawn(async move {
            let result = analyzer.analyze(&request).await;
            slot.lock().complete(result.clone());
            result
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "analysis task failed");
                let result = AnalysisResult::backend_unreachable();
                self.slot.lock().complete(result.clone());
                result
            }
        }
    }

    /// Analyze the current form contents.
    pub async fn analyze_inputs(&self, inputs: &AnalyzerInputs) -> AnalysisResult {
        self.analyze(inputs.to_request()).await
    }

    pub fn latest_result(&self) -> Option<AnalysisResult> {
        self.slot.lock().latest().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.slot.lock().is_loading()
    }

    pub fn clear_result(&self) {
        self.slot.lock().latest = None;
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.stream.connection().current()
    }

    pub fn connection(&self) -> ConnectionWatcher {
        self.stream.connection()
    }

    /// Live feed rows, newest first.
    pub fn telemetry(&self) -> Vec<TelemetryRecord> {
        self.stream.snapshot()
    }

    pub fn subscribe_telemetry(&self) -> watch::Receiver<Vec<TelemetryRecord>> {
        self.stream.subscribe_snapshots()
    }

    pub fn stream(&self) -> &StreamHandle {
        &self.stream
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &AnalysisRequestClient<A> {
        &self.analyzer
    }

    /// Tear down the stream subscription. In-flight analyses still finish.
    pub async fn shutdown(self) -> RlResult<()> {
        info!("console session shutting down");
        self.stream.shutdown().await
    }
}
