//! Long-lived telemetry subscription with fixed-delay reconnection.
//!
//! A [`StreamConsumer`] is an explicit loop that owns the connection and the
//! [`TelemetryBuffer`]. It walks `Disconnected → Connecting → Connected` and
//! back, republishing the connection indicator, its phase, and buffer
//! snapshots on `watch` channels so observers never touch consumer state
//! directly.

use rl_telemetry::{
    ConnectionSignal, ConnectionState, ConnectionWatcher, EventSink, StreamEventKind,
    TelemetryBuffer,
};
use rl_types::{internal_error, EnvelopeError, RlResult, StreamEnvelope, TelemetryRecord};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ConsoleConfig;
use crate::transport::{StreamConnection, StreamTransport};

/// Where the consumer is in its connection lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumerPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Tunables for a [`StreamConsumer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConsumerConfig {
    /// Constant delay before every reconnect. No growth, jitter, or cap.
    pub reconnect_delay: Duration,
    pub buffer_capacity: usize,
}

impl Default for StreamConsumerConfig {
    fn default() -> Self {
        ConsoleConfig::default().consumer_config()
    }
}

/// Why the inner read loop ended.
enum SessionEnd {
    Disconnected(String),
    TornDown,
}

/// Owns the subscription and the record buffer. Consumed by
/// [`StreamConsumer::spawn`] or [`StreamConsumer::run`].
pub struct StreamConsumer<T: StreamTransport> {
    transport: T,
    config: StreamConsumerConfig,
    buffer: TelemetryBuffer,
    signal: ConnectionSignal,
    phase_tx: watch::Sender<ConsumerPhase>,
    snapshot_tx: watch::Sender<Vec<TelemetryRecord>>,
    events: EventSink,
    attempts: u64,
}

impl<T: StreamTransport + 'static> StreamConsumer<T> {
    pub fn new(transport: T, config: StreamConsumerConfig, events: EventSink) -> Self {
        let buffer = TelemetryBuffer::with_capacity(config.buffer_capacity);
        let (signal, _) = ConnectionSignal::new();
        let (phase_tx, _) = watch::channel(ConsumerPhase::Disconnected);
        let (snapshot_tx, _) = watch::channel(Vec::new());

        Self {
            transport,
            config,
            buffer,
            signal,
            phase_tx,
            snapshot_tx,
            events,
            attempts: 0,
        }
    }

    /// Start the consumer on the current tokio runtime.
    pub fn spawn(self) -> StreamHandle {
        let cancel = CancellationToken::new();
        let connection = self.signal.watcher();
        let phase = self.phase_tx.subscribe();
        let snapshots = self.snapshot_tx.subscribe();
        let task = tokio::spawn(self.run(cancel.clone()));

        StreamHandle {
            cancel,
            task: Some(task),
            connection,
            phase,
            snapshots,
        }
    }

    /// Drive the subscription until `cancel` fires. The first attempt is
    /// immediate; every later one follows a disconnect by exactly
    /// `reconnect_delay`.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(endpoint = %self.transport.endpoint(), "stream consumer started");

        loop {
            if self.attempts > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                }
            }

            self.attempts += 1;
            let attempt = self.attempts;
            self.phase_tx.send_replace(ConsumerPhase::Connecting);
            self.events.emit(StreamEventKind::ConnectAttempt { attempt });

            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.transport.connect() => result,
            };

            let mut connection = match connected {
                Ok(connection) => connection,
                Err(e) => {
                    self.phase_tx.send_replace(ConsumerPhase::Disconnected);
                    self.events.emit(StreamEventKind::ConnectFailed {
                        attempt,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            self.signal.set(ConnectionState::Connected);
            self.phase_tx.send_replace(ConsumerPhase::Connected);
            self.events.emit(StreamEventKind::Connected { attempt });

            match self.read_until_closed(connection.as_mut(), &cancel).await {
                SessionEnd::Disconnected(reason) => {
                    // The handle is released here; the server already hung up.
                    drop(connection);
                    self.signal.set(ConnectionState::Disconnected);
                    self.phase_tx.send_replace(ConsumerPhase::Disconnected);
                    self.events.emit(StreamEventKind::Disconnected { reason });
                }
                SessionEnd::TornDown => {
                    if let Err(e) = connection.close().await {
                        warn!(error = %e, "closing stream on teardown failed");
                    }
                    break;
                }
            }
        }

        self.signal.set(ConnectionState::Disconnected);
        self.phase_tx.send_replace(ConsumerPhase::Disconnected);
        self.events.emit(StreamEventKind::Stopped);
    }

    async fn read_until_closed(
        &mut self,
        connection: &mut dyn StreamConnection,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return SessionEnd::TornDown,
                message = connection.next_message() => match message {
                    Ok(Some(payload)) => {
                        let _ = self.ingest(&payload);
                    }
                    Ok(None) => return SessionEnd::Disconnected("closed by server".to_string()),
                    Err(e) => return SessionEnd::Disconnected(e.to_string()),
                },
            }
        }
    }

    /// Validate one payload and buffer it. Rejected payloads leave the buffer
    /// and connection state untouched.
    pub fn ingest(&mut self, payload: &str) -> Result<TelemetryRecord, EnvelopeError> {
        let (transaction, analysis) = match StreamEnvelope::parse_valid(payload) {
            Ok(parts) => parts,
            Err(e) => {
                self.events.emit(StreamEventKind::EnvelopeDiscarded {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        let record =
            TelemetryRecord::from_envelope(self.buffer.fresh_id(), &transaction, &analysis);
        let evicted = self.buffer.push(record.clone()).map(|r| r.id);

        self.snapshot_tx.send_replace(self.buffer.snapshot());
        self.events.emit(StreamEventKind::RecordBuffered {
            id: record.id.clone(),
            level: record.level,
            evicted,
        });

        Ok(record)
    }

    pub fn buffer(&self) -> &TelemetryBuffer {
        &self.buffer
    }

    pub fn connection(&self) -> ConnectionWatcher {
        self.signal.watcher()
    }
}

/// Owning handle to a running consumer.
///
/// Dropping the handle cancels the consumer, so a session cannot outlive its
/// owner and keep reconnecting.
pub struct StreamHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    connection: ConnectionWatcher,
    phase: watch::Receiver<ConsumerPhase>,
    snapshots: watch::Receiver<Vec<TelemetryRecord>>,
}

impl StreamHandle {
    pub fn connection(&self) -> ConnectionWatcher {
        self.connection.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn phase(&self) -> ConsumerPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ConsumerPhase> {
        self.phase.clone()
    }

    /// Current buffer contents, newest first.
    pub fn snapshot(&self) -> Vec<TelemetryRecord> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Vec<TelemetryRecord>> {
        self.snapshots.clone()
    }

    /// Close the subscription and wait for the consumer to finish. No
    /// reconnect is scheduled afterwards.
    pub async fn shutdown(mut self) -> RlResult<()> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| internal_error!("stream consumer task failed to join: {e}")),
            None => Ok(()),
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{SandboxFrame, SandboxSession, SandboxStreamTransport};
    use crossbeam_channel::unbounded;
    use rl_types::RiskLevel;
    use tokio::time::{sleep, Instant};

    const DELAY: Duration = Duration::from_millis(3000);

    fn envelope(n: usize, level: &str) -> String {
        format!(
            r#"{{"transaction": {{"amount": {amount}, "location": "Tokyo",
                                 "merchant_type": "merchant-{n}", "time": "12:00:{n:02}"}},
                "analysis": {{"risk_level": "{level}", "risk_score": 0.5, "explanation": "x"}}}}"#,
            amount = 1000 + n,
        )
    }

    fn message(n: usize) -> SandboxFrame {
        SandboxFrame::Message(envelope(n, "Normal"))
    }

    fn consumer(transport: SandboxStreamTransport) -> StreamConsumer<SandboxStreamTransport> {
        StreamConsumer::new(transport, StreamConsumerConfig::default(), EventSink::disabled())
    }

    #[test]
    fn default_config_uses_fixed_three_second_delay() {
        let config = StreamConsumerConfig::default();
        assert_eq!(config.reconnect_delay, DELAY);
        assert_eq!(config.buffer_capacity, 8);
    }

    #[test]
    fn oversized_buffer_capacity_is_clamped_on_construction() {
        let config = StreamConsumerConfig {
            buffer_capacity: usize::MAX,
            ..Default::default()
        };
        let mut consumer =
            StreamConsumer::new(SandboxStreamTransport::default(), config, EventSink::disabled());
        assert_eq!(consumer.buffer().capacity(), 8);

        for n in 0..12 {
            consumer.ingest(&envelope(n, "Normal")).unwrap();
        }
        assert_eq!(consumer.buffer().len(), 8);
    }

    #[test]
    fn ingest_buffers_valid_envelopes() {
        let mut consumer = consumer(SandboxStreamTransport::default());
        let record = consumer.ingest(&envelope(1, "Fraud")).unwrap();

        assert_eq!(record.asset, "merchant-1");
        assert_eq!(record.amount, "1,001");
        assert_eq!(record.level, RiskLevel::HighRisk);
        assert_eq!(record.time, "12:00:01");
        assert!(record.id.as_str().starts_with("tx-"));
        assert_eq!(consumer.buffer().len(), 1);
    }

    #[test]
    fn ingest_drops_error_and_malformed_envelopes() {
        let (tx, rx) = unbounded();
        let mut consumer = StreamConsumer::new(
            SandboxStreamTransport::default(),
            StreamConsumerConfig::default(),
            EventSink::new(tx),
        );

        assert!(matches!(
            consumer.ingest(r#"{"error": "data.csv missing"}"#),
            Err(EnvelopeError::ErrorEnvelope { .. })
        ));
        assert!(consumer.ingest("{").is_err());
        assert!(consumer.buffer().is_empty());
        assert_eq!(consumer.connection().current(), ConnectionState::Disconnected);

        let discarded = rx
            .try_iter()
            .filter(|e| matches!(e.kind, StreamEventKind::EnvelopeDiscarded { .. }))
            .count();
        assert_eq!(discarded, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn ten_envelopes_keep_last_eight_in_arrival_order() {
        let frames = (0..10).map(message).collect();
        let transport = SandboxStreamTransport::new([SandboxSession::Accept(frames)]);
        let handle = consumer(transport).spawn();

        let mut snapshots = handle.subscribe_snapshots();
        snapshots
            .wait_for(|records| records.first().map(|r| r.asset.as_str()) == Some("merchant-9"))
            .await
            .unwrap();

        let assets: Vec<_> = handle.snapshot().into_iter().map(|r| r.asset).collect();
        let expected: Vec<_> = (2..10).rev().map(|n| format!("merchant-{n}")).collect();
        assert_eq!(assets, expected);
        assert!(handle.is_connected());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn error_envelope_changes_neither_buffer_nor_state() {
        let transport = SandboxStreamTransport::new([SandboxSession::Accept(vec![
            message(1),
            SandboxFrame::Delay(Duration::from_millis(100)),
            SandboxFrame::Message(r#"{"error": "data.csv missing"}"#.into()),
            SandboxFrame::Message("garbage".into()),
        ])]);
        let handle = consumer(transport).spawn();

        sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.snapshot().len(), 1);
        assert!(handle.is_connected());

        sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.snapshot().len(), 1);
        assert!(handle.is_connected());
        assert_eq!(handle.phase(), ConsumerPhase::Connected);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_exactly_after_fixed_delay() {
        let transport = SandboxStreamTransport::new([
            SandboxSession::Accept(vec![
                message(1),
                SandboxFrame::Delay(Duration::from_millis(500)),
                SandboxFrame::Close,
            ]),
            SandboxSession::Accept(vec![message(2)]),
        ]);
        let start = Instant::now();
        let handle = consumer(transport.clone()).spawn();

        sleep(Duration::from_millis(100)).await;
        assert!(handle.is_connected());

        // Closed at 500 ms: disconnected straight away, no new attempt yet.
        sleep(Duration::from_millis(500)).await;
        assert!(!handle.is_connected());
        assert_eq!(handle.phase(), ConsumerPhase::Disconnected);
        assert_eq!(transport.connect_attempts(), 1);

        sleep(Duration::from_millis(2850)).await; // 3450 ms
        assert_eq!(transport.connect_attempts(), 1);
        assert!(!handle.is_connected());

        sleep(Duration::from_millis(100)).await; // 3550 ms
        assert!(handle.is_connected());

        let times = transport.connect_times();
        assert_eq!(times.len(), 2);
        assert_eq!(times[0], start);
        assert_eq!(times[1] - times[0], Duration::from_millis(500) + DELAY);

        // Records survive a reconnect.
        let assets: Vec<_> = handle.snapshot().into_iter().map(|r| r.asset).collect();
        assert_eq!(assets, vec!["merchant-2", "merchant-1"]);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn abrupt_drop_and_refusals_retry_forever_at_constant_delay() {
        let transport = SandboxStreamTransport::new([
            SandboxSession::Accept(vec![SandboxFrame::Fail("connection reset".into())]),
            SandboxSession::Refuse("offline".into()),
            SandboxSession::Refuse("offline".into()),
            SandboxSession::Refuse("offline".into()),
            SandboxSession::Accept(vec![]),
        ]);
        let (tx, rx) = unbounded();
        let handle = StreamConsumer::new(
            transport.clone(),
            StreamConsumerConfig::default(),
            EventSink::new(tx),
        )
        .spawn();

        let mut connection = handle.connection();
        sleep(Duration::from_millis(10)).await;
        assert!(!connection.is_connected());
        assert!(connection.wait_for(ConnectionState::Connected).await);

        let times = transport.connect_times();
        assert_eq!(times.len(), 5);
        for pair in times.windows(2) {
            assert_eq!(pair[1] - pair[0], DELAY);
        }

        let kinds: Vec<_> = rx.try_iter().map(|e| e.kind).collect();
        assert!(kinds.iter().any(|k| matches!(
            k,
            StreamEventKind::Disconnected { reason } if reason.contains("connection reset")
        )));
        let failures = kinds
            .iter()
            .filter(|k| matches!(k, StreamEventKind::ConnectFailed { .. }))
            .count();
        assert_eq!(failures, 3);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_closes_once_and_stops_reconnecting() {
        let transport = SandboxStreamTransport::new([SandboxSession::Accept(vec![message(1)])]);
        let handle = consumer(transport.clone()).spawn();
        let connection = handle.connection();

        sleep(Duration::from_millis(100)).await;
        assert!(connection.is_connected());

        handle.shutdown().await.unwrap();
        assert!(!connection.is_connected());
        assert_eq!(transport.close_counts(), vec![1]);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.connect_attempts(), 1);
        assert_eq!(transport.close_counts(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_during_reconnect_delay_cancels_the_retry() {
        let transport = SandboxStreamTransport::new([
            SandboxSession::Accept(vec![SandboxFrame::Close]),
            SandboxSession::Accept(vec![]),
        ]);
        let (tx, rx) = unbounded();
        let handle = StreamConsumer::new(
            transport.clone(),
            StreamConsumerConfig::default(),
            EventSink::new(tx),
        )
        .spawn();

        sleep(Duration::from_millis(1000)).await;
        handle.shutdown().await.unwrap();

        sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.connect_attempts(), 1);
        // Server closed that session; the client never had to.
        assert_eq!(transport.close_counts(), vec![0]);
        assert!(rx
            .try_iter()
            .any(|e| e.kind == StreamEventKind::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_a_pending_connect() {
        let transport = SandboxStreamTransport::default();
        let handle = consumer(transport.clone()).spawn();
        let mut phase = handle.subscribe_phase();

        phase
            .wait_for(|p| *p == ConsumerPhase::Connecting)
            .await
            .unwrap();
        drop(handle);

        phase
            .wait_for(|p| *p == ConsumerPhase::Disconnected)
            .await
            .unwrap();
        sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.connect_attempts(), 1);
    }
}
