//! Scripted (in-process) transports for sandbox mode.
//!
//! Answers analysis requests and plays back stream sessions with no network
//! access. Useful for integration testing and for exercising reconnect and
//! validation behaviour deterministically under a paused tokio clock.

use async_trait::async_trait;
use parking_lot::Mutex;
use rl_types::{AnalysisError, AnalysisRequestBody, AnalysisResponse, StreamError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::transport::{AnalysisTransport, StreamConnection, StreamTransport};

// -- Analysis ---------------------------------------------------------------

/// What the sandbox backend answers for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxReply {
    /// Simulated latency before the answer arrives.
    pub delay: Duration,
    pub outcome: Result<AnalysisResponse, AnalysisError>,
}

impl SandboxReply {
    pub fn ok(response: AnalysisResponse) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Ok(response),
        }
    }

    pub fn err(error: AnalysisError) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Err(error),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Responder = dyn Fn(&AnalysisRequestBody) -> SandboxReply + Send + Sync;

/// Analysis backend driven by a responder closure. Every request is recorded.
#[derive(Clone)]
pub struct SandboxAnalysisTransport {
    responder: Arc<Responder>,
    requests: Arc<Mutex<Vec<AnalysisRequestBody>>>,
}

impl SandboxAnalysisTransport {
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&AnalysisRequestBody) -> SandboxReply + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answer with `response`.
    pub fn always(response: AnalysisResponse) -> Self {
        Self::with_responder(move |_| SandboxReply::ok(response.clone()))
    }

    /// Always fail with `error`.
    pub fn failing(error: AnalysisError) -> Self {
        Self::with_responder(move |_| SandboxReply::err(error.clone()))
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<AnalysisRequestBody> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl AnalysisTransport for SandboxAnalysisTransport {
    async fn post_analysis(
        &self,
        body: &AnalysisRequestBody,
    ) -> Result<AnalysisResponse, AnalysisError> {
        self.requests.lock().push(body.clone());
        let reply = (self.responder)(body);
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.outcome
    }
}

// -- Stream -----------------------------------------------------------------

/// One step of a scripted stream session.
#[derive(Debug, Clone, PartialEq)]
pub enum SandboxFrame {
    /// Deliver a text payload.
    Message(String),
    /// Wait before the next step.
    Delay(Duration),
    /// Server closes gracefully.
    Close,
    /// Connection drops with a transport error.
    Fail(String),
}

/// Outcome of one connection attempt. A session that runs out of frames
/// stays open until the client closes it.
#[derive(Debug, Clone, PartialEq)]
pub enum SandboxSession {
    Refuse(String),
    Accept(Vec<SandboxFrame>),
}

#[derive(Debug, Default)]
struct StreamLedger {
    sessions: VecDeque<SandboxSession>,
    connect_times: Vec<Instant>,
    /// Client-side `close()` calls, indexed by accepted connection.
    closes: Vec<usize>,
}

/// Stream backend that plays back scripted sessions, one per connection
/// attempt. Once the script is exhausted, further attempts never complete.
#[derive(Debug, Clone, Default)]
pub struct SandboxStreamTransport {
    ledger: Arc<Mutex<StreamLedger>>,
}

impl SandboxStreamTransport {
    pub fn new(sessions: impl IntoIterator<Item = SandboxSession>) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(StreamLedger {
                sessions: sessions.into_iter().collect(),
                ..Default::default()
            })),
        }
    }

    /// Append a session to the script.
    pub fn push_session(&self, session: SandboxSession) {
        self.ledger.lock().sessions.push_back(session);
    }

    /// Instant of every connection attempt, in order.
    pub fn connect_times(&self) -> Vec<Instant> {
        self.ledger.lock().connect_times.clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.ledger.lock().connect_times.len()
    }

    /// Client-side close calls per accepted connection.
    pub fn close_counts(&self) -> Vec<usize> {
        self.ledger.lock().closes.clone()
    }
}

#[async_trait]
impl StreamTransport for SandboxStreamTransport {
    async fn connect(&self) -> Result<Box<dyn StreamConnection>, StreamError> {
        let next = {
            let mut ledger = self.ledger.lock();
            ledger.connect_times.push(Instant::now());
            let next = ledger.sessions.pop_front();
            if matches!(next, Some(SandboxSession::Accept(_))) {
                ledger.closes.push(0);
            }
            next.map(|session| (session, ledger.closes.len().saturating_sub(1)))
        };

        match next {
            Some((SandboxSession::Refuse(message), _)) => Err(StreamError::Connect {
                url: self.endpoint().to_string(),
                message,
            }),
            Some((SandboxSession::Accept(frames), index)) => Ok(Box::new(SandboxConnection {
                frames: frames.into(),
                ledger: Arc::clone(&self.ledger),
                index,
            })),
            None => std::future::pending().await,
        }
    }

    fn endpoint(&self) -> &str {
        "sandbox://stream"
    }
}

struct SandboxConnection {
    frames: VecDeque<SandboxFrame>,
    ledger: Arc<Mutex<StreamLedger>>,
    index: usize,
}

#[async_trait]
impl StreamConnection for SandboxConnection {
    async fn next_message(&mut self) -> Result<Option<String>, StreamError> {
        while let Some(frame) = self.frames.pop_front() {
            match frame {
                SandboxFrame::Message(text) => return Ok(Some(text)),
                SandboxFrame::Delay(delay) => tokio::time::sleep(delay).await,
                SandboxFrame::Close => return Ok(None),
                SandboxFrame::Fail(message) => return Err(StreamError::Transport { message }),
            }
        }
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.frames.clear();
        if let Some(count) = self.ledger.lock().closes.get_mut(self.index) {
            *count += 1;
        }
        Ok(())
    }
}
