//! Live side of the RiskLens console.
//!
//! Provides:
//! - [`AnalysisRequestClient`] for single-shot risk queries
//! - [`StreamConsumer`], a reconnecting telemetry subscription that owns the
//!   record buffer
//! - HTTP, WebSocket, and scripted sandbox transports behind async traits
//! - [`RiskConsole`], a session combining both flows

pub mod analysis;
pub mod config;
pub mod console;
pub mod consumer;
pub mod http;
pub mod sandbox;
pub mod transport;
pub mod ws;

pub use analysis::AnalysisRequestClient;
pub use config::ConsoleConfig;
pub use console::{ResultSlot, RiskConsole};
pub use consumer::{ConsumerPhase, StreamConsumer, StreamConsumerConfig, StreamHandle};
pub use http::HttpAnalysisTransport;
pub use sandbox::{
    SandboxAnalysisTransport, SandboxFrame, SandboxReply, SandboxSession, SandboxStreamTransport,
};
pub use transport::{AnalysisTransport, StreamConnection, StreamTransport};
pub use ws::WsStreamTransport;
