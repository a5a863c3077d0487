//! Client-side telemetry state for the RiskLens console.
//!
//! Provides:
//! - A fixed-capacity, newest-first history of stream records
//! - The process-wide connected/disconnected signal
//! - Timestamped lifecycle events emitted via channels

pub mod buffer;
pub mod events;
pub mod signal;

pub use buffer::{TelemetryBuffer, TELEMETRY_CAPACITY};
pub use events::{EventSink, StreamEvent, StreamEventKind};
pub use signal::{ConnectionSignal, ConnectionState, ConnectionWatcher};
