//! Request-scoped log capture
//!
//! Provides in-memory buffer loggers, the bounded pool that recycles them, and
//! `tracing` subscribers that write through redaction.

mod buffer;
mod pool;
pub mod subscriber;

pub use buffer::{BufferLogger, CaptureBuffer, LogRecord};
pub use pool::{BufferLoggerPool, PooledBufferLogger, DEFAULT_ALLOCATE_TIMEOUT};
pub use subscriber::{capture_dispatch, init_tracing};
