//! # Utility Modules
//!
//! Supporting utilities for logging, metrics and timeouts.
//!
//! ## Components
//! - **Logging**: Subscriber setup driven by `LoggingConfig`
//! - **Metrics**: Atomic counters for connections, requests and errors
//! - **Timeout**: Async timeout wrappers and default durations

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{Metrics, MetricsSnapshot};
