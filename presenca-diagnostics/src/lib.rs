//! # Presença Diagnostics
//!
//! Debugging and diagnostic tools for the attendance controller.
//! Provides logging bootstrap, face-service health probing and session reports.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod debug_logger;
pub mod service_probe;
pub mod session_report;

// Re-export main types
pub use debug_logger::{init_logging, LogFormat, LoggingConfig, LoggingError};
pub use service_probe::{ProbeResult, ServiceProbe};
pub use session_report::{AttemptOutcome, ReportEntry, SessionReport};
