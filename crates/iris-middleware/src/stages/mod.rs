//! Built-in middleware stages.

pub mod logging;

pub use logging::LoggingMiddleware;
