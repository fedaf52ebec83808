//! # Observability
//!
//! Structured logging setup and the span macros used around signing and
//! certificate rotation.

pub mod logging;

pub use logging::init_logging;
