//! # Configuration Management
//!
//! Signing policy and environment-driven settings.

pub mod policy;
pub mod settings;

pub use policy::{normalize_remote, SigningPolicy, SigningProfile, DEFAULT_EXPIRY};
pub use settings::{ObservabilityConfig, RemoteSettings};
