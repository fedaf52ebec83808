//! # Structured Logging
//!
//! Provides structured logging macros and subscriber setup using the tracing
//! ecosystem. Library code only emits events; installing a subscriber is left
//! to the embedding application through [`init_logging`].

use tracing_subscriber::EnvFilter;

use crate::config::ObservabilityConfig;
use crate::errors::{Result, SignError};

/// Create a tracing span for one sign operation.
///
/// ```rust,ignore
/// let span = sign_span!("remote", request.profile);
/// let span = sign_span!("remote", request.profile, remote = %url);
/// ```
#[macro_export]
macro_rules! sign_span {
    ($backend:expr, $profile:expr) => {
        tracing::info_span!(
            "sign",
            backend = %$backend,
            profile = %$profile,
            request_id = %uuid::Uuid::new_v4()
        )
    };
    ($backend:expr, $profile:expr, $($field:tt)*) => {
        tracing::info_span!(
            "sign",
            backend = %$backend,
            profile = %$profile,
            request_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for one certificate pool maintenance tick.
#[macro_export]
macro_rules! rotation_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "certificate_rotation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "certificate_rotation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install a global `fmt` subscriber filtered by `config.log_level`.
///
/// `RUST_LOG` takes precedence when set. Fails if the level does not parse.
/// An already installed global subscriber is left in place.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            SignError::config_error(format!("Invalid log level '{}': {}", config.log_level, e))
        })?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json_logging {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed; keeping it");
        return Ok(());
    }

    tracing::debug!(
        log_level = %config.log_level,
        json_logging = config.json_logging,
        "Logging initialized"
    );
    Ok(())
}
