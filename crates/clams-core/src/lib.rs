//! CLAMS Core Library
//!
//! Building blocks for CLAMS analysis apps:
//! - **App metadata**: the capability manifest an app publishes (inputs,
//!   outputs, runtime parameters, versions) and its canonical JSON form.
//! - **MMIF documents**: the interchange document that accumulates source
//!   media and one annotation view per app invocation along a workflow.
//!
//! HTTP wrapping, packaging and analyzer logic live outside this crate;
//! they drive the types here through the operations re-exported from
//! [`core`].

pub mod core;

use crate::core::settings::LoggingSettings;

// =============================================================================
// Logging
// =============================================================================

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` directives take precedence over the configured filter.
/// Calling this more than once keeps the first subscriber.
pub fn init_logging(settings: &LoggingSettings) {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.filter));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(settings.ansi);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    // Avoid panics if already initialized (tests, embedding hosts).
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_is_harmless() {
        let settings = LoggingSettings::default();
        init_logging(&settings);
        init_logging(&settings);
        tracing::info!("logging initialized");
    }
}
