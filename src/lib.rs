pub mod api; // REST boundary + HTTP client
pub mod collection; // Pure collection updates
pub mod config;
pub mod derived; // Dashboard aggregates
pub mod error;
pub mod home; // Dashboard
pub mod medications; // Medication board
pub mod models;
pub mod reminders; // Reminder board
pub mod review; // Prescription draft
pub mod session;
pub mod store; // Optimistic record store
pub mod validation;

use tracing_subscriber::EnvFilter;

pub use error::ClientError;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Calling it twice is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    tracing::debug!("{} v{} tracing ready", config::APP_NAME, config::APP_VERSION);
}
