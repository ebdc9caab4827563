//! Error types for ignition providers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IgnitionError {
    #[error("environment is required")]
    EnvironmentRequired,

    #[error("provider trigger failed: {0}")]
    Provider(String),
}
