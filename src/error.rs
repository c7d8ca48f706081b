//! Error types for the mixing engine's control plane

use thiserror::Error;

/// Failures the control plane can report.
///
/// Per the engine's error model, malformed or stale channel references are
/// never exceptional: [`crate::engine::Engine`] setters/getters return
/// `bool`/`Option` and treat an unknown or dead id as a no-op. The only
/// operation that can fail outright is opening the output device.
#[derive(Error, Debug)]
pub enum MixerError {
    #[error("no compatible output device is available: {0}")]
    DeviceUnavailable(String),
}

pub type MixerResult<T> = Result<T, MixerError>;
