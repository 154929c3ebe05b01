//! Error types for the avatar engine.
//!
//! Failures are absorbed at component boundaries: each one becomes a journal
//! entry plus a safe transition back to Standing or Idle, never a fault the
//! caller has to unwind.

use thiserror::Error;

/// Errors raised while acquiring or running a microphone capture session.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("capture stream failed: {0}")]
    Stream(String),
}

/// Errors raised by the audio/video playback side of the surface.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("playback failed to start: {0}")]
    StartFailed(String),

    #[error("audio playback failed: {0}")]
    Failed(String),
}

/// Errors raised by calls into the remote backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("backend rejected the request: {0}")]
    Rejected(String),
}

/// Errors raised by engine configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(feature = "mic-cpal")]
impl From<cpal::DevicesError> for CaptureError {
    fn from(err: cpal::DevicesError) -> Self {
        CaptureError::DeviceUnavailable(err.to_string())
    }
}

#[cfg(feature = "mic-cpal")]
impl From<cpal::DefaultStreamConfigError> for CaptureError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        CaptureError::DeviceUnavailable(err.to_string())
    }
}

#[cfg(feature = "mic-cpal")]
impl From<cpal::BuildStreamError> for CaptureError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => {
                CaptureError::DeviceUnavailable(err.to_string())
            }
            other => CaptureError::Stream(other.to_string()),
        }
    }
}

#[cfg(feature = "mic-cpal")]
impl From<cpal::PlayStreamError> for CaptureError {
    fn from(err: cpal::PlayStreamError) -> Self {
        CaptureError::Stream(err.to_string())
    }
}
