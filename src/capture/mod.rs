//! Voice-activity-gated microphone capture.
//!
//! Provides microphone recording with automatic silence detection: a capture
//! session buffers binary audio chunks while a frequency-domain level monitor
//! arms a silence deadline, and the session finalizes itself once the speaker
//! has been quiet for the configured timeout.

mod analyzer;
#[cfg(feature = "mic-cpal")]
mod device;
mod gate;
mod recorder;
#[cfg(test)]
mod tests;

use crate::config::{
    EngineConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_FRAME_MS, DEFAULT_SILENCE_TIMEOUT_MS,
    DEFAULT_VOLUME_THRESHOLD,
};
use crate::error::CaptureError;
use std::any::Any;
use std::time::Duration;
use tokio::sync::mpsc;

pub use analyzer::{LevelMeter, SpectralLevelMeter};
#[cfg(feature = "mic-cpal")]
pub use device::CpalCaptureDevice;
pub use recorder::{CaptureJob, CaptureMetrics, RecordedAudio, StopCause, VoiceRecorder};

/// Configuration for a silence-aware capture session.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Normalized volume (0..1) above which the user counts as speaking.
    pub volume_threshold: f32,
    /// Sustained silence that ends the session automatically.
    pub silence_timeout: Duration,
    /// Capture frame duration handed to the level meter (milliseconds).
    pub frame_ms: u64,
    /// Frames buffered between the device and the monitor loop.
    pub channel_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            volume_threshold: DEFAULT_VOLUME_THRESHOLD,
            silence_timeout: Duration::from_millis(DEFAULT_SILENCE_TIMEOUT_MS),
            frame_ms: DEFAULT_FRAME_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl From<&EngineConfig> for RecorderConfig {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            volume_threshold: cfg.volume_threshold,
            silence_timeout: cfg.silence_timeout,
            frame_ms: cfg.frame_ms,
            channel_capacity: cfg.channel_capacity,
        }
    }
}

/// One live microphone acquisition.
///
/// Frames of mono f32 samples arrive on `frames`; dropping `guard` releases
/// the underlying hardware. The guard is dropped exactly once per session, on
/// manual stop, automatic stop, and stream error alike.
pub struct CaptureStream {
    pub frames: mpsc::Receiver<Vec<f32>>,
    pub sample_rate: u32,
    pub guard: Box<dyn Any + Send>,
}

/// A microphone the recorder can open. Opening acquires the hardware; errors
/// map to `PermissionDenied` or `DeviceUnavailable` so a failed start leaves
/// no partial session behind.
pub trait CaptureDevice: Send + Sync {
    fn open(&self, config: &RecorderConfig) -> Result<CaptureStream, CaptureError>;
}
