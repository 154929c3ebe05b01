//! Engine tunables and their validation.

mod defaults;

use crate::error::ConfigError;
use std::time::Duration;

pub use defaults::{
    DEFAULT_AI_REVEAL_MS, DEFAULT_AI_REVEAL_STAGGER_MS, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_FRAME_MS, DEFAULT_PRE_SEND_PAUSE_MS, DEFAULT_SILENCE_TIMEOUT_MS,
    DEFAULT_STATE_POLL_MS, DEFAULT_USER_REVEAL_MS, DEFAULT_VOLUME_THRESHOLD,
    DEFAULT_WORDS_PER_SECOND,
};

/// Timing and threshold knobs for the whole engine. Validated values keep the
/// capture and reveal loops well behaved.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Normalized volume (0..1) above which the user counts as speaking.
    pub volume_threshold: f32,
    /// Sustained silence that auto-stops a recording.
    pub silence_timeout: Duration,
    /// Per-character interval for the user-text reveal.
    pub user_reveal_interval: Duration,
    /// Per-character interval for the assistant-text reveal.
    pub ai_reveal_interval: Duration,
    /// Fixed offset between the two concurrent reveals.
    pub ai_reveal_stagger: Duration,
    /// Listening pause before a request is sent.
    pub pre_send_pause: Duration,
    /// Advisory backend state poll interval.
    pub state_poll_interval: Duration,
    /// Speaking-rate estimate for fire-and-forget speech windows.
    pub words_per_second: f32,
    /// Capture frame duration handed to the level meter.
    pub frame_ms: u64,
    /// Frames buffered between the capture device and the monitor loop.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            volume_threshold: DEFAULT_VOLUME_THRESHOLD,
            silence_timeout: Duration::from_millis(DEFAULT_SILENCE_TIMEOUT_MS),
            user_reveal_interval: Duration::from_millis(DEFAULT_USER_REVEAL_MS),
            ai_reveal_interval: Duration::from_millis(DEFAULT_AI_REVEAL_MS),
            ai_reveal_stagger: Duration::from_millis(DEFAULT_AI_REVEAL_STAGGER_MS),
            pre_send_pause: Duration::from_millis(DEFAULT_PRE_SEND_PAUSE_MS),
            state_poll_interval: Duration::from_millis(DEFAULT_STATE_POLL_MS),
            words_per_second: DEFAULT_WORDS_PER_SECOND,
            frame_ms: DEFAULT_FRAME_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Reject values that would wedge the capture or reveal loops.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.volume_threshold) {
            return Err(ConfigError::Invalid(format!(
                "volume threshold must be within 0..1, got {}",
                self.volume_threshold
            )));
        }
        if self.silence_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "silence timeout must be non-zero".into(),
            ));
        }
        if self.words_per_second <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "words per second must be positive, got {}",
                self.words_per_second
            )));
        }
        if self.frame_ms == 0 {
            return Err(ConfigError::Invalid(
                "frame duration must be non-zero".into(),
            ));
        }
        if self.state_poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "state poll interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
