//! Default engine tunables, collected here so both the library defaults and
//! the demo binary's CLI surface agree on the numbers.

/// Normalized volume above which a capture frame counts as speech.
pub const DEFAULT_VOLUME_THRESHOLD: f32 = 0.02;

/// Sustained silence that ends a recording automatically (milliseconds).
pub const DEFAULT_SILENCE_TIMEOUT_MS: u64 = 1_500;

/// Per-character interval for the user-text typewriter (milliseconds).
pub const DEFAULT_USER_REVEAL_MS: u64 = 12;

/// Per-character interval for the assistant-text typewriter (milliseconds).
pub const DEFAULT_AI_REVEAL_MS: u64 = 15;

/// Delay between starting the user reveal and the assistant reveal, so the
/// two are visibly staggered (milliseconds).
pub const DEFAULT_AI_REVEAL_STAGGER_MS: u64 = 200;

/// Pause shown in the Listening state before a request goes out (milliseconds).
pub const DEFAULT_PRE_SEND_PAUSE_MS: u64 = 500;

/// Interval of the advisory backend state poll (milliseconds).
pub const DEFAULT_STATE_POLL_MS: u64 = 2_000;

/// Speaking-rate estimate used to size the Talking window for fire-and-forget
/// speech requests (150 words per minute).
pub const DEFAULT_WORDS_PER_SECOND: f32 = 2.5;

/// Capture frame duration handed to the level meter (milliseconds).
pub const DEFAULT_FRAME_MS: u64 = 30;

/// Frames buffered between the capture device and the monitor loop.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
