//! avatarkit: the presentation engine behind a virtual-avatar widget.
//!
//! Preloads the avatar's looped video clips into memory, switches between
//! them without blank frames, gates microphone capture on voice activity so
//! recordings end themselves on sustained silence, and synchronizes
//! typewriter text reveal with speech playback around a remote AI backend.

pub mod assets;
pub mod backend;
pub mod capture;
pub mod config;
pub mod error;
pub mod journal;
pub mod playback;
mod reveal;
pub mod session;
#[cfg(feature = "speaker-rodio")]
pub mod speaker;
pub mod stage;
pub mod state;
pub mod surface;

pub use config::EngineConfig;
pub use journal::{Journal, LogEntry, LogLevel};
pub use session::{AvatarSession, StatusBoard};
pub use state::AvatarState;
