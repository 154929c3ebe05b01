//! The closed set of avatar presentation states.
//!
//! Each state maps to exactly one looped video clip served by the backend.
//! Exactly one state is visible at any time; the rest stay paused and rewound.

use std::fmt;

/// One of the five avatar video loops.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AvatarState {
    Standing,
    Listening,
    Thinking,
    Talking,
    Writing,
}

impl AvatarState {
    /// Every state, in the order assets are preloaded.
    pub const ALL: [AvatarState; 5] = [
        AvatarState::Standing,
        AvatarState::Listening,
        AvatarState::Thinking,
        AvatarState::Talking,
        AvatarState::Writing,
    ];

    /// Wire name used by the backend and in log lines.
    pub fn name(self) -> &'static str {
        match self {
            AvatarState::Standing => "standing",
            AvatarState::Listening => "listening",
            AvatarState::Thinking => "thinking",
            AvatarState::Talking => "talking",
            AvatarState::Writing => "writing",
        }
    }

    /// Human-readable status label shown next to the avatar.
    pub fn label(self) -> &'static str {
        match self {
            AvatarState::Standing => "Waiting",
            AvatarState::Listening => "Listening",
            AvatarState::Thinking => "Thinking",
            AvatarState::Talking => "Talking",
            AvatarState::Writing => "Writing",
        }
    }

    /// File name of the looped clip under `/avatar_videos/`.
    pub fn resource_name(self) -> &'static str {
        match self {
            AvatarState::Standing => "standing.mp4",
            AvatarState::Listening => "listening.mp4",
            AvatarState::Thinking => "thinking.mp4",
            AvatarState::Talking => "talking.mp4",
            AvatarState::Writing => "writing.mp4",
        }
    }

    /// Parse a backend-reported state name.
    pub fn parse(name: &str) -> Option<AvatarState> {
        AvatarState::ALL
            .into_iter()
            .find(|state| state.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for AvatarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
