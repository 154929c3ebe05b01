//! Seams to the rendering surface.
//!
//! The engine never touches layout directly; it drives these traits. A real
//! frontend binds them to its video elements and chat transcript, the tests
//! bind them to recording fakes.

use crate::assets::AssetHandle;
use crate::error::PlaybackError;
use crate::state::AvatarState;
use async_trait::async_trait;
use std::sync::Arc;

/// The stack of per-state video elements.
#[async_trait]
pub trait VideoSurface: Send + Sync {
    /// Assign a playable source to the element backing `state`. Called once
    /// per state after preloading; handles are never re-bound.
    fn attach_source(&self, state: AvatarState, handle: &AssetHandle);

    /// Seek the element to its first frame and begin playback, resolving once
    /// playback has actually started (the pre-roll confirmation).
    async fn begin_playback(&self, state: AvatarState) -> Result<(), PlaybackError>;

    /// Make `state` the sole visible, audible element.
    fn activate(&self, state: AvatarState);

    /// Hide `state`, pause it, and rewind it to the first frame.
    fn deactivate(&self, state: AvatarState);
}

/// A single chat-bubble text container the typewriter writes into.
pub trait TextPanel: Send + Sync {
    fn clear(&self);
    fn append_char(&self, ch: char);
    fn set_text(&self, text: &str);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChatAuthor {
    User,
    Assistant,
}

impl ChatAuthor {
    pub fn label(self) -> &'static str {
        match self {
            ChatAuthor::User => "user",
            ChatAuthor::Assistant => "assistant",
        }
    }
}

/// The chat transcript: appends a new bubble and hands back its text panel.
pub trait ChatSurface: Send + Sync {
    fn push_message(&self, author: ChatAuthor) -> Arc<dyn TextPanel>;
}
