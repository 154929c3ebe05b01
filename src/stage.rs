//! State switching for the avatar video stack.
//!
//! Transitions pre-roll the target clip before revealing it so a switch never
//! shows a blank frame: the target starts playing while hidden, and only once
//! playback is confirmed does the visibility swap happen.

use crate::assets::AssetCatalog;
use crate::journal::Journal;
use crate::state::AvatarState;
use crate::surface::VideoSurface;
use std::sync::Arc;
use tokio::sync::watch;

/// Owns which avatar state is currently visible.
pub struct Stage {
    surface: Arc<dyn VideoSurface>,
    journal: Journal,
    // None until the first transition settles, so the startup transition to
    // Standing performs a real pre-roll instead of short-circuiting.
    current: watch::Sender<Option<AvatarState>>,
}

impl Stage {
    pub fn new(surface: Arc<dyn VideoSurface>, journal: Journal) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            surface,
            journal,
            current,
        }
    }

    /// Bind every preloaded handle to its video element.
    pub fn mount(&self, catalog: &AssetCatalog) {
        for entry in catalog.iter() {
            self.surface.attach_source(entry.state, &entry.handle);
        }
    }

    /// The state currently considered visible.
    pub fn current(&self) -> AvatarState {
        self.current.borrow().unwrap_or(AvatarState::Standing)
    }

    /// Subscribe to state changes. Holds `None` until the first transition.
    pub fn watch(&self) -> watch::Receiver<Option<AvatarState>> {
        self.current.subscribe()
    }

    /// Switch the visible clip to `target`.
    ///
    /// Calling with the already-active state is a no-op beyond refreshing the
    /// published current state. Rapid successive calls are not queued; callers
    /// that need strict ordering must serialize their own calls.
    pub async fn transition_to(&self, target: AvatarState) {
        if *self.current.borrow() == Some(target) {
            self.current.send_replace(Some(target));
            return;
        }

        if let Err(err) = self.surface.begin_playback(target).await {
            // Swap anyway so the visible element tracks the logical state.
            self.journal
                .error(format!("playback start failed for {target}: {err}"));
        }

        self.surface.activate(target);
        for state in AvatarState::ALL {
            if state != target {
                self.surface.deactivate(state);
            }
        }
        self.current.send_replace(Some(target));
        self.journal.info(format!("avatar state -> {target}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetHandle;
    use crate::error::PlaybackError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSurface {
        events: Mutex<Vec<String>>,
        fail_preroll: bool,
    }

    impl RecordingSurface {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[async_trait]
    impl VideoSurface for RecordingSurface {
        fn attach_source(&self, state: AvatarState, _handle: &AssetHandle) {
            self.push(format!("attach:{state}"));
        }

        async fn begin_playback(&self, state: AvatarState) -> Result<(), PlaybackError> {
            self.push(format!("preroll:{state}"));
            if self.fail_preroll {
                Err(PlaybackError::StartFailed("autoplay blocked".into()))
            } else {
                Ok(())
            }
        }

        fn activate(&self, state: AvatarState) {
            self.push(format!("activate:{state}"));
        }

        fn deactivate(&self, state: AvatarState) {
            self.push(format!("deactivate:{state}"));
        }
    }

    #[tokio::test]
    async fn preroll_happens_before_the_visibility_swap() {
        let surface = Arc::new(RecordingSurface::default());
        let stage = Stage::new(surface.clone(), Journal::new());

        stage.transition_to(AvatarState::Talking).await;

        let events = surface.events();
        let preroll = events.iter().position(|e| e == "preroll:talking").unwrap();
        let activate = events.iter().position(|e| e == "activate:talking").unwrap();
        assert!(preroll < activate, "target must play before it is shown");
        assert_eq!(stage.current(), AvatarState::Talking);
        // Every other state gets paused and rewound.
        let deactivated = events.iter().filter(|e| e.starts_with("deactivate:")).count();
        assert_eq!(deactivated, AvatarState::ALL.len() - 1);
    }

    #[tokio::test]
    async fn transition_to_active_state_is_idempotent() {
        let surface = Arc::new(RecordingSurface::default());
        let stage = Stage::new(surface.clone(), Journal::new());

        stage.transition_to(AvatarState::Listening).await;
        let after_first = surface.events().len();

        for _ in 0..3 {
            stage.transition_to(AvatarState::Listening).await;
        }
        assert_eq!(
            surface.events().len(),
            after_first,
            "no duplicate pre-roll for an already-active state"
        );
        assert_eq!(stage.current(), AvatarState::Listening);
    }

    #[tokio::test]
    async fn failed_preroll_still_swaps_and_journals() {
        let surface = Arc::new(RecordingSurface {
            fail_preroll: true,
            ..RecordingSurface::default()
        });
        let journal = Journal::new();
        let stage = Stage::new(surface.clone(), journal.clone());

        stage.transition_to(AvatarState::Thinking).await;

        assert_eq!(stage.current(), AvatarState::Thinking);
        assert!(surface.events().iter().any(|e| e == "activate:thinking"));
        assert!(
            journal
                .entries()
                .iter()
                .any(|e| e.message.contains("playback start failed")),
            "failure must reach the log sink"
        );
    }
}
