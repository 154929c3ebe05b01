//! Synchronized speech playback and text reveal.
//!
//! Plays a remotely supplied audio stream while revealing the transcript and
//! the assistant reply as staggered typewriters, keeping the avatar in
//! Talking for the duration and settling back to Standing when the audio
//! ends, fails, or never had a source to begin with.

use crate::config::EngineConfig;
use crate::error::PlaybackError;
use crate::journal::Journal;
use crate::reveal::reveal_text;
use crate::stage::Stage;
use crate::state::AvatarState;
use crate::surface::{ChatAuthor, ChatSurface, TextPanel};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::sleep;

/// How one playback ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// The audio ran to natural completion.
    Finished,
    /// The audio failed after a confirmed start.
    Failed,
    /// The playback was halted by a stop request (session supersession).
    Stopped,
}

/// The caller-facing half of one running playback.
pub struct PlayingAudio {
    finished: tokio::sync::oneshot::Receiver<PlaybackEnd>,
    stop_flag: Arc<AtomicBool>,
}

impl PlayingAudio {
    /// Create the two halves of a playback: the caller side and the side an
    /// `AudioOutput` implementation drives.
    pub fn channel() -> (PlayingAudio, AudioDriver) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let stop_flag = Arc::new(AtomicBool::new(false));
        (
            PlayingAudio {
                finished: rx,
                stop_flag: stop_flag.clone(),
            },
            AudioDriver {
                finished: tx,
                stop_flag,
            },
        )
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop_flag.clone())
    }

    /// Resolves with the terminal event. A driver that disappears without
    /// reporting counts as a failure.
    pub async fn finished(self) -> PlaybackEnd {
        self.finished.await.unwrap_or(PlaybackEnd::Failed)
    }
}

/// Requests an immediate halt of one playback.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The implementation-facing half of one running playback.
pub struct AudioDriver {
    finished: tokio::sync::oneshot::Sender<PlaybackEnd>,
    stop_flag: Arc<AtomicBool>,
}

impl AudioDriver {
    /// Whether a stop has been requested; implementations poll this.
    pub fn stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    /// Report the terminal event.
    pub fn finish(self, end: PlaybackEnd) {
        let _ = self.finished.send(end);
    }
}

/// Something that can play an audio URL. `start` resolves once playback has
/// actually begun, so callers can sequence work on confirmed audio.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    async fn start(&self, url: &str) -> Result<PlayingAudio, PlaybackError>;
}

struct SessionSlot {
    id: u64,
    stop: StopHandle,
}

/// Coordinates the single audio slot, the Talking window, and the reveals.
pub struct SyncedPlayback {
    output: Arc<dyn AudioOutput>,
    stage: Arc<Stage>,
    chat: Arc<dyn ChatSurface>,
    journal: Journal,
    config: EngineConfig,
    current: Arc<Mutex<Option<SessionSlot>>>,
    next_id: AtomicU64,
}

impl SyncedPlayback {
    pub fn new(
        output: Arc<dyn AudioOutput>,
        stage: Arc<Stage>,
        chat: Arc<dyn ChatSurface>,
        journal: Journal,
        config: EngineConfig,
    ) -> Self {
        Self {
            output,
            stage,
            chat,
            journal,
            config,
            current: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Play `audio_url` while revealing the supplied texts, settling the
    /// avatar back to Standing when the audio ends or errors. Any session
    /// still playing is stopped before the new one begins.
    pub async fn play(
        &self,
        audio_url: Option<&str>,
        user_text: Option<&str>,
        ai_text: Option<&str>,
    ) {
        self.preempt();

        let Some(url) = audio_url.filter(|url| !url.is_empty()) else {
            self.reveal_without_audio(user_text, ai_text).await;
            return;
        };

        self.stage.transition_to(AvatarState::Talking).await;
        self.journal.info("playing response audio");

        let user = self.open_bubble(ChatAuthor::User, user_text);
        let ai = self.open_bubble(ChatAuthor::Assistant, ai_text);

        let playing = match self.output.start(url).await {
            Ok(playing) => playing,
            Err(err) => {
                self.journal
                    .error(format!("audio playback failed to start: {err}"));
                // The texts still get shown, just without the typewriter.
                for (panel, text) in user.iter().chain(ai.iter()) {
                    panel.set_text(text);
                }
                self.stage.transition_to(AvatarState::Standing).await;
                return;
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *lock_slot(&self.current) = Some(SessionSlot {
            id,
            stop: playing.stop_handle(),
        });

        // Audio is confirmed: run the reveals concurrently, the assistant one
        // staggered behind the transcript.
        let mut reveal_tasks = Vec::new();
        let mut abort_handles = Vec::new();
        if let Some((panel, text)) = user.clone() {
            let task = tokio::spawn(reveal_text(
                panel,
                text,
                self.config.user_reveal_interval,
            ));
            abort_handles.push(task.abort_handle());
            reveal_tasks.push(task);
        }
        if let Some((panel, text)) = ai.clone() {
            let stagger = self.config.ai_reveal_stagger;
            let interval = self.config.ai_reveal_interval;
            let task = tokio::spawn(async move {
                sleep(stagger).await;
                reveal_text(panel, text, interval).await;
            });
            abort_handles.push(task.abort_handle());
            reveal_tasks.push(task);
        }

        let observer_journal = self.journal.clone();
        tokio::spawn(async move {
            let mut all_completed = true;
            for task in reveal_tasks {
                if task.await.is_err() {
                    all_completed = false;
                }
            }
            if all_completed {
                observer_journal.success("response complete");
            }
        });

        let stage = self.stage.clone();
        let journal = self.journal.clone();
        let current = self.current.clone();
        let full_texts: Vec<(Arc<dyn TextPanel>, String)> =
            user.into_iter().chain(ai).collect();
        tokio::spawn(async move {
            let end = playing.finished().await;
            // A superseded session never touches the stage again, whatever
            // terminal event its driver reports.
            let still_current = {
                let mut slot = lock_slot(&current);
                if slot.as_ref().map(|s| s.id) == Some(id) && end != PlaybackEnd::Stopped {
                    *slot = None;
                    true
                } else {
                    false
                }
            };
            if !still_current {
                return;
            }
            match end {
                PlaybackEnd::Finished => {
                    stage.transition_to(AvatarState::Standing).await;
                    journal.info("audio finished");
                }
                PlaybackEnd::Failed => {
                    for handle in &abort_handles {
                        handle.abort();
                    }
                    for (panel, text) in &full_texts {
                        panel.set_text(text);
                    }
                    stage.transition_to(AvatarState::Standing).await;
                    journal.error("audio playback failed");
                }
                PlaybackEnd::Stopped => {}
            }
        });
    }

    /// Stop whatever is currently playing. Safe to call when idle.
    pub fn preempt(&self) {
        if let Some(slot) = lock_slot(&self.current).take() {
            slot.stop.stop();
            self.journal.info("superseding active playback");
        }
    }

    fn open_bubble(
        &self,
        author: ChatAuthor,
        text: Option<&str>,
    ) -> Option<(Arc<dyn TextPanel>, String)> {
        let text = text.filter(|t| !t.is_empty())?;
        Some((self.chat.push_message(author), text.to_string()))
    }

    /// The no-URL path: reveal whatever text arrived, one bubble at a time,
    /// then settle to Standing. With nothing to show, only the log records it.
    async fn reveal_without_audio(&self, user_text: Option<&str>, ai_text: Option<&str>) {
        let user = self.open_bubble(ChatAuthor::User, user_text);
        let ai = self.open_bubble(ChatAuthor::Assistant, ai_text);
        if user.is_none() && ai.is_none() {
            self.journal
                .error("response contained neither audio nor text");
            return;
        }
        if let Some((panel, text)) = user {
            reveal_text(panel, text.clone(), self.config.user_reveal_interval).await;
            self.journal.info(format!("transcript: \"{text}\""));
        }
        if let Some((panel, text)) = ai {
            reveal_text(panel, text, self.config.ai_reveal_interval).await;
            self.journal.success("assistant reply received");
        }
        self.stage.transition_to(AvatarState::Standing).await;
    }
}

fn lock_slot(
    slot: &Arc<Mutex<Option<SessionSlot>>>,
) -> std::sync::MutexGuard<'_, Option<SessionSlot>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
