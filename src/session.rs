//! The session context owning the four engine components.
//!
//! One `AvatarSession` wires the asset cache, the stage, the recorder, and
//! the synchronized playback controller around a backend, and runs the three
//! user-facing pipelines: chat, speak, and voice. Failures never escape a
//! pipeline; they become journal entries and a transition back to Standing.

use crate::assets::{AssetCache, AssetFetcher};
use crate::backend::{Backend, VoiceReply};
use crate::capture::{CaptureDevice, LevelMeter, RecorderConfig, VoiceRecorder};
use crate::config::EngineConfig;
use crate::journal::Journal;
use crate::playback::{AudioOutput, SyncedPlayback};
use crate::reveal::reveal_text;
use crate::stage::Stage;
use crate::state::AvatarState;
use crate::surface::{ChatAuthor, ChatSurface, VideoSurface};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Delay before the fire-and-forget voice variant is assumed to be talking.
const PROCESSING_TALK_DELAY: Duration = Duration::from_secs(2);

/// Assumed talking window for the fire-and-forget voice variant.
const PROCESSING_TALK_WINDOW: Duration = Duration::from_secs(5);

/// The externally queryable "displayed state" string: written by local
/// transitions and overwritten by the advisory backend poll, exactly like the
/// widget's single state field.
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<String>>,
}

impl StatusBoard {
    pub fn set(&self, value: impl Into<String>) {
        *self.lock() = value.into();
    }

    pub fn get(&self) -> String {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owns the engine components for one widget instance.
pub struct AvatarSession {
    config: EngineConfig,
    journal: Journal,
    backend: Arc<dyn Backend>,
    stage: Arc<Stage>,
    chat: Arc<dyn ChatSurface>,
    playback: SyncedPlayback,
    recorder: Mutex<VoiceRecorder>,
    status: StatusBoard,
}

impl AvatarSession {
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn Backend>,
        video: Arc<dyn VideoSurface>,
        chat: Arc<dyn ChatSurface>,
        audio_output: Arc<dyn AudioOutput>,
        capture_device: Arc<dyn CaptureDevice>,
    ) -> Self {
        let journal = Journal::new();
        let stage = Arc::new(Stage::new(video, journal.clone()));
        let playback = SyncedPlayback::new(
            audio_output,
            stage.clone(),
            chat.clone(),
            journal.clone(),
            config.clone(),
        );
        let recorder = VoiceRecorder::new(
            capture_device,
            RecorderConfig::from(&config),
            journal.clone(),
        );
        let status = StatusBoard::default();
        status.set(AvatarState::Standing.name());

        // Keep the displayed state in step with local transitions.
        let board = status.clone();
        let mut changes = stage.watch();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                if let Some(state) = *changes.borrow_and_update() {
                    board.set(state.name());
                }
            }
        });

        Self {
            config,
            journal,
            backend,
            stage,
            chat,
            playback,
            recorder: Mutex::new(recorder),
            status,
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn stage(&self) -> &Arc<Stage> {
        &self.stage
    }

    pub fn status_board(&self) -> StatusBoard {
        self.status.clone()
    }

    /// Swap the level meter used by future capture sessions.
    pub fn set_meter_factory<F>(&self, factory: F)
    where
        F: Fn(u32) -> Box<dyn LevelMeter> + Send + Sync + 'static,
    {
        self.lock_recorder().set_meter_factory(factory);
    }

    /// Preload every avatar clip, bind the handles, and settle on Standing.
    /// Individual download failures degrade to remote playback; preloading as
    /// a whole always completes.
    pub async fn preload(&self, fetcher: &dyn AssetFetcher) {
        self.journal.info("preloading avatar videos");
        let cache = AssetCache::new(self.journal.clone());
        let progress_journal = self.journal.clone();
        let catalog = cache
            .preload_all(fetcher, |state, loaded, total| {
                progress_journal.info(format!("cached {} ({loaded}/{total})", state.name()));
            })
            .await;
        self.stage.mount(&catalog);
        self.journal.success("all avatar videos ready");
        self.stage.transition_to(AvatarState::Standing).await;
        self.journal.success("avatar ready");
    }

    /// The chat pipeline: Listening, Thinking, then a Writing typewriter for
    /// the reply, settling on Standing.
    pub async fn send_chat(&self, message: &str) {
        let message = message.trim();
        if message.is_empty() {
            self.journal.error("cannot send an empty message");
            return;
        }

        let user_panel = self.chat.push_message(ChatAuthor::User);
        user_panel.set_text(message);

        self.stage.transition_to(AvatarState::Listening).await;
        self.journal.info(format!("message received: \"{message}\""));
        sleep(self.config.pre_send_pause).await;

        self.stage.transition_to(AvatarState::Thinking).await;
        self.journal.info("waiting for the assistant");

        match self.backend.chat(message).await {
            Ok(reply) => {
                let panel = self.chat.push_message(ChatAuthor::Assistant);
                self.stage.transition_to(AvatarState::Writing).await;
                self.journal.info("assistant is writing");
                reveal_text(panel, reply, self.config.ai_reveal_interval).await;
                self.stage.transition_to(AvatarState::Standing).await;
                self.journal.success("response complete");
            }
            Err(err) => {
                self.journal.error(format!("chat failed: {err}"));
                self.stage.transition_to(AvatarState::Standing).await;
            }
        }
    }

    /// The speak pipeline: the backend voices the text itself, so the avatar
    /// talks for an estimated window and then stands down on a timer.
    pub async fn speak(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            self.journal.error("cannot speak an empty text");
            return;
        }

        self.stage.transition_to(AvatarState::Listening).await;
        self.journal.info(format!("speech requested: \"{text}\""));
        sleep(self.config.pre_send_pause).await;

        self.stage.transition_to(AvatarState::Thinking).await;
        self.journal.info("synthesizing speech");

        match self.backend.speak(text).await {
            Ok(()) => {
                self.journal.success("speech started");
                self.stage.transition_to(AvatarState::Talking).await;
                let window = estimated_speech_window(text, self.config.words_per_second);
                let stage = self.stage.clone();
                let journal = self.journal.clone();
                tokio::spawn(async move {
                    sleep(window).await;
                    stage.transition_to(AvatarState::Standing).await;
                    journal.info("speech complete");
                });
            }
            Err(err) => {
                self.journal.error(format!("speech failed: {err}"));
                self.stage.transition_to(AvatarState::Standing).await;
            }
        }
    }

    pub fn is_recording(&self) -> bool {
        self.lock_recorder().is_recording()
    }

    /// Ask a running recording to finalize. No-op when idle.
    pub fn stop_recording(&self) {
        self.lock_recorder().request_stop();
    }

    /// Start or stop the microphone, mirroring the widget's single button.
    pub async fn toggle_recording(&self) {
        if self.is_recording() {
            self.stop_recording();
        } else {
            self.record_and_send().await;
        }
    }

    /// The voice pipeline: record until silence (or a manual stop), upload
    /// the payload, and hand the reply to the synchronized playback.
    pub async fn record_and_send(&self) {
        let job = {
            let mut recorder = self.lock_recorder();
            match recorder.start() {
                Ok(Some(job)) => job,
                Ok(None) => return,
                Err(err) => {
                    self.journal.error(format!("microphone error: {err}"));
                    return;
                }
            }
        };

        self.stage.transition_to(AvatarState::Listening).await;
        self.journal
            .success("recording started (automatic silence detection armed)");

        let outcome = job.finished().await;

        self.stage.transition_to(AvatarState::Thinking).await;
        self.journal.info("recording stopped, processing");

        let audio = match outcome {
            Ok(audio) => audio,
            Err(err) => {
                self.journal.error(format!("recording failed: {err}"));
                self.stage.transition_to(AvatarState::Standing).await;
                return;
            }
        };

        self.journal.info(format!(
            "uploading voice payload ({:.1} KiB, stop: {})",
            audio.payload.len() as f64 / 1024.0,
            audio.cause.label()
        ));

        match self.backend.voice(audio.payload).await {
            Ok(VoiceReply::Answered(answer)) => {
                self.playback
                    .play(
                        answer.audio_url.as_deref(),
                        answer.stt_text.as_deref(),
                        answer.ai_response.as_deref(),
                    )
                    .await;
            }
            Ok(VoiceReply::Processing) => {
                self.journal
                    .success("voice accepted, the backend is processing it");
                let stage = self.stage.clone();
                let journal = self.journal.clone();
                tokio::spawn(async move {
                    sleep(PROCESSING_TALK_DELAY).await;
                    stage.transition_to(AvatarState::Talking).await;
                    sleep(PROCESSING_TALK_WINDOW).await;
                    stage.transition_to(AvatarState::Standing).await;
                    journal.info("processing window elapsed");
                });
            }
            Err(err) => {
                self.journal.error(format!("voice request failed: {err}"));
                self.stage.transition_to(AvatarState::Standing).await;
            }
        }
    }

    /// Poll `GET /` on a fixed interval and mirror the reported state onto
    /// the status board. Advisory only: it never drives video transitions.
    pub fn spawn_state_poller(&self) -> JoinHandle<()> {
        let backend = self.backend.clone();
        let board = self.status.clone();
        let interval = self.config.state_poll_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match backend.current_state().await {
                    Ok(state) => board.set(state),
                    Err(err) => {
                        tracing::debug!("state poll failed: {err}");
                        board.set("error");
                    }
                }
            }
        })
    }

    fn lock_recorder(&self) -> MutexGuard<'_, VoiceRecorder> {
        self.recorder
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Rough duration of spoken text at the configured speaking rate.
fn estimated_speech_window(text: &str, words_per_second: f32) -> Duration {
    let words = text.split_whitespace().count().max(1);
    Duration::from_secs_f32(words as f32 / words_per_second.max(0.1))
}
