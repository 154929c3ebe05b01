//! Console demo for the avatar engine.
//!
//! Wires the real backend, microphone, and speaker to a line-based prompt:
//! plain text is sent as chat, `/speak` asks the backend to voice a text,
//! `/record` toggles the voice-activity-gated microphone.

#[cfg(not(all(feature = "mic-cpal", feature = "speaker-rodio")))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("the avatarkit binary needs the default `mic-cpal` and `speaker-rodio` features")
}

#[cfg(all(feature = "mic-cpal", feature = "speaker-rodio"))]
mod console {
    use avatarkit::assets::AssetHandle;
    use avatarkit::backend::HttpBackend;
    use avatarkit::capture::CpalCaptureDevice;
    use avatarkit::error::PlaybackError;
    use avatarkit::speaker::RodioSpeaker;
    use avatarkit::surface::{ChatAuthor, ChatSurface, TextPanel, VideoSurface};
    use avatarkit::{AvatarSession, AvatarState, EngineConfig};
    use async_trait::async_trait;
    use clap::Parser;
    use std::io::{BufRead, Write};
    use std::sync::Arc;

    #[derive(Debug, Parser)]
    #[command(about = "avatarkit console demo", version)]
    pub struct Cli {
        /// Backend base URL
        #[arg(
            long,
            env = "AVATARKIT_BACKEND_URL",
            default_value = "http://localhost:8011"
        )]
        backend_url: String,

        /// Preferred audio input device name
        #[arg(long)]
        input_device: Option<String>,

        /// Print detected audio input devices and exit
        #[arg(long, default_value_t = false)]
        list_input_devices: bool,

        /// Skip preloading avatar clips at startup
        #[arg(long, default_value_t = false)]
        no_preload: bool,
    }

    /// Stand-in for the video stack: transitions become console lines.
    struct ConsoleVideo;

    #[async_trait]
    impl VideoSurface for ConsoleVideo {
        fn attach_source(&self, state: AvatarState, handle: &AssetHandle) {
            let location = if handle.is_cached() { "memory" } else { "remote" };
            tracing::debug!("bound {state} clip from {location}");
        }

        async fn begin_playback(&self, _state: AvatarState) -> Result<(), PlaybackError> {
            Ok(())
        }

        fn activate(&self, state: AvatarState) {
            println!("\n[avatar] {}", state.label());
        }

        fn deactivate(&self, _state: AvatarState) {}
    }

    /// One chat bubble, streamed to stdout as the typewriter reveals it.
    struct ConsolePanel {
        prefix: &'static str,
    }

    impl TextPanel for ConsolePanel {
        fn clear(&self) {
            print!("\n{} ", self.prefix);
            let _ = std::io::stdout().flush();
        }

        fn append_char(&self, ch: char) {
            print!("{ch}");
            let _ = std::io::stdout().flush();
        }

        fn set_text(&self, text: &str) {
            println!("\n{} {text}", self.prefix);
        }
    }

    struct ConsoleChat;

    impl ChatSurface for ConsoleChat {
        fn push_message(&self, author: ChatAuthor) -> Arc<dyn TextPanel> {
            let prefix = match author {
                ChatAuthor::User => "you>",
                ChatAuthor::Assistant => "avatar>",
            };
            Arc::new(ConsolePanel { prefix })
        }
    }

    pub async fn run() -> anyhow::Result<()> {
        let cli = Cli::parse();
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "avatarkit=info".into()),
            )
            .init();

        if cli.list_input_devices {
            for name in CpalCaptureDevice::list_devices()? {
                println!("{name}");
            }
            return Ok(());
        }

        let config = EngineConfig::default();
        config.validate()?;

        let backend = Arc::new(HttpBackend::new(cli.backend_url.as_str())?);
        let session = Arc::new(AvatarSession::new(
            config,
            backend.clone(),
            Arc::new(ConsoleVideo),
            Arc::new(ConsoleChat),
            Arc::new(RodioSpeaker::new()?),
            Arc::new(CpalCaptureDevice::new(cli.input_device.as_deref())),
        ));

        if !cli.no_preload {
            session.preload(backend.as_ref()).await;
        }
        let poller = session.spawn_state_poller();

        println!("chat with the avatar; /speak <text>, /record, /state, /quit");
        let (line_tx, mut line_rx) = tokio::sync::mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        });

        while let Some(line) = line_rx.recv().await {
            let line = line.trim().to_string();
            match line.as_str() {
                "" => {}
                "/quit" => break,
                "/state" => println!("[state] {}", session.status_board().get()),
                "/record" => {
                    let session = session.clone();
                    if session.is_recording() {
                        session.stop_recording();
                    } else {
                        tokio::spawn(async move { session.record_and_send().await });
                    }
                }
                _ => {
                    if let Some(text) = line.strip_prefix("/speak ") {
                        let session = session.clone();
                        let text = text.to_string();
                        tokio::spawn(async move { session.speak(&text).await });
                    } else {
                        let session = session.clone();
                        tokio::spawn(async move { session.send_chat(&line).await });
                    }
                }
            }
        }

        poller.abort();
        Ok(())
    }
}

#[cfg(all(feature = "mic-cpal", feature = "speaker-rodio"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    console::run().await
}
