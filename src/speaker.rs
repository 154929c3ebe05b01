//! Rodio-backed speech playback.
//!
//! Downloads the response audio, then decodes and plays it on a dedicated
//! thread (audio output streams are tied to the thread that created them).
//! `start` resolves once the sink is actually playing, which is the confirmed
//! start the synchronized controller sequences on.

use crate::error::PlaybackError;
use crate::playback::{AudioDriver, AudioOutput, PlaybackEnd, PlayingAudio};
use async_trait::async_trait;
use bytes::Bytes;
use rodio::{Decoder, OutputStream, Sink, Source};
use std::io::Cursor;
use std::time::Duration;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Plays response audio through the default output device.
pub struct RodioSpeaker {
    client: reqwest::Client,
}

impl RodioSpeaker {
    pub fn new() -> Result<Self, PlaybackError> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|err| PlaybackError::StartFailed(err.to_string()))?;
        Ok(Self { client })
    }

    async fn download(&self, url: &str) -> Result<Bytes, PlaybackError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| PlaybackError::StartFailed(err.to_string()))?;
        response
            .bytes()
            .await
            .map_err(|err| PlaybackError::StartFailed(err.to_string()))
    }
}

#[async_trait]
impl AudioOutput for RodioSpeaker {
    async fn start(&self, url: &str) -> Result<PlayingAudio, PlaybackError> {
        let bytes = self.download(url).await?;
        let (playing, driver) = PlayingAudio::channel();
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

        std::thread::spawn(move || playback_thread(bytes, driver, ready_tx));

        match ready_rx.await {
            Ok(Ok(())) => Ok(playing),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(PlaybackError::StartFailed(
                "playback thread exited before starting".into(),
            )),
        }
    }
}

fn playback_thread(
    bytes: Bytes,
    driver: AudioDriver,
    ready: tokio::sync::oneshot::Sender<Result<(), PlaybackError>>,
) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(err) => {
            let _ = ready.send(Err(PlaybackError::StartFailed(err.to_string())));
            return;
        }
    };
    let sink = match Sink::try_new(&handle) {
        Ok(sink) => sink,
        Err(err) => {
            let _ = ready.send(Err(PlaybackError::StartFailed(err.to_string())));
            return;
        }
    };
    let source = match Decoder::new(Cursor::new(bytes.to_vec())) {
        Ok(source) => source,
        Err(err) => {
            let _ = ready.send(Err(PlaybackError::StartFailed(format!(
                "decode failed: {err}"
            ))));
            return;
        }
    };

    sink.append(source.convert_samples::<f32>());
    sink.play();
    let _ = ready.send(Ok(()));

    loop {
        if driver.stop_requested() {
            sink.stop();
            driver.finish(PlaybackEnd::Stopped);
            return;
        }
        if sink.empty() {
            driver.finish(PlaybackEnd::Finished);
            return;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
