//! Capture session lifecycle.
//!
//! A session moves Idle -> Recording -> (Stopping) -> Idle. Recording buffers
//! ordered binary chunks while the monitor evaluates each frame against the
//! silence gate; the session ends on the armed deadline, on a manual stop, or
//! on a stream error, and the hardware guard is dropped exactly once on every
//! path.

use super::gate::SilenceGate;
use super::{CaptureDevice, LevelMeter, RecorderConfig, SpectralLevelMeter};
use crate::error::CaptureError;
use crate::journal::Journal;
use bytes::Bytes;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::time::{sleep_until, Instant};

/// Why a capture session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCause {
    Silence { quiet_ms: u64 },
    Manual,
}

impl StopCause {
    pub fn label(&self) -> &'static str {
        match self {
            StopCause::Silence { .. } => "silence",
            StopCause::Manual => "manual",
        }
    }
}

/// Observability counters collected while recording.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureMetrics {
    pub capture_ms: u64,
    pub frames_seen: usize,
    pub peak_level: f32,
}

/// The finalized session: chunks concatenated into one payload.
#[derive(Debug, Clone)]
pub struct RecordedAudio {
    pub payload: Bytes,
    pub cause: StopCause,
    pub metrics: CaptureMetrics,
}

/// Handle the owner awaits for the session outcome.
#[derive(Debug)]
pub struct CaptureJob {
    outcome: oneshot::Receiver<Result<RecordedAudio, CaptureError>>,
}

impl CaptureJob {
    /// Resolves when the session finalizes, on any stop path.
    pub async fn finished(self) -> Result<RecordedAudio, CaptureError> {
        match self.outcome.await {
            Ok(result) => result,
            Err(_) => Err(CaptureError::Stream("capture task ended abruptly".into())),
        }
    }
}

type MeterFactory = Box<dyn Fn(u32) -> Box<dyn LevelMeter> + Send + Sync>;

struct ActiveCapture {
    stop: Arc<Notify>,
    finished: Arc<AtomicBool>,
}

/// Owns the microphone and at most one capture session at a time.
pub struct VoiceRecorder {
    device: Arc<dyn CaptureDevice>,
    config: RecorderConfig,
    journal: Journal,
    meter_factory: MeterFactory,
    active: Option<ActiveCapture>,
}

impl VoiceRecorder {
    pub fn new(device: Arc<dyn CaptureDevice>, config: RecorderConfig, journal: Journal) -> Self {
        Self {
            device,
            config,
            journal,
            meter_factory: Box::new(|sample_rate| Box::new(SpectralLevelMeter::new(sample_rate))),
            active: None,
        }
    }

    /// Swap the level meter implementation used by future sessions.
    pub fn set_meter_factory<F>(&mut self, factory: F)
    where
        F: Fn(u32) -> Box<dyn LevelMeter> + Send + Sync + 'static,
    {
        self.meter_factory = Box::new(factory);
    }

    pub fn is_recording(&self) -> bool {
        self.active
            .as_ref()
            .map(|active| !active.finished.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Begin a capture session.
    ///
    /// Returns `Ok(None)` when a session is already running: the existing one
    /// keeps its hardware handle and no second acquisition happens. Device
    /// errors leave the recorder Idle with no partial session.
    pub fn start(&mut self) -> Result<Option<CaptureJob>, CaptureError> {
        if self.is_recording() {
            self.journal.info("recording already in progress");
            return Ok(None);
        }

        let stream = self.device.open(&self.config)?;
        let meter = (self.meter_factory)(stream.sample_rate);
        let stop = Arc::new(Notify::new());
        let finished = Arc::new(AtomicBool::new(false));
        let (outcome_tx, outcome_rx) = oneshot::channel();

        tokio::spawn(run_capture(
            stream,
            self.config.clone(),
            meter,
            self.journal.clone(),
            stop.clone(),
            finished.clone(),
            outcome_tx,
        ));

        self.active = Some(ActiveCapture { stop, finished });
        Ok(Some(CaptureJob {
            outcome: outcome_rx,
        }))
    }

    /// Ask the running session to finalize. No-op when Idle.
    pub fn request_stop(&self) {
        if let Some(active) = &self.active {
            if !active.finished.load(Ordering::Relaxed) {
                active.stop.notify_one();
            }
        }
    }
}

async fn run_capture(
    mut stream: super::CaptureStream,
    config: RecorderConfig,
    mut meter: Box<dyn LevelMeter>,
    journal: Journal,
    stop: Arc<Notify>,
    finished: Arc<AtomicBool>,
    outcome: oneshot::Sender<Result<RecordedAudio, CaptureError>>,
) {
    let sample_rate = stream.sample_rate;
    let started = Instant::now();
    let mut gate = SilenceGate::new(config.volume_threshold, config.silence_timeout);
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut metrics = CaptureMetrics::default();

    let cause = loop {
        let deadline = gate.deadline();
        tokio::select! {
            _ = stop.notified() => break Ok(StopCause::Manual),
            _ = sleep_until(deadline.unwrap_or_else(far_future)), if deadline.is_some() => {
                break Ok(StopCause::Silence {
                    quiet_ms: config.silence_timeout.as_millis() as u64,
                });
            }
            frame = stream.frames.recv() => match frame {
                Some(samples) => {
                    let level = meter.level(&samples);
                    metrics.frames_seen += 1;
                    if level > metrics.peak_level {
                        metrics.peak_level = level;
                    }
                    gate.observe(level, Instant::now());
                    chunks.push(pcm16_chunk(&samples));
                }
                None => break Err(CaptureError::Stream(
                    "capture stream closed unexpectedly".into(),
                )),
            }
        }
    };

    // Release hardware before finalizing, on every path.
    drop(stream);
    finished.store(true, Ordering::Relaxed);
    metrics.capture_ms = started.elapsed().as_millis() as u64;

    let report = cause.and_then(|cause| {
        match &cause {
            StopCause::Silence { quiet_ms } => {
                journal.info(format!("silence detected ({quiet_ms} ms), finishing recording"));
            }
            StopCause::Manual => journal.info("recording stopped"),
        }
        let payload = wav_payload(&chunks, sample_rate)?;
        Ok(RecordedAudio {
            payload,
            cause,
            metrics,
        })
    });

    let _ = outcome.send(report);
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400)
}

/// Encode one frame as PCM16-LE, the binary chunk format the session buffers.
pub(super) fn pcm16_chunk(samples: &[f32]) -> Bytes {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let value = (clamped * i16::MAX as f32) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    Bytes::from(out)
}

/// Concatenate the buffered chunks into one payload, wrapped in a WAV header
/// so the backend receives a self-describing file.
pub(super) fn wav_payload(chunks: &[Bytes], sample_rate: u32) -> Result<Bytes, CaptureError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|err| CaptureError::Stream(format!("payload encoding failed: {err}")))?;
        for chunk in chunks {
            for pair in chunk.chunks_exact(2) {
                let sample = i16::from_le_bytes([pair[0], pair[1]]);
                writer
                    .write_sample(sample)
                    .map_err(|err| CaptureError::Stream(format!("payload encoding failed: {err}")))?;
            }
        }
        writer
            .finalize()
            .map_err(|err| CaptureError::Stream(format!("payload encoding failed: {err}")))?;
    }
    Ok(Bytes::from(cursor.into_inner()))
}
