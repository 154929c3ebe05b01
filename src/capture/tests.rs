use super::recorder::{pcm16_chunk, wav_payload};
use super::{
    CaptureDevice, CaptureJob, CaptureStream, LevelMeter, RecorderConfig, StopCause, VoiceRecorder,
};
use crate::error::CaptureError;
use crate::journal::Journal;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Reads the first sample of each frame as the level, so tests can script
/// exact volume sequences.
struct PassthroughMeter;

impl LevelMeter for PassthroughMeter {
    fn level(&mut self, samples: &[f32]) -> f32 {
        samples.first().copied().unwrap_or(0.0)
    }

    fn name(&self) -> &'static str {
        "passthrough_meter"
    }
}

#[derive(Default)]
struct DeviceProbe {
    sender: Mutex<Option<mpsc::Sender<Vec<f32>>>>,
    releases: AtomicUsize,
}

struct GuardProbe(Arc<DeviceProbe>);

impl Drop for GuardProbe {
    fn drop(&mut self) {
        self.0.releases.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct ScriptedDevice {
    opens: AtomicUsize,
    fail_with: Mutex<Option<CaptureError>>,
    probe: Arc<DeviceProbe>,
}

impl ScriptedDevice {
    fn failing(err: CaptureError) -> Self {
        Self {
            fail_with: Mutex::new(Some(err)),
            ..Self::default()
        }
    }

    fn sender(&self) -> mpsc::Sender<Vec<f32>> {
        self.probe
            .sender
            .lock()
            .unwrap()
            .clone()
            .expect("device has been opened")
    }

    fn drop_sender(&self) {
        self.probe.sender.lock().unwrap().take();
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }

    fn releases(&self) -> usize {
        self.probe.releases.load(Ordering::Relaxed)
    }
}

impl CaptureDevice for ScriptedDevice {
    fn open(&self, config: &RecorderConfig) -> Result<CaptureStream, CaptureError> {
        if let Some(err) = self.fail_with.lock().unwrap().take() {
            return Err(err);
        }
        self.opens.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        *self.probe.sender.lock().unwrap() = Some(tx);
        Ok(CaptureStream {
            frames: rx,
            sample_rate: 16_000,
            guard: Box::new(GuardProbe(self.probe.clone())),
        })
    }
}

fn scripted_recorder(device: Arc<ScriptedDevice>) -> VoiceRecorder {
    let mut recorder = VoiceRecorder::new(device, RecorderConfig::default(), Journal::new());
    recorder.set_meter_factory(|_| Box::new(PassthroughMeter));
    recorder
}

fn must_start(recorder: &mut VoiceRecorder) -> CaptureJob {
    recorder
        .start()
        .expect("device should open")
        .expect("no session should be running")
}

/// Let the capture task drain whatever the test just queued.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn sustained_silence_stops_the_session_exactly_once() {
    let device = Arc::new(ScriptedDevice::default());
    let mut recorder = scripted_recorder(device.clone());
    let job = must_start(&mut recorder);

    let tx = device.sender();
    tx.send(vec![0.5; 160]).await.unwrap();
    for _ in 0..4 {
        tx.send(vec![0.01; 160]).await.unwrap();
    }

    let audio = job.finished().await.expect("session should finalize");
    assert_eq!(audio.cause, StopCause::Silence { quiet_ms: 1_500 });
    assert_eq!(audio.metrics.frames_seen, 5);
    assert!((audio.metrics.peak_level - 0.5).abs() < 1e-6);
    assert!(!recorder.is_recording());
    assert_eq!(device.releases(), 1, "hardware released exactly once");
}

#[tokio::test(start_paused = true)]
async fn speech_before_the_deadline_resets_the_silence_clock() {
    let device = Arc::new(ScriptedDevice::default());
    let mut recorder = scripted_recorder(device.clone());
    let job = must_start(&mut recorder);
    let tx = device.sender();

    // Quiet frame arms the deadline at t0 + 1500 ms.
    tx.send(vec![0.01; 160]).await.unwrap();
    settle().await;
    tokio::time::advance(Duration::from_millis(1_000)).await;

    // Speech at t0 + 1000 ms disarms it.
    tx.send(vec![0.5; 160]).await.unwrap();
    settle().await;

    // Past the original deadline: still recording.
    tokio::time::advance(Duration::from_millis(1_000)).await;
    settle().await;
    assert!(
        recorder.is_recording(),
        "auto-stop must not fire at the stale deadline"
    );

    // Silence again re-arms from zero and finally stops the session.
    tx.send(vec![0.01; 160]).await.unwrap();
    let audio = job.finished().await.expect("session should finalize");
    assert!(matches!(audio.cause, StopCause::Silence { .. }));
    assert_eq!(device.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_stop_finalizes_and_releases_hardware() {
    let device = Arc::new(ScriptedDevice::default());
    let mut recorder = scripted_recorder(device.clone());
    let job = must_start(&mut recorder);

    let tx = device.sender();
    tx.send(vec![0.5; 160]).await.unwrap();
    settle().await;

    recorder.request_stop();
    let audio = job.finished().await.expect("session should finalize");
    assert_eq!(audio.cause, StopCause::Manual);
    assert_eq!(device.releases(), 1);
    assert!(!recorder.is_recording());
}

#[tokio::test(start_paused = true)]
async fn starting_while_recording_does_not_open_a_second_device() {
    let device = Arc::new(ScriptedDevice::default());
    let mut recorder = scripted_recorder(device.clone());
    let job = must_start(&mut recorder);
    settle().await;
    assert_eq!(device.opens(), 1);

    let second = recorder.start().expect("start while busy is not an error");
    assert!(second.is_none(), "second session must not be created");
    assert_eq!(device.opens(), 1, "no second hardware acquisition");

    recorder.request_stop();
    let _ = job.finished().await;
}

#[tokio::test(start_paused = true)]
async fn device_error_on_start_leaves_the_recorder_idle() {
    let device = Arc::new(ScriptedDevice::failing(CaptureError::PermissionDenied(
        "user declined".into(),
    )));
    let mut recorder = scripted_recorder(device.clone());

    let err = recorder.start().expect_err("open should fail");
    assert!(matches!(err, CaptureError::PermissionDenied(_)));
    assert!(!recorder.is_recording());
    assert_eq!(device.opens(), 0);
    assert_eq!(device.releases(), 0, "no partial session to release");

    // The next attempt opens normally.
    let job = must_start(&mut recorder);
    assert_eq!(device.opens(), 1);
    recorder.request_stop();
    let _ = job.finished().await;
}

#[tokio::test(start_paused = true)]
async fn stream_closing_mid_session_reports_an_error_and_releases() {
    let device = Arc::new(ScriptedDevice::default());
    let mut recorder = scripted_recorder(device.clone());
    let job = must_start(&mut recorder);

    let tx = device.sender();
    tx.send(vec![0.5; 160]).await.unwrap();
    settle().await;
    drop(tx);
    device.drop_sender();

    let err = job.finished().await.expect_err("closed stream is an error");
    assert!(matches!(err, CaptureError::Stream(_)));
    assert_eq!(device.releases(), 1);
    assert!(!recorder.is_recording());
}

#[test]
fn pcm16_chunks_clamp_and_scale() {
    let chunk = pcm16_chunk(&[0.0, 1.0, -1.0, 2.0]);
    let samples: Vec<i16> = chunk
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    assert_eq!(samples, vec![0, i16::MAX, -i16::MAX, i16::MAX]);
}

#[test]
fn wav_payload_wraps_the_concatenated_chunks() {
    let chunks = vec![pcm16_chunk(&[0.1; 100]), pcm16_chunk(&[0.2; 60])];
    let data_len: usize = chunks.iter().map(Bytes::len).sum();
    let payload = wav_payload(&chunks, 16_000).expect("encoding should succeed");
    assert_eq!(&payload[..4], b"RIFF");
    assert_eq!(&payload[8..12], b"WAVE");
    assert_eq!(payload.len(), 44 + data_len);
}

#[test]
fn wav_payload_of_empty_session_is_a_bare_header() {
    let payload = wav_payload(&[], 16_000).expect("encoding should succeed");
    assert_eq!(payload.len(), 44);
}
