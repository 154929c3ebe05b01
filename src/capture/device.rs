//! System microphone capture via CPAL.
//!
//! Handles device selection, format conversion, and frame chunking. The CPAL
//! stream is not `Send` on every platform, so it lives and dies on a
//! dedicated thread; the session only sees a frame channel and a guard whose
//! drop releases the hardware.

use super::{CaptureDevice, CaptureStream, RecorderConfig};
use crate::error::CaptureError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

/// Microphone input backed by the system's default audio host.
pub struct CpalCaptureDevice {
    preferred_device: Option<String>,
}

impl CpalCaptureDevice {
    /// Create a device, optionally forcing a specific input so users can pick
    /// the right microphone when the machine exposes several.
    pub fn new(preferred_device: Option<&str>) -> Self {
        Self {
            preferred_device: preferred_device.map(str::to_string),
        }
    }

    /// List microphone names so the CLI can expose a human-friendly selector.
    pub fn list_devices() -> Result<Vec<String>, CaptureError> {
        let host = cpal::default_host();
        let devices = host.input_devices()?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }
}

impl CaptureDevice for CpalCaptureDevice {
    fn open(&self, config: &RecorderConfig) -> Result<CaptureStream, CaptureError> {
        let (frame_tx, frame_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));

        let preferred = self.preferred_device.clone();
        let frame_ms = config.frame_ms.clamp(5, 120);
        let thread_stop = stop.clone();
        let handle = std::thread::spawn(move || {
            capture_thread(preferred, frame_ms, frame_tx, ready_tx, thread_stop)
        });

        match ready_rx.recv() {
            Ok(Ok(sample_rate)) => Ok(CaptureStream {
                frames: frame_rx,
                sample_rate,
                guard: Box::new(ReleaseGuard {
                    stop,
                    handle: Some(handle),
                }),
            }),
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::Stream(
                    "capture thread exited before reporting readiness".into(),
                ))
            }
        }
    }
}

/// Stops the capture thread, and with it the CPAL stream, exactly once.
struct ReleaseGuard {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn capture_thread(
    preferred: Option<String>,
    frame_ms: u64,
    frames: mpsc::Sender<Vec<f32>>,
    ready: std::sync::mpsc::Sender<Result<u32, CaptureError>>,
    stop: Arc<AtomicBool>,
) {
    let stream = match build_stream(preferred, frame_ms, frames) {
        Ok((stream, sample_rate)) => {
            let _ = ready.send(Ok(sample_rate));
            stream
        }
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(50));
    }
    drop(stream);
}

fn build_stream(
    preferred: Option<String>,
    frame_ms: u64,
    frames: mpsc::Sender<Vec<f32>>,
) -> Result<(cpal::Stream, u32), CaptureError> {
    let host = cpal::default_host();
    let device = match preferred {
        Some(name) => {
            let mut devices = host.input_devices()?;
            devices
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| {
                    CaptureError::DeviceUnavailable(format!("input device '{name}' not found"))
                })?
        }
        None => host.default_input_device().ok_or_else(|| {
            CaptureError::DeviceUnavailable(format!(
                "no default input device. {}",
                mic_permission_hint()
            ))
        })?,
    };

    let default_config = device.default_input_config()?;
    let format = default_config.sample_format();
    let device_config: StreamConfig = default_config.into();
    let sample_rate = device_config.sample_rate.0;
    let channels = usize::from(device_config.channels.max(1));
    let frame_samples = ((u64::from(sample_rate) * frame_ms) / 1000).max(1) as usize;

    let chunker = Arc::new(Mutex::new(FrameChunker::new(frame_samples, frames)));
    let err_fn = |err| tracing::warn!("capture stream error: {err}");

    // Convert every supported sample type to f32 up front so the monitor can
    // stay format-agnostic.
    let stream = match format {
        SampleFormat::F32 => {
            let chunker = chunker.clone();
            device.build_input_stream(
                &device_config,
                move |data: &[f32], _| {
                    if let Ok(mut pump) = chunker.try_lock() {
                        pump.push(data, channels, |sample| sample);
                    }
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::I16 => {
            let chunker = chunker.clone();
            device.build_input_stream(
                &device_config,
                move |data: &[i16], _| {
                    if let Ok(mut pump) = chunker.try_lock() {
                        pump.push(data, channels, |sample| sample as f32 / 32_768.0);
                    }
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::U16 => {
            let chunker = chunker.clone();
            device.build_input_stream(
                &device_config,
                move |data: &[u16], _| {
                    if let Ok(mut pump) = chunker.try_lock() {
                        pump.push(data, channels, |sample| {
                            (sample as f32 - 32_768.0) / 32_768.0
                        });
                    }
                },
                err_fn,
                None,
            )?
        }
        other => {
            return Err(CaptureError::Stream(format!(
                "unsupported sample format: {other:?}"
            )))
        }
    };

    stream.play()?;
    Ok((stream, sample_rate))
}

fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your app)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your app)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}

/// Downmixes interleaved input to mono and emits fixed-size frames on the
/// channel. Frames that would block are dropped; the monitor is best-effort
/// and the WAV payload tolerates gaps better than a stalled audio callback.
struct FrameChunker {
    frame_samples: usize,
    pending: Vec<f32>,
    sender: mpsc::Sender<Vec<f32>>,
}

impl FrameChunker {
    fn new(frame_samples: usize, sender: mpsc::Sender<Vec<f32>>) -> Self {
        Self {
            frame_samples: frame_samples.max(1),
            pending: Vec::with_capacity(frame_samples),
            sender,
        }
    }

    fn push<T, F>(&mut self, data: &[T], channels: usize, mut convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        if channels <= 1 {
            self.pending.extend(data.iter().copied().map(&mut convert));
        } else {
            // Average each interleaved frame to produce a mono sample.
            let mut acc = 0.0f32;
            let mut count = 0usize;
            for sample in data.iter().copied() {
                acc += convert(sample);
                count += 1;
                if count == channels {
                    self.pending.push(acc / channels as f32);
                    acc = 0.0;
                    count = 0;
                }
            }
            if count > 0 {
                self.pending.push(acc / count as f32);
            }
        }

        while self.pending.len() >= self.frame_samples {
            let frame: Vec<f32> = self.pending.drain(..self.frame_samples).collect();
            let _ = self.sender.try_send(frame);
        }
    }
}
