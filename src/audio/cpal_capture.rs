//! cpal-based audio capture
//!
//! Uses the cpal crate for cross-platform audio input.
//! Works with PipeWire, PulseAudio, and ALSA backends.
//!
//! Note: cpal::Stream is not Send, so the capture runs in a dedicated
//! thread and communicates via channels.

use super::{AudioCapture, AudioPayload};
use crate::config::AudioConfig;
use crate::error::CaptureError;
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::oneshot;

/// Commands sent to the audio capture thread
enum CaptureCommand {
    Stop(oneshot::Sender<Vec<f32>>),
}

/// cpal-based audio capture implementation
pub struct CpalCapture {
    config: AudioConfig,
    /// Command sender to the capture thread
    cmd_tx: Option<std::sync::mpsc::Sender<CaptureCommand>>,
    /// Handle to the capture thread
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl CpalCapture {
    pub fn new(config: &AudioConfig) -> Result<Self, CaptureError> {
        Ok(Self {
            config: config.clone(),
            cmd_tx: None,
            thread_handle: None,
        })
    }

    fn resolve_device(&self) -> Result<cpal::Device, CaptureError> {
        use cpal::traits::HostTrait;

        let host = cpal::default_host();
        if self.config.device == "default" {
            host.default_input_device()
                .ok_or_else(|| CaptureError::DeviceNotFound("default".to_string()))
        } else {
            find_audio_device(&host, &self.config.device)
        }
    }
}

/// Find an audio input device by name.
///
/// Matching strategy, in order: exact match, case-insensitive match,
/// case-insensitive substring match. This lets users give either full cpal
/// device names or PipeWire/PulseAudio short names.
fn find_audio_device(host: &cpal::Host, device_name: &str) -> Result<cpal::Device, CaptureError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| CaptureError::Connection(e.to_string()))?
        .collect();

    let search_lower = device_name.to_lowercase();

    let matched = devices
        .iter()
        .position(|d| d.name().map(|n| n == device_name).unwrap_or(false))
        .or_else(|| {
            devices
                .iter()
                .position(|d| d.name().map(|n| n.to_lowercase() == search_lower).unwrap_or(false))
        })
        .or_else(|| {
            devices.iter().position(|d| {
                d.name()
                    .map(|n| n.to_lowercase().contains(&search_lower))
                    .unwrap_or(false)
            })
        });

    match matched {
        Some(idx) => {
            let device = devices.into_iter().nth(idx);
            if let Some(device) = device {
                if let Ok(name) = device.name() {
                    tracing::debug!("Found audio device: {} (searched for: {})", name, device_name);
                }
                Ok(device)
            } else {
                Err(CaptureError::DeviceNotFound(device_name.to_string()))
            }
        }
        None => Err(CaptureError::DeviceNotFound(device_name.to_string())),
    }
}

#[async_trait::async_trait]
impl AudioCapture for CpalCapture {
    async fn request_permission(&self) -> bool {
        use cpal::traits::DeviceTrait;

        // There is no separate permission dialog on Linux audio stacks;
        // being able to open the input device and query its config is the
        // practical equivalent.
        match self.resolve_device() {
            Ok(device) => match device.default_input_config() {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!("Input device config unavailable: {}", e);
                    false
                }
            },
            Err(e) => {
                tracing::warn!("Input device unavailable: {}", e);
                false
            }
        }
    }

    async fn start(&mut self) -> Result<(), CaptureError> {
        use cpal::traits::{DeviceTrait, StreamTrait};

        let device = self.resolve_device()?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!("Using audio device: {}", device_name);

        let supported_config = device
            .default_input_config()
            .map_err(|e| CaptureError::Connection(e.to_string()))?;

        let source_rate = supported_config.sample_rate().0;
        let source_channels = supported_config.channels() as usize;
        let target_rate = self.config.sample_rate;
        let sample_format = supported_config.sample_format();

        tracing::debug!(
            "Device config: {} Hz, {} channel(s), format: {:?}",
            source_rate,
            source_channels,
            sample_format
        );

        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<CaptureCommand>();
        let samples = Arc::new(Mutex::new(Vec::<f32>::new()));
        let samples_clone = samples.clone();

        let thread_handle = thread::spawn(move || {
            let stream_config = cpal::StreamConfig {
                channels: supported_config.channels(),
                sample_rate: supported_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            let err_fn = |err| tracing::error!("Audio stream error: {}", err);

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => build_stream::<f32>(
                    &device,
                    &stream_config,
                    samples_clone.clone(),
                    source_rate,
                    target_rate,
                    source_channels,
                    err_fn,
                ),
                cpal::SampleFormat::I16 => build_stream::<i16>(
                    &device,
                    &stream_config,
                    samples_clone.clone(),
                    source_rate,
                    target_rate,
                    source_channels,
                    err_fn,
                ),
                cpal::SampleFormat::U16 => build_stream::<u16>(
                    &device,
                    &stream_config,
                    samples_clone.clone(),
                    source_rate,
                    target_rate,
                    source_channels,
                    err_fn,
                ),
                format => {
                    tracing::error!("Unsupported sample format: {:?}", format);
                    return;
                }
            };

            let stream = match stream_result {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to build audio stream: {}", e);
                    return;
                }
            };

            if let Err(e) = stream.play() {
                tracing::error!("Failed to start audio stream: {}", e);
                return;
            }

            tracing::debug!("Audio capture thread started");

            if let Ok(CaptureCommand::Stop(response_tx)) = cmd_rx.recv() {
                drop(stream);

                let collected = samples_clone
                    .lock()
                    .map(|guard| guard.clone())
                    .unwrap_or_default();
                let _ = response_tx.send(collected);
            }

            tracing::debug!("Audio capture thread stopped");
        });

        self.cmd_tx = Some(cmd_tx);
        self.thread_handle = Some(thread_handle);

        Ok(())
    }

    async fn stop(&mut self) -> Result<AudioPayload, CaptureError> {
        let samples = if let Some(cmd_tx) = self.cmd_tx.take() {
            let (response_tx, response_rx) = oneshot::channel();

            if cmd_tx.send(CaptureCommand::Stop(response_tx)).is_ok() {
                match tokio::time::timeout(std::time::Duration::from_secs(2), response_rx).await {
                    Ok(Ok(samples)) => samples,
                    Ok(Err(_)) => return Err(CaptureError::Stream("Channel closed".to_string())),
                    Err(_) => return Err(CaptureError::Timeout(2)),
                }
            } else {
                Vec::new()
            }
        } else {
            Vec::new()
        };

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        if samples.is_empty() {
            return Err(CaptureError::EmptyRecording);
        }

        let payload = AudioPayload::new(samples, self.config.sample_rate);
        tracing::debug!(
            "Audio capture stopped: {} samples ({:.2}s)",
            payload.samples.len(),
            payload.duration().as_secs_f32()
        );

        Ok(payload)
    }
}

/// Build an input stream for a specific sample type, mixing to mono and
/// resampling to the target rate inside the callback
#[allow(clippy::too_many_arguments)]
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Arc<Mutex<Vec<f32>>>,
    source_rate: u32,
    target_rate: u32,
    source_channels: usize,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mono_f32: Vec<f32> = data
                    .chunks(source_channels)
                    .map(|frame| {
                        let sum: f32 = frame
                            .iter()
                            .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                            .sum();
                        sum / source_channels as f32
                    })
                    .collect();

                let resampled = if source_rate != target_rate {
                    resample(&mono_f32, source_rate, target_rate)
                } else {
                    mono_f32
                };

                if let Ok(mut guard) = samples.lock() {
                    guard.extend_from_slice(&resampled);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| CaptureError::Stream(e.to_string()))?;

    Ok(stream)
}

/// Linear interpolation resampling
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };

        output.push(sample);
    }

    output
}
