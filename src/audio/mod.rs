//! Audio capture module
//!
//! Provides microphone recording via cpal, which works with PipeWire,
//! PulseAudio, and ALSA backends, and the silence pre-flight analysis
//! applied before any remote transcription call.

pub mod cpal_capture;
pub mod silence;

use crate::config::AudioConfig;
use crate::error::CaptureError;
use std::io::Cursor;
use std::time::Duration;

/// One finished recording: mono samples plus the metadata the
/// transcription endpoint needs.
#[derive(Debug, Clone)]
pub struct AudioPayload {
    /// f32 samples, mono, at `sample_rate`
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioPayload {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Elapsed duration of the recording
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration().as_millis() as u64
    }

    /// MIME-like tag of the encoded payload
    pub fn mime(&self) -> &'static str {
        "audio/wav"
    }

    /// Encode the samples as 16-bit PCM WAV for the wire
    pub fn wav_bytes(&self) -> Result<Vec<u8>, CaptureError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut buffer = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut buffer, spec)
            .map_err(|e| CaptureError::Stream(format!("Failed to create WAV writer: {}", e)))?;

        // Convert f32 [-1.0, 1.0] to i16
        for &sample in &self.samples {
            let clamped = sample.clamp(-1.0, 1.0);
            let scaled = (clamped * i16::MAX as f32) as i16;
            writer
                .write_sample(scaled)
                .map_err(|e| CaptureError::Stream(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| CaptureError::Stream(format!("Failed to finalize WAV: {}", e)))?;

        Ok(buffer.into_inner())
    }
}

/// Trait for audio capture implementations
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Check whether microphone access is available.
    /// Cheap enough to run concurrently with mode detection on every toggle.
    async fn request_permission(&self) -> bool;

    /// Begin capturing audio
    async fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop capturing and return the recorded payload
    async fn stop(&mut self) -> Result<AudioPayload, CaptureError>;
}

/// Factory function to create audio capture
pub fn create_capture(config: &AudioConfig) -> Result<Box<dyn AudioCapture>, CaptureError> {
    Ok(Box::new(cpal_capture::CpalCapture::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_duration() {
        let payload = AudioPayload::new(vec![0.0; 16000], 16000);
        assert_eq!(payload.duration_ms(), 1000);

        let payload = AudioPayload::new(vec![0.0; 8000], 16000);
        assert_eq!(payload.duration_ms(), 500);

        let payload = AudioPayload::new(vec![], 16000);
        assert_eq!(payload.duration_ms(), 0);
    }

    #[test]
    fn payload_wav_encoding() {
        // One second of a 440 Hz sine
        let samples: Vec<f32> = (0..16000)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 16000.0).sin() * 0.5)
            .collect();
        let payload = AudioPayload::new(samples, 16000);

        let wav = payload.wav_bytes().unwrap();

        // 44-byte WAV header plus 16000 samples at 2 bytes each
        assert_eq!(wav.len(), 44 + 32000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(payload.mime(), "audio/wav");
    }
}
