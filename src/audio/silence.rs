//! Frame-wise silence analysis
//!
//! Classifies a recording as effectively silent before it is sent to the
//! transcription endpoint. Recordings dominated by near-silent frames make
//! remote transcribers hallucinate; rejecting them locally saves a network
//! round trip and gives the user actionable feedback instead.

use crate::config::SilenceConfig;

/// Result of analyzing one recording
#[derive(Debug, Clone)]
pub struct SilenceReport {
    /// Share of frames whose RMS fell below the threshold (0.0 - 1.0)
    pub silent_frame_ratio: f32,
    /// Mean RMS across all frames
    pub avg_rms: f32,
    /// Whether the recording counts as silence under the configured cutoff
    pub is_silence: bool,
}

/// Frame-wise RMS analyzer with configurable thresholds
pub struct SilenceAnalyzer {
    rms_threshold: f32,
    frame_ms: u32,
    silent_frame_ratio: f32,
}

impl SilenceAnalyzer {
    pub fn new(config: &SilenceConfig) -> Self {
        Self {
            rms_threshold: config.rms_threshold,
            frame_ms: config.frame_ms.max(1),
            silent_frame_ratio: config.silent_frame_ratio,
        }
    }

    /// Analyze samples (mono, at `sample_rate`) frame by frame
    pub fn analyze(&self, samples: &[f32], sample_rate: u32) -> SilenceReport {
        if samples.is_empty() {
            return SilenceReport {
                silent_frame_ratio: 1.0,
                avg_rms: 0.0,
                is_silence: true,
            };
        }

        let frame_size = (sample_rate as usize * self.frame_ms as usize / 1000).max(1);

        let mut silent_frames = 0usize;
        let mut total_frames = 0usize;
        let mut total_rms = 0.0f32;

        for frame in samples.chunks(frame_size) {
            let rms = calculate_rms(frame);
            total_rms += rms;
            total_frames += 1;

            if rms < self.rms_threshold {
                silent_frames += 1;
            }
        }

        let silent_ratio = silent_frames as f32 / total_frames as f32;
        let avg_rms = total_rms / total_frames as f32;
        let is_silence = silent_ratio >= self.silent_frame_ratio;

        tracing::debug!(
            "Silence analysis: {} frames, {:.0}% silent (cutoff {:.0}%), avg_rms={:.4}",
            total_frames,
            silent_ratio * 100.0,
            self.silent_frame_ratio * 100.0,
            avg_rms
        );

        SilenceReport {
            silent_frame_ratio: silent_ratio,
            avg_rms,
            is_silence,
        }
    }
}

/// RMS amplitude of one frame
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SilenceConfig;

    fn analyzer() -> SilenceAnalyzer {
        SilenceAnalyzer::new(&SilenceConfig::default())
    }

    fn sine(len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 16000.0).sin() * amplitude)
            .collect()
    }

    #[test]
    fn pure_silence_is_rejected() {
        let report = analyzer().analyze(&vec![0.0; 16000], 16000);
        assert!(report.is_silence);
        assert_eq!(report.silent_frame_ratio, 1.0);
        assert_eq!(report.avg_rms, 0.0);
    }

    #[test]
    fn loud_audio_passes() {
        let report = analyzer().analyze(&sine(16000, 0.5), 16000);
        assert!(!report.is_silence);
        assert!(report.silent_frame_ratio < 0.2);
        assert!(report.avg_rms > 0.1);
    }

    #[test]
    fn very_quiet_audio_is_silence() {
        // amplitude well below the 0.01 RMS threshold
        let report = analyzer().analyze(&sine(16000, 0.001), 16000);
        assert!(report.is_silence);
    }

    #[test]
    fn mostly_silent_recording_hits_cutoff() {
        // 200 ms of speech followed by 1.8 s of silence: 90% silent frames
        let mut samples = sine(3200, 0.5);
        samples.extend(vec![0.0; 28800]);

        let report = analyzer().analyze(&samples, 16000);
        assert!(report.silent_frame_ratio > 0.8);
        assert!(report.is_silence);
    }

    #[test]
    fn brief_pause_does_not_reject_speech() {
        // 1.6 s of speech with a 400 ms pause: 20% silent frames
        let mut samples = sine(12800, 0.5);
        samples.extend(vec![0.0; 6400]);
        samples.extend(sine(12800, 0.5));

        let report = analyzer().analyze(&samples, 16000);
        assert!(!report.is_silence);
    }

    #[test]
    fn empty_input_is_silence() {
        let report = analyzer().analyze(&[], 16000);
        assert!(report.is_silence);
    }

    #[test]
    fn custom_cutoff_respected() {
        let config = SilenceConfig {
            rms_threshold: 0.01,
            frame_ms: 100,
            silent_frame_ratio: 0.5,
        };
        let analyzer = SilenceAnalyzer::new(&config);

        // 60% silent frames: rejected under a 0.5 cutoff
        let mut samples = sine(6400, 0.5);
        samples.extend(vec![0.0; 9600]);

        let report = analyzer.analyze(&samples, 16000);
        assert!(report.is_silence);
    }

    #[test]
    fn rms_calculation() {
        assert!((calculate_rms(&vec![1.0; 100]) - 1.0).abs() < 0.001);
        assert_eq!(calculate_rms(&vec![0.0; 100]), 0.0);
        assert_eq!(calculate_rms(&[]), 0.0);

        // sine with amplitude 1.0 has RMS ~0.707
        let sine: Vec<f32> = (0..1000)
            .map(|i| (i as f32 * 2.0 * std::f32::consts::PI / 100.0).sin())
            .collect();
        assert!((calculate_rms(&sine) - 0.707).abs() < 0.01);
    }
}
