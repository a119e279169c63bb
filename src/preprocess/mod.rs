//! Buffer conditioning before pitch estimation.
//!
//! The steps run in a fixed order, each a pure transform:
//!
//! 1. trim leading and trailing near-silence ([silence::trim_silence]),
//! 2. resample to the working rate ([resample::resample]),
//! 3. remove the DC offset,
//! 4. optionally A-weight the spectrum ([weighting::a_weight]),
//! 5. zero samples under an adaptive noise floor,
//! 6. normalise the peak amplitude.
//!
//! None of the steps fail. Degenerate input, such as an all-zero buffer,
//! passes through unchanged.

use crate::config::PreprocessConfig;
use crate::utils::buffer::{peak_amplitude, rms};
use crate::utils::stats::{mean, percentile};

pub mod resample;
pub mod silence;
pub mod weighting;

/// A conditioned buffer at the working sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    pub samples: Vec<f64>,
    pub sample_rate: usize,
    /// RMS after DC removal and before any gain is applied.
    pub input_rms: f64,
}

pub struct Preprocessor {
    config: PreprocessConfig,
    working_sample_rate: usize,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig, working_sample_rate: usize) -> Self {
        Preprocessor {
            config,
            working_sample_rate,
        }
    }

    pub fn process(&self, samples: &[f64], sample_rate: usize) -> Preprocessed {
        let config = &self.config;

        let trimmed = silence::trim_silence(
            samples,
            config.silence_frame,
            config.silence_floor_db,
            config.min_length,
        );
        let mut buffer = resample::resample(trimmed, sample_rate, self.working_sample_rate);

        remove_dc(&mut buffer);
        let input_rms = rms(&buffer);

        if config.a_weighting {
            buffer = weighting::a_weight(&buffer, self.working_sample_rate);
        }
        noise_gate(&mut buffer, config.noise_gate_percentile, config.noise_gate_scale);
        normalize(&mut buffer, config.target_peak);

        log::debug!(
            "preprocessed {} samples at {} Hz into {} samples at {} Hz (rms {:.5})",
            samples.len(),
            sample_rate,
            buffer.len(),
            self.working_sample_rate,
            input_rms
        );

        Preprocessed {
            samples: buffer,
            sample_rate: self.working_sample_rate,
            input_rms,
        }
    }
}

/// Subtract the mean.
pub fn remove_dc(samples: &mut [f64]) {
    if let Some(offset) = mean(samples) {
        samples.iter_mut().for_each(|s| *s -= offset);
    }
}

/// Zero every sample whose magnitude is below `scale` times the
/// `percentile`-th percentile of all magnitudes.
pub fn noise_gate(samples: &mut [f64], percentile_rank: f64, scale: f64) {
    if scale <= 0.0 {
        return;
    }
    let magnitudes: Vec<f64> = samples.iter().map(|s| s.abs()).collect();
    let floor = match percentile(&magnitudes, percentile_rank) {
        Some(p) => p * scale,
        None => return,
    };
    samples
        .iter_mut()
        .filter(|s| s.abs() < floor)
        .for_each(|s| *s = 0.0);
}

/// Scale so that the largest magnitude equals `target_peak`. Silent buffers
/// are left alone.
pub fn normalize(samples: &mut [f64], target_peak: f64) {
    let peak = peak_amplitude(samples);
    if peak > f64::EPSILON {
        let gain = target_peak / peak;
        samples.iter_mut().for_each(|s| *s *= gain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn dc_is_removed() {
        let mut samples = vec![1.5, 2.5, 1.5, 2.5];
        remove_dc(&mut samples);
        assert_eq!(samples, vec![-0.5, 0.5, -0.5, 0.5]);
    }

    #[test]
    fn gate_zeroes_only_the_floor() {
        let mut samples: Vec<f64> = (1..=100).map(|i| i as f64 / 100.0).collect();
        noise_gate(&mut samples, 10.0, 0.5);
        // 10th percentile is 0.109, so the floor is 0.0545.
        assert!(samples[..5].iter().all(|&s| s == 0.0));
        assert_eq!(samples[5], 0.06);
    }

    #[test]
    fn normalization_is_guarded() {
        let mut silent = vec![0.0; 16];
        normalize(&mut silent, 0.95);
        assert!(silent.iter().all(|&s| s == 0.0));

        let mut samples = vec![0.1, -0.2, 0.05];
        normalize(&mut samples, 0.95);
        assert_abs_diff_eq!(samples[1], -0.95, epsilon = 1e-12);
    }

    #[test]
    fn pipeline_resamples_and_normalizes() {
        let samples: Vec<f64> = (0..48000)
            .map(|i| 0.1 + 0.2 * (2.0 * PI * 110.0 * i as f64 / 48000.0).sin())
            .collect();
        let preprocessor = Preprocessor::new(PreprocessConfig::default(), 44100);
        let out = preprocessor.process(&samples, 48000);
        assert_eq!(out.sample_rate, 44100);
        assert_eq!(out.samples.len(), 44100);
        assert_abs_diff_eq!(peak_amplitude(&out.samples), 0.95, epsilon = 1e-9);
        assert_abs_diff_eq!(out.input_rms, 0.2 / 2f64.sqrt(), epsilon = 1e-3);
    }

    #[test]
    fn silence_passes_through() {
        let preprocessor = Preprocessor::new(PreprocessConfig::default(), 44100);
        let out = preprocessor.process(&[0.0; 4096], 44100);
        assert_eq!(out.samples.len(), 4096);
        assert_eq!(out.input_rms, 0.0);
        assert!(out.samples.iter().all(|&s| s == 0.0));
    }
}
