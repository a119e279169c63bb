//! Instantaneous-frequency estimation from STFT phase advance.
//!
//! For each spectral peak, the phase advance between two frames a hop apart
//! gives a frequency far finer than the bin spacing. A frame votes for a
//! fundamental only when at least three of its peaks sit on that
//! candidate's harmonic series. A bare sine tone therefore yields no
//! estimate, and this estimator simply drops out of the consensus.

use std::f64::consts::PI;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::config::FrequencyBand;
use crate::detector::internals::SILENCE_ENERGY;
use crate::detector::{PitchEstimate, PitchEstimator};
use crate::utils::buffer::{copy_real_to_complex, new_complex_buffer, square_sum, ComplexComponent};
use crate::utils::filters::hann;
use crate::utils::stats::median;

const FRAME_SIZE: usize = 2048;
const HOP: usize = 128;
/// Peaks weaker than this fraction of the frame maximum are ignored.
const PEAK_FLOOR: f64 = 0.1;
/// Peaks are collected up to this multiple of the band's upper edge.
const PEAK_CEILING_RATIO: f64 = 5.0;
/// Relative tolerance for a peak to count as the `n`-th harmonic.
const HARMONIC_TOLERANCE: f64 = 0.05;
const MIN_CORROBORATING_PEAKS: usize = 3;
const MAX_SUBHARMONIC: usize = 3;

pub struct PhaseEstimator {
    band: FrequencyBand,
}

impl PhaseEstimator {
    pub fn new(band: FrequencyBand) -> Self {
        PhaseEstimator { band }
    }
}

fn wrap_phase(phase: f64) -> f64 {
    phase - 2.0 * PI * (phase / (2.0 * PI)).round()
}

fn frame_spectrum(
    signal: &[f64],
    start: usize,
    fft: &dyn rustfft::Fft<f64>,
) -> Vec<Complex<f64>> {
    let mut buffer = new_complex_buffer(FRAME_SIZE);
    copy_real_to_complex(&signal[start..start + FRAME_SIZE], &mut buffer, ComplexComponent::Re);
    buffer
        .iter_mut()
        .enumerate()
        .for_each(|(i, c)| *c *= hann(FRAME_SIZE, i));
    fft.process(&mut buffer);
    buffer
}

/// Instantaneous frequencies of the spectral peaks of one frame.
fn peak_frequencies(
    previous: &[Complex<f64>],
    current: &[Complex<f64>],
    sample_rate: usize,
    max_bin: usize,
) -> Vec<f64> {
    let magnitudes: Vec<f64> = current[..=max_bin].iter().map(|c| c.norm()).collect();
    let frame_max = magnitudes.iter().cloned().fold(0.0, f64::max);
    if !(frame_max > 0.0) {
        return Vec::new();
    }

    let hop_seconds = HOP as f64 / sample_rate as f64;
    (1..max_bin)
        .filter(|&k| {
            magnitudes[k] >= PEAK_FLOOR * frame_max
                && magnitudes[k] > magnitudes[k - 1]
                && magnitudes[k] >= magnitudes[k + 1]
        })
        .map(|k| {
            let expected = 2.0 * PI * k as f64 * HOP as f64 / FRAME_SIZE as f64;
            let advance = current[k].arg() - previous[k].arg();
            let deviation = wrap_phase(advance - expected);
            (expected + deviation) / (2.0 * PI * hop_seconds)
        })
        .collect()
}

/// Harmonic numbers of the peaks that lie on the series of `candidate`.
fn corroborating(peaks: &[f64], candidate: f64) -> Vec<(f64, f64)> {
    peaks
        .iter()
        .filter_map(|&p| {
            let n = (p / candidate).round();
            if n >= 1.0 && (p - n * candidate).abs() <= HARMONIC_TOLERANCE * n * candidate {
                Some((p, n))
            } else {
                None
            }
        })
        .collect()
}

/// The best-corroborated fundamental of one frame, refined by least squares
/// over its harmonics.
fn frame_fundamental(peaks: &[f64], band: FrequencyBand) -> Option<f64> {
    let mut best: Option<(usize, f64)> = None;
    for &p in peaks {
        for k in 1..=MAX_SUBHARMONIC {
            let candidate = p / k as f64;
            if !band.contains(candidate) {
                continue;
            }
            let count = corroborating(peaks, candidate).len();
            if count < MIN_CORROBORATING_PEAKS {
                continue;
            }
            let better = match best {
                None => true,
                Some((c, f)) => count > c || (count == c && candidate > f),
            };
            if better {
                best = Some((count, candidate));
            }
        }
    }

    best.map(|(_, candidate)| {
        let members = corroborating(peaks, candidate);
        let numerator: f64 = members.iter().map(|(p, n)| p * n).sum();
        let denominator: f64 = members.iter().map(|(_, n)| n * n).sum();
        numerator / denominator
    })
}

impl PitchEstimator for PhaseEstimator {
    fn estimate(&self, signal: &[f64], sample_rate: usize) -> PitchEstimate {
        if signal.len() < FRAME_SIZE + HOP || square_sum(signal) < SILENCE_ENERGY {
            return PitchEstimate::none();
        }

        let bin_hz = sample_rate as f64 / FRAME_SIZE as f64;
        let max_bin = ((PEAK_CEILING_RATIO * self.band.max_hz / bin_hz) as usize)
            .min(FRAME_SIZE / 2 - 1)
            .max(2);

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FRAME_SIZE);

        let starts: Vec<usize> = (0..=signal.len() - FRAME_SIZE).step_by(HOP).collect();
        let spectra: Vec<Vec<Complex<f64>>> = starts
            .iter()
            .map(|&start| frame_spectrum(signal, start, fft.as_ref()))
            .collect();

        let total = spectra.len() - 1;
        let fundamentals: Vec<f64> = spectra
            .windows(2)
            .filter_map(|pair| {
                let peaks = peak_frequencies(&pair[0], &pair[1], sample_rate, max_bin);
                frame_fundamental(&peaks, self.band)
            })
            .collect();

        log::trace!("phase: {} of {} frames voted", fundamentals.len(), total);

        match median(&fundamentals) {
            Some(frequency) => PitchEstimate::new(frequency, fundamentals.len() as f64 / total as f64),
            None => PitchEstimate::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_wraps_into_principal_range() {
        assert!((wrap_phase(3.0 * PI) - PI).abs() < 1e-9 || (wrap_phase(3.0 * PI) + PI).abs() < 1e-9);
        assert!((wrap_phase(0.5) - 0.5).abs() < 1e-12);
        assert!((wrap_phase(-2.0 * PI + 0.25) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn harmonic_series_is_recognised() {
        let band = FrequencyBand::default();
        let peaks = [110.2, 220.1, 330.5, 440.0];
        let f0 = frame_fundamental(&peaks, band).unwrap();
        assert!((f0 - 110.0).abs() < 0.5);
    }

    #[test]
    fn lone_partial_is_not_a_fundamental() {
        assert_eq!(frame_fundamental(&[196.0], FrequencyBand::default()), None);
    }

    #[test]
    fn harmonic_tone_is_tracked() {
        let sr = 44100;
        let f0 = 146.83;
        let signal: Vec<f64> = (0..8192)
            .map(|i| {
                let t = i as f64 / sr as f64;
                (1..=4)
                    .map(|h| (2.0 * PI * f0 * h as f64 * t).sin() / h as f64)
                    .sum()
            })
            .collect();
        let estimate = PhaseEstimator::new(FrequencyBand::default()).estimate(&signal, sr);
        assert!((estimate.frequency_hz - f0).abs() < 1.0);
        assert!(estimate.confidence > 0.5);
    }
}
