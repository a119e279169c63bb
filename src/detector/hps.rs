use crate::config::FrequencyBand;
use crate::detector::internals::magnitude_spectrum;
use crate::detector::{PitchEstimate, PitchEstimator};
use crate::utils::peak::{global_max, parabolic_vertex};

const HARMONICS: usize = 5;
/// Peak-to-mean ratio of the product spectrum that maps to full confidence.
const FULL_CONFIDENCE_RATIO: f64 = 10.0;

/// Harmonic product spectrum: the magnitude spectrum multiplied by its own
/// down-sampled copies, so that only the fundamental bin collects energy
/// from every harmonic. Part of the classic bank.
pub struct HarmonicProductEstimator {
    band: FrequencyBand,
}

impl HarmonicProductEstimator {
    pub fn new(band: FrequencyBand) -> Self {
        HarmonicProductEstimator { band }
    }
}

impl PitchEstimator for HarmonicProductEstimator {
    fn estimate(&self, signal: &[f64], sample_rate: usize) -> PitchEstimate {
        if signal.len() < self.band.max_lag(sample_rate) {
            return PitchEstimate::none();
        }

        let fft_size = (4 * signal.len()).next_power_of_two();
        let spectrum = magnitude_spectrum(signal, fft_size);
        let bin_hz = sample_rate as f64 / fft_size as f64;

        let lo = (self.band.min_hz / bin_hz).ceil().max(1.0) as usize;
        let hi = ((self.band.max_hz / bin_hz).floor() as usize).min((spectrum.len() - 1) / HARMONICS);
        if hi <= lo + 1 {
            return PitchEstimate::none();
        }

        let product: Vec<f64> = (lo..=hi)
            .map(|k| (1..=HARMONICS).map(|h| spectrum[k * h]).product())
            .collect();

        let (best, peak) = match global_max(&product) {
            Some(max) if max.1 > 0.0 => max,
            _ => return PitchEstimate::none(),
        };

        let mut bin = (lo + best) as f64;
        if best > 0 && best + 1 < product.len() {
            let (left, right) = (product[best - 1], product[best + 1]);
            if left > 0.0 && right > 0.0 && left < peak && right < peak {
                // The product of Hann lobes is close to Gaussian, so the log is close to a parabola.
                bin += parabolic_vertex(left.ln(), peak.ln(), right.ln()).0;
            }
        }

        let mean = product.iter().sum::<f64>() / product.len() as f64;
        PitchEstimate::new(bin * bin_hz, (peak / mean) / FULL_CONFIDENCE_RATIO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn harmonic_tone_peaks_at_the_fundamental() {
        let sr = 44100;
        let f0 = 110.0;
        let signal: Vec<f64> = (0..8192)
            .map(|i| {
                let t = i as f64 / sr as f64;
                (1..=5).map(|h| (2.0 * PI * f0 * h as f64 * t).sin()).sum()
            })
            .collect();
        let estimate = HarmonicProductEstimator::new(FrequencyBand::default()).estimate(&signal, sr);
        assert!((estimate.frequency_hz - f0).abs() < 1.0);
        assert_eq!(estimate.confidence, 1.0);
    }
}
