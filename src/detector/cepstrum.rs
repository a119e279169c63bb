//! Real cepstrum pitch estimation.
//!
//! The cepstrum is the inverse FFT of the log power spectrum. A periodic
//! signal shows up as a peak at the quefrency equal to its period, with
//! smaller rahmonics at its multiples. The low-quefrency region, which holds
//! the spectral envelope, is suppressed by a lifter that ramps up to the
//! shortest period of the band. Across the band the lifter gain grows with
//! quefrency: each harmonic is a lobe of finite width in the log spectrum,
//! which makes the cepstrum decay with quefrency and pulls an unweighted
//! peak towards shorter periods.

use std::f64::consts::PI;

use rustfft::FftPlanner;

use crate::config::FrequencyBand;
use crate::detector::internals::{forward_fft, SILENCE_ENERGY};
use crate::detector::{PitchEstimate, PitchEstimator};
use crate::utils::buffer::square_sum;
use crate::utils::filters::hann_windowed;
use crate::utils::peak::{global_max, parabolic_vertex};
use crate::utils::stats::{mean, std_dev};

/// Keeps the logarithm finite for empty bins.
const LOG_FLOOR: f64 = 1e-12;
/// Peak prominence, in standard deviations, that maps to full confidence.
const FULL_CONFIDENCE_PROMINENCE: f64 = 5.0;
/// Liftered height, relative to the current peak, above which a peak at a
/// whole fraction of its quefrency is taken as the period instead.
const RAHMONIC_RATIO: f64 = 0.3;

pub struct CepstrumEstimator {
    band: FrequencyBand,
}

impl CepstrumEstimator {
    pub fn new(band: FrequencyBand) -> Self {
        CepstrumEstimator { band }
    }
}

/// Lifter gain at quefrency `q`: zero below `q_min / 2`, a raised-cosine ramp
/// up to `q_min`, and `q / q_min` from there on.
fn lifter(q: usize, q_min: usize) -> f64 {
    let start = q_min / 2;
    if q < start {
        0.0
    } else if q >= q_min || q_min == start {
        q as f64 / q_min.max(1) as f64
    } else {
        let t = (q - start) as f64 / (q_min - start) as f64;
        0.5 * (1.0 - (PI * t).cos())
    }
}

/// Walk from a rahmonic at `k * T` back to the peak at `T`, for `k` of 2 or 3.
fn fundamental_quefrency(cepstrum: &[f64], mut q: usize, q_min: usize) -> usize {
    'search: loop {
        for divisor in [3, 2] {
            let centre = (q as f64 / divisor as f64).round() as usize;
            if centre < q_min + 2 {
                continue;
            }
            let (offset, value) = match global_max(&cepstrum[centre - 2..=centre + 2]) {
                Some(max) => max,
                None => continue,
            };
            let candidate = centre - 2 + offset;
            let is_peak = cepstrum[candidate - 1] < value && cepstrum[candidate + 1] < value;
            if is_peak && value > 0.0 && value >= RAHMONIC_RATIO * cepstrum[q] {
                q = candidate;
                continue 'search;
            }
        }
        return q;
    }
}

/// Real cepstrum of the Hann-windowed `signal`, for quefrencies `0..fft_size/2`.
pub fn real_cepstrum(signal: &[f64], fft_size: usize) -> Vec<f64> {
    let mut spectrum = forward_fft(&hann_windowed(signal), fft_size);
    spectrum
        .iter_mut()
        .for_each(|c| *c = (c.norm_sqr() + LOG_FLOOR).ln().into());

    let mut planner = FftPlanner::new();
    planner.plan_fft_inverse(fft_size).process(&mut spectrum);

    let scale = 1.0 / fft_size as f64;
    spectrum[..fft_size / 2].iter().map(|c| c.re * scale).collect()
}

impl PitchEstimator for CepstrumEstimator {
    fn estimate(&self, signal: &[f64], sample_rate: usize) -> PitchEstimate {
        let (q_min, q_max) = (self.band.min_lag(sample_rate), self.band.max_lag(sample_rate));
        if signal.len() < 2 * q_max || square_sum(signal) < SILENCE_ENERGY {
            return PitchEstimate::none();
        }

        let fft_size = (2 * signal.len()).next_power_of_two();
        let cepstrum: Vec<f64> = real_cepstrum(signal, fft_size)
            .iter()
            .enumerate()
            .map(|(q, c)| c * lifter(q, q_min))
            .collect();

        let range = &cepstrum[q_min..=q_max];
        let q = match global_max(range) {
            Some((offset, _)) => fundamental_quefrency(&cepstrum, q_min + offset, q_min),
            None => return PitchEstimate::none(),
        };
        let peak = cepstrum[q];

        let mut period = q as f64;
        if cepstrum[q - 1] < peak && cepstrum[q + 1] < peak {
            period += parabolic_vertex(cepstrum[q - 1], peak, cepstrum[q + 1]).0;
        }

        let confidence = match (mean(range), std_dev(range)) {
            (Some(m), Some(s)) if s > 0.0 => ((peak - m) / s) / FULL_CONFIDENCE_PROMINENCE,
            _ => 0.0,
        };
        log::trace!("cepstrum: quefrency {:.2}, peak {:.4}", period, peak);

        PitchEstimate::new(sample_rate as f64 / period, confidence)
    }
}
