//! The McLeod Pitch Method, after *[A Smarter Way to Find Pitch](https://www.cs.otago.ac.nz/research/publications/oucs-2008-03.pdf)*.
//!
//! The normalized square difference function (NSDF) is computed from an
//! FFT autocorrelation. Between each positive-going and the following
//! negative-going zero crossing the local maximum is a *key maximum*. The
//! first key maximum within 80% of the highest one is taken as the period,
//! which favours the fundamental over its sub-harmonics.

use crate::config::FrequencyBand;
use crate::detector::internals::{lag_buffer, normalized_square_difference, pitch_from_peaks, SILENCE_ENERGY};
use crate::detector::{PitchEstimate, PitchEstimator};
use crate::utils::buffer::square_sum;
use crate::utils::peak::PeakCorrection;

/// Fraction of the highest key maximum a candidate must reach.
const KEY_MAXIMUM_RATIO: f64 = 0.8;

pub struct McLeodEstimator {
    band: FrequencyBand,
}

impl McLeodEstimator {
    pub fn new(band: FrequencyBand) -> Self {
        McLeodEstimator { band }
    }
}

impl PitchEstimator for McLeodEstimator {
    fn estimate(&self, signal: &[f64], sample_rate: usize) -> PitchEstimate {
        if signal.len() < 2 * self.band.max_lag(sample_rate) {
            return PitchEstimate::none();
        }
        if square_sum(signal) < SILENCE_ENERGY {
            return PitchEstimate::none();
        }

        let mut nsdf = lag_buffer(self.band, sample_rate, signal.len() / 2);
        normalized_square_difference(signal, &mut nsdf);

        pitch_from_peaks(
            &nsdf,
            sample_rate,
            self.band,
            KEY_MAXIMUM_RATIO,
            PeakCorrection::Quadratic,
        )
    }
}
