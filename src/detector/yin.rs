//! The YIN pitch detection algorithm is based on the algorithm from the paper
//! *[YIN, a fundamental frequency estimator for speech and music](http://recherche.ircam.fr/equipes/pcm/cheveign/ps/2002_JASA_YIN_proof.pdf)*.
//!
//! Let $S=(s_0,s_1,\ldots,s_N)$ be a discrete signal. The *mean square difference function* at time $t$
//! is defined by
//! $$ d(t) = \sum_{i=0}^{W-1} (s_i-s_{i+t})^2. $$
//! YIN normalises it into the *cumulative mean normalized difference function*,
//! $$ d\'(t) = \begin{cases}1&\text{if }t=0\\\\ d(t) / \left[ \tfrac{1}{t}\sum_{i=1}^t d(i) \right] & \text{otherwise}\end{cases}, $$
//! and searches for the first local minimum of $d\'(t)$ below a threshold.
//!
//! ## Adaptive threshold
//! Instead of a fixed threshold, this implementation derives one from the
//! global minimum of $d\'$ inside the frequency band, clamped to `[0.1, 0.3]`.
//! Clean tones keep the strict classic threshold while noisy ones still find
//! their first dip. When no lag qualifies, the global minimum is used.
//!
//! The difference function is computed with an FFT, and the chosen lag is
//! refined by quadratic interpolation.

use crate::config::FrequencyBand;
use crate::detector::internals::{windowed_square_error, yin_normalize_square_error, SILENCE_ENERGY};
use crate::detector::{PitchEstimate, PitchEstimator};
use crate::utils::buffer::{new_real_buffer, square_sum};
use crate::utils::peak::{global_min, parabolic_vertex};

const MIN_THRESHOLD: f64 = 0.1;
const MAX_THRESHOLD: f64 = 0.3;
/// Margin added to the global minimum before clamping.
const THRESHOLD_MARGIN: f64 = 0.1;

pub struct YinEstimator {
    band: FrequencyBand,
}

impl YinEstimator {
    pub fn new(band: FrequencyBand) -> Self {
        YinEstimator { band }
    }
}

/// Walk forward from `tau` while the function keeps decreasing.
fn descend(values: &[f64], mut tau: usize, limit: usize) -> usize {
    while tau + 1 <= limit && values[tau + 1] < values[tau] {
        tau += 1;
    }
    tau
}

impl PitchEstimator for YinEstimator {
    fn estimate(&self, signal: &[f64], sample_rate: usize) -> PitchEstimate {
        let window_size = signal.len() / 2;
        let min_lag = self.band.min_lag(sample_rate);
        let max_lag = self.band.max_lag(sample_rate);
        // One extra lag past the band so the last in-band lag has a right neighbour.
        if max_lag + 2 > window_size || min_lag < 1 {
            return PitchEstimate::none();
        }
        if square_sum(signal) < SILENCE_ENERGY {
            return PitchEstimate::none();
        }

        let mut result = new_real_buffer(max_lag + 2);

        // STEP 2: Calculate the difference function, d_t.
        windowed_square_error(signal, window_size, &mut result);

        // STEP 3: Calculate the cumulative mean normalized difference function, d_t'.
        yin_normalize_square_error(&mut result);

        // STEP 4: Adaptive absolute threshold.
        let (global_lag, lowest) = match global_min(&result[min_lag..=max_lag]) {
            Some((offset, value)) => (min_lag + offset, value),
            None => return PitchEstimate::none(),
        };
        let threshold = (lowest + THRESHOLD_MARGIN).clamp(MIN_THRESHOLD, MAX_THRESHOLD);

        let tau = (min_lag..=max_lag)
            .find(|&tau| result[tau] < threshold)
            .map(|tau| descend(&result, tau, max_lag))
            .unwrap_or(global_lag);

        // STEP 5: Quadratic interpolation around a proper local minimum.
        let (left, center, right) = (result[tau - 1], result[tau], result[tau + 1]);
        let (period, value) = if center < left && center < right {
            let (shift, value) = parabolic_vertex(left, center, right);
            (tau as f64 + shift, value)
        } else {
            (tau as f64, center)
        };

        log::trace!(
            "yin: threshold {:.3}, lag {:.2}, d' {:.4}",
            threshold,
            period,
            value
        );

        PitchEstimate::new(sample_rate as f64 / period, 1.0 - value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descend_stops_at_the_local_minimum() {
        let values = [1.0, 0.5, 0.3, 0.2, 0.4, 0.1];
        assert_eq!(descend(&values, 1, 5), 3);
        assert_eq!(descend(&values, 4, 5), 5);
    }

    #[test]
    fn short_buffers_are_inconclusive() {
        let estimator = YinEstimator::new(FrequencyBand::default());
        assert_eq!(estimator.estimate(&[0.5; 512], 44100), PitchEstimate::none());
    }
}
