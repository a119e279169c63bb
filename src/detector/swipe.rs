//! Sub-harmonic summation in the spirit of SWIPE, scored in the lag domain.
//!
//! Candidate pitches are laid out on a logarithmic grid across the band. A
//! candidate with period `T` collects the normalized autocorrelation at the
//! lags of its sub-harmonics, `h * T` for `h = 1..=5`, with the `h`-th term
//! weighted by `1/h`. Every multiple of the true period sits on a correlation
//! peak however the energy is spread over the partials, so a weak fundamental
//! does not pull the estimate onto an overtone. A sub-octave candidate only
//! reaches the same peaks at twice the lag, where the autocorrelation has
//! decayed further.

use crate::config::FrequencyBand;
use crate::detector::internals::{autocorrelation, interpolate, SILENCE_ENERGY};
use crate::detector::{PitchEstimate, PitchEstimator};
use crate::utils::buffer::new_real_buffer;
use crate::utils::peak::{global_max, parabolic_vertex};
use crate::utils::stats::mean;

/// Grid resolution in candidates per octave (quarter-semitone steps).
const STEPS_PER_OCTAVE: f64 = 48.0;
const HARMONICS: usize = 5;
/// Score evaluations per grid step when refining the best candidate.
const REFINE_STEPS: usize = 16;

pub struct SubharmonicEstimator {
    band: FrequencyBand,
}

impl SubharmonicEstimator {
    pub fn new(band: FrequencyBand) -> Self {
        SubharmonicEstimator { band }
    }

    fn candidates(&self) -> Vec<f64> {
        let octaves = (self.band.max_hz / self.band.min_hz).log2();
        let steps = (octaves * STEPS_PER_OCTAVE).floor() as usize;
        (0..=steps)
            .map(|k| self.band.min_hz * (k as f64 / STEPS_PER_OCTAVE).exp2())
            .collect()
    }
}

/// Score of a candidate whose every term sits on a perfect correlation peak.
fn max_score() -> f64 {
    (1..=HARMONICS).map(|h| 1.0 / h as f64).sum()
}

/// `sum_h r(h * T) / h` over the normalized autocorrelation `correlation`.
fn subharmonic_score(correlation: &[f64], sample_rate: usize, candidate: f64) -> f64 {
    let period = sample_rate as f64 / candidate;
    (1..=HARMONICS)
        .map(|h| interpolate(correlation, h as f64 * period) / h as f64)
        .sum()
}

/// Re-score between the grid neighbours of `best` at a finer step, then
/// interpolate the vertex in log-frequency around the finest maximum.
fn refine(correlation: &[f64], sample_rate: usize, grid: &[f64], best: usize) -> f64 {
    let lo = grid[best.saturating_sub(1)].log2();
    let hi = grid[(best + 1).min(grid.len() - 1)].log2();
    let steps = 2 * REFINE_STEPS;
    let step = (hi - lo) / steps as f64;

    let fine: Vec<f64> = (0..=steps)
        .map(|k| subharmonic_score(correlation, sample_rate, (lo + k as f64 * step).exp2()))
        .collect();
    let (k, peak) = match global_max(&fine) {
        Some(max) => max,
        None => return grid[best],
    };

    let mut position = lo + k as f64 * step;
    if k > 0 && k < steps && fine[k - 1] < peak && fine[k + 1] < peak {
        position += parabolic_vertex(fine[k - 1], peak, fine[k + 1]).0 * step;
    }
    position.exp2()
}

impl PitchEstimator for SubharmonicEstimator {
    fn estimate(&self, signal: &[f64], sample_rate: usize) -> PitchEstimate {
        if signal.len() < 2 * self.band.max_lag(sample_rate) {
            return PitchEstimate::none();
        }

        let mut correlation = new_real_buffer(signal.len());
        autocorrelation(signal, &mut correlation);
        let energy = correlation[0];
        if !(energy > SILENCE_ENERGY) {
            return PitchEstimate::none();
        }
        correlation.iter_mut().for_each(|r| *r /= energy);

        let grid = self.candidates();
        let scores: Vec<f64> = grid
            .iter()
            .map(|&c| subharmonic_score(&correlation, sample_rate, c))
            .collect();

        let (best, peak) = match global_max(&scores) {
            Some(max) if max.1 > 0.0 => max,
            _ => return PitchEstimate::none(),
        };
        let frequency = refine(&correlation, sample_rate, &grid, best);

        // Prominence of the peak over the mean score, on the scale of a perfect score.
        let average = mean(&scores).unwrap_or(0.0);
        let confidence = (peak - average) / (max_score() - average);
        log::trace!(
            "subharmonic summation: {:.2} Hz, score {:.3}, mean {:.3}",
            frequency,
            peak,
            average
        );

        PitchEstimate::new(frequency, confidence)
    }
}
