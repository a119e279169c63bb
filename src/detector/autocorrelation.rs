use crate::config::FrequencyBand;
use crate::detector::internals::{autocorrelation, lag_buffer, pitch_from_peaks, SILENCE_ENERGY};
use crate::detector::{PitchEstimate, PitchEstimator};
use crate::utils::filters::hann_windowed;
use crate::utils::peak::PeakCorrection;

/// Candidates must reach this fraction of the strongest in-band peak.
const PEAK_RATIO: f64 = 0.9;

/// Plain autocorrelation of the Hann-windowed buffer, normalised by its
/// zero-lag value. Part of the classic bank.
pub struct AutocorrelationEstimator {
    band: FrequencyBand,
}

impl AutocorrelationEstimator {
    pub fn new(band: FrequencyBand) -> Self {
        AutocorrelationEstimator { band }
    }
}

impl PitchEstimator for AutocorrelationEstimator {
    fn estimate(&self, signal: &[f64], sample_rate: usize) -> PitchEstimate {
        if signal.len() < 2 * self.band.max_lag(sample_rate) {
            return PitchEstimate::none();
        }

        let windowed = hann_windowed(signal);
        let mut autocorr = lag_buffer(self.band, sample_rate, signal.len() / 2);
        autocorrelation(&windowed, &mut autocorr);

        let energy = autocorr[0];
        if energy < SILENCE_ENERGY {
            return PitchEstimate::none();
        }
        autocorr.iter_mut().for_each(|r| *r /= energy);

        pitch_from_peaks(
            &autocorr,
            sample_rate,
            self.band,
            PEAK_RATIO,
            PeakCorrection::Quadratic,
        )
    }
}
