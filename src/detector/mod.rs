//! Single-buffer pitch estimators.
//!
//! Every estimator reads the same preprocessed buffer and reports a
//! [PitchEstimate]. Estimators never fail: input that is too short, silent or
//! inconclusive yields [PitchEstimate::none].

use serde::{Deserialize, Serialize};

use crate::config::FrequencyBand;

pub mod autocorrelation;
pub mod bank;
pub mod cepstrum;
pub mod hps;
pub mod internals;
pub mod mcleod;
pub mod phase;
pub mod swipe;
pub mod yin;

/// One estimator's answer. A `frequency_hz` of zero means "no detection" and
/// always comes with zero confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    pub frequency_hz: f64,
    /// Estimator-internal certainty in `[0, 1]`.
    pub confidence: f64,
}

impl PitchEstimate {
    /// Build an estimate, collapsing non-finite or non-positive frequencies to
    /// [PitchEstimate::none] and clamping the confidence into `[0, 1]`.
    pub fn new(frequency_hz: f64, confidence: f64) -> Self {
        if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
            return PitchEstimate::none();
        }
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        PitchEstimate {
            frequency_hz,
            confidence,
        }
    }

    pub fn none() -> Self {
        PitchEstimate {
            frequency_hz: 0.0,
            confidence: 0.0,
        }
    }

    pub fn is_detected(&self) -> bool {
        self.frequency_hz > 0.0
    }
}

pub trait PitchEstimator: Send + Sync {
    fn estimate(&self, signal: &[f64], sample_rate: usize) -> PitchEstimate;
}

/// The estimators that can make up a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    /// McLeod normalized square difference ([mcleod::McLeodEstimator]).
    Nsdf,
    /// Sub-harmonic summation ([swipe::SubharmonicEstimator]).
    SubharmonicSummation,
    /// YIN with an adaptive threshold ([yin::YinEstimator]).
    Yin,
    /// Liftered real cepstrum ([cepstrum::CepstrumEstimator]).
    Cepstrum,
    /// Instantaneous frequency from phase advance ([phase::PhaseEstimator]).
    Phase,
    /// Plain windowed autocorrelation ([autocorrelation::AutocorrelationEstimator]).
    Autocorrelation,
    /// Harmonic product spectrum ([hps::HarmonicProductEstimator]).
    HarmonicProduct,
}

impl EstimatorKind {
    pub fn build(self, band: FrequencyBand) -> Box<dyn PitchEstimator> {
        match self {
            EstimatorKind::Nsdf => Box::new(mcleod::McLeodEstimator::new(band)),
            EstimatorKind::SubharmonicSummation => Box::new(swipe::SubharmonicEstimator::new(band)),
            EstimatorKind::Yin => Box::new(yin::YinEstimator::new(band)),
            EstimatorKind::Cepstrum => Box::new(cepstrum::CepstrumEstimator::new(band)),
            EstimatorKind::Phase => Box::new(phase::PhaseEstimator::new(band)),
            EstimatorKind::Autocorrelation => {
                Box::new(autocorrelation::AutocorrelationEstimator::new(band))
            }
            EstimatorKind::HarmonicProduct => Box::new(hps::HarmonicProductEstimator::new(band)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EstimatorKind::Nsdf => "nsdf",
            EstimatorKind::SubharmonicSummation => "subharmonic_summation",
            EstimatorKind::Yin => "yin",
            EstimatorKind::Cepstrum => "cepstrum",
            EstimatorKind::Phase => "phase",
            EstimatorKind::Autocorrelation => "autocorrelation",
            EstimatorKind::HarmonicProduct => "harmonic_product",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_frequencies_collapse_to_none() {
        assert_eq!(PitchEstimate::new(0.0, 0.9), PitchEstimate::none());
        assert_eq!(PitchEstimate::new(f64::NAN, 0.9), PitchEstimate::none());
        assert_eq!(PitchEstimate::new(-5.0, 0.9), PitchEstimate::none());
        assert!(!PitchEstimate::none().is_detected());
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(PitchEstimate::new(110.0, 1.7).confidence, 1.0);
        assert_eq!(PitchEstimate::new(110.0, -0.2).confidence, 0.0);
        assert_eq!(PitchEstimate::new(110.0, f64::NAN).confidence, 0.0);
    }
}
