//! Configuration parameters for tuning analysis

use serde::{Deserialize, Serialize};

use crate::detector::EstimatorKind;
use crate::error::TunerError;

/// Frequency range, in Hz, in which estimators look for a fundamental.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub min_hz: f64,
    pub max_hz: f64,
}

impl FrequencyBand {
    pub fn new(min_hz: f64, max_hz: f64) -> Self {
        FrequencyBand { min_hz, max_hz }
    }

    pub fn contains(&self, frequency: f64) -> bool {
        frequency >= self.min_hz && frequency <= self.max_hz
    }

    /// Shortest period in the band, in samples.
    pub fn min_lag(&self, sample_rate: usize) -> usize {
        (sample_rate as f64 / self.max_hz).floor().max(1.0) as usize
    }

    /// Longest period in the band, in samples.
    pub fn max_lag(&self, sample_rate: usize) -> usize {
        (sample_rate as f64 / self.min_hz).ceil() as usize
    }
}

impl Default for FrequencyBand {
    /// Guitar-relevant range.
    fn default() -> Self {
        FrequencyBand::new(70.0, 450.0)
    }
}

/// Buffer conditioning applied before any estimator runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Frames quieter than this, relative to the loudest frame, are trimmed
    /// from both ends (default: -40.0 dB)
    pub silence_floor_db: f64,

    /// Frame length used for silence trimming (default: 1024)
    pub silence_frame: usize,

    /// Trimming never shortens a buffer below this many samples (default: 2048)
    pub min_length: usize,

    /// Apply A-weighting to de-emphasise inaudible low and high energy (default: true)
    pub a_weighting: bool,

    /// Percentile of absolute sample values that defines the noise floor (default: 10.0)
    pub noise_gate_percentile: f64,

    /// Multiplier on the percentile value; samples below the product are zeroed.
    /// Zero disables the gate (default: 0.5)
    pub noise_gate_scale: f64,

    /// Peak amplitude after normalisation (default: 0.95)
    pub target_peak: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            silence_floor_db: -40.0,
            silence_frame: 1024,
            min_length: 2048,
            a_weighting: true,
            noise_gate_percentile: 10.0,
            noise_gate_scale: 0.5,
            target_peak: 0.95,
        }
    }
}

/// One member of the estimator bank with its static reliability weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedKind {
    pub kind: EstimatorKind,
    pub weight: f64,
}

/// Which estimators run and how much each one is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    /// Samples taken from the centre of the buffer for estimation (default: 8192)
    pub window_size: usize,

    pub estimators: Vec<WeightedKind>,
}

impl BankConfig {
    /// The five core estimators.
    pub fn full() -> Self {
        Self::with(&[
            (EstimatorKind::Nsdf, 1.2),
            (EstimatorKind::Yin, 1.1),
            (EstimatorKind::SubharmonicSummation, 1.0),
            (EstimatorKind::Cepstrum, 0.8),
            (EstimatorKind::Phase, 0.9),
        ])
    }

    /// Autocorrelation, YIN, harmonic product spectrum and cepstrum.
    pub fn classic() -> Self {
        Self::with(&[
            (EstimatorKind::Autocorrelation, 1.2),
            (EstimatorKind::Yin, 1.1),
            (EstimatorKind::HarmonicProduct, 1.0),
            (EstimatorKind::Cepstrum, 1.0),
        ])
    }

    pub fn yin_only() -> Self {
        Self::with(&[(EstimatorKind::Yin, 1.0)])
    }

    fn with(members: &[(EstimatorKind, f64)]) -> Self {
        BankConfig {
            window_size: 8192,
            estimators: members
                .iter()
                .map(|&(kind, weight)| WeightedKind { kind, weight })
                .collect(),
        }
    }
}

impl Default for BankConfig {
    fn default() -> Self {
        BankConfig::full()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinerConfig {
    /// Estimates below this confidence are ignored (default: 0.6)
    pub min_confidence: f64,

    /// Gate used for a second pass when nothing clears `min_confidence` (default: 0.3)
    pub relaxed_min_confidence: f64,

    /// Estimates further than this many MADs from the median are rejected (default: 3.0)
    pub mad_multiplier: f64,
}

impl Default for CombinerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            relaxed_min_confidence: 0.3,
            mad_multiplier: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OvertoneConfig {
    pub enabled: bool,

    /// Distance in Hz within which an estimate is taken to be an overtone (default: 5.0)
    pub match_tolerance_hz: f64,

    /// The re-estimate must land this close to the suspected fundamental (default: 10.0)
    pub accept_tolerance_hz: f64,

    /// Multiplier applied to the confidence of a corrected estimate (default: 0.9)
    pub confidence_discount: f64,

    /// Low-pass cutoff as a multiple of the suspected fundamental (default: 2.0)
    pub lowpass_ratio: f64,

    /// Butterworth order of the low-pass (default: 4)
    pub filter_order: usize,

    /// How many overtones of each note are checked, starting at the 2nd harmonic (default: 2)
    pub overtones_checked: usize,
}

impl Default for OvertoneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            match_tolerance_hz: 5.0,
            accept_tolerance_hz: 10.0,
            confidence_discount: 0.9,
            lowpass_ratio: 2.0,
            filter_order: 4,
            overtones_checked: 2,
        }
    }
}

/// Analysis configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Every buffer is resampled to this rate before analysis (default: 44100)
    pub working_sample_rate: usize,

    pub band: FrequencyBand,

    pub preprocess: PreprocessConfig,

    pub bank: BankConfig,

    pub combiner: CombinerConfig,

    pub overtone: OvertoneConfig,

    /// |cents| at or below which the direction is reported as perfect (default: 1.0)
    pub perfect_cents: f64,

    /// |cents| at or below which a string counts as in tune (default: 5.0)
    pub in_tune_cents: f64,

    /// |cents| at or below which a string counts as close (default: 25.0)
    pub close_cents: f64,

    /// RMS below which the recording is considered silent (default: 0.001)
    pub min_rms: f64,

    /// Frequencies at or below this are never matched to a note (default: 10.0)
    pub min_frequency_hz: f64,

    /// Number of segments for segmental analysis; 1 analyses the whole buffer (default: 1)
    pub segments: usize,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            working_sample_rate: 44100,
            band: FrequencyBand::default(),
            preprocess: PreprocessConfig::default(),
            bank: BankConfig::default(),
            combiner: CombinerConfig::default(),
            overtone: OvertoneConfig::default(),
            perfect_cents: 1.0,
            in_tune_cents: 5.0,
            close_cents: 25.0,
            min_rms: 0.001,
            min_frequency_hz: 10.0,
            segments: 1,
        }
    }
}

impl TunerConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, TunerError> {
        let config: TunerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TunerError> {
        let invalid = |msg: &str| Err(TunerError::InvalidConfig(msg.to_string()));

        if self.working_sample_rate == 0 {
            return invalid("working_sample_rate must be positive");
        }
        if !(self.band.min_hz > 0.0 && self.band.min_hz < self.band.max_hz) {
            return invalid("band must satisfy 0 < min_hz < max_hz");
        }
        if self.band.max_hz >= self.working_sample_rate as f64 / 2.0 {
            return invalid("band.max_hz must be below the Nyquist frequency");
        }
        if self.bank.estimators.is_empty() {
            return invalid("the estimator bank is empty");
        }
        if self.bank.estimators.iter().any(|e| !(e.weight > 0.0)) {
            return invalid("estimator weights must be positive");
        }
        if self.bank.window_size < 2 * self.band.max_lag(self.working_sample_rate) {
            return invalid("bank.window_size must cover two periods of band.min_hz");
        }
        let c = &self.combiner;
        if !(0.0..=1.0).contains(&c.relaxed_min_confidence)
            || !(0.0..=1.0).contains(&c.min_confidence)
            || c.relaxed_min_confidence > c.min_confidence
        {
            return invalid("combiner gates must satisfy 0 <= relaxed <= min <= 1");
        }
        if !(c.mad_multiplier > 0.0) {
            return invalid("combiner.mad_multiplier must be positive");
        }
        if !(0.0..=1.0).contains(&self.overtone.confidence_discount) {
            return invalid("overtone.confidence_discount must lie in [0, 1]");
        }
        if !(self.preprocess.target_peak > 0.0 && self.preprocess.target_peak <= 1.0) {
            return invalid("preprocess.target_peak must lie in (0, 1]");
        }
        if !(self.perfect_cents >= 0.0
            && self.in_tune_cents >= self.perfect_cents
            && self.close_cents >= self.in_tune_cents)
        {
            return invalid("tolerances must satisfy 0 <= perfect_cents <= in_tune_cents <= close_cents");
        }
        if self.segments == 0 {
            return invalid("segments must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        TunerConfig::default().validate().unwrap();
    }

    #[test]
    fn band_lags() {
        let band = FrequencyBand::default();
        assert_eq!(band.min_lag(44100), 98);
        assert_eq!(band.max_lag(44100), 630);
        assert!(band.contains(110.0));
        assert!(!band.contains(500.0));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = TunerConfig::from_json(
            r#"{ "in_tune_cents": 10.0, "bank": { "estimators": [ { "kind": "yin", "weight": 1.0 } ] } }"#,
        )
        .unwrap();
        assert_eq!(config.in_tune_cents, 10.0);
        assert_eq!(config.bank.estimators.len(), 1);
        assert_eq!(config.bank.window_size, 8192);
        assert_eq!(config.combiner, CombinerConfig::default());
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut config = TunerConfig::default();
        config.band = FrequencyBand::new(500.0, 100.0);
        assert!(matches!(config.validate(), Err(TunerError::InvalidConfig(_))));

        let mut config = TunerConfig::default();
        config.bank.estimators.clear();
        assert!(config.validate().is_err());

        let mut config = TunerConfig::default();
        config.combiner.relaxed_min_confidence = 0.9;
        assert!(config.validate().is_err());

        assert!(TunerConfig::from_json(r#"{ "segments": 0 }"#).is_err());
    }
}
