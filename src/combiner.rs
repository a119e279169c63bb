//! Reconciles the bank's estimates into one answer.
//!
//! Estimates outside the band or below the confidence gate are dropped. If
//! nothing survives, the gate is relaxed once. Survivors more than a few
//! median absolute deviations away from the median are rejected, unless that
//! would reject all of them, and the rest are averaged with weight
//! `static_weight * confidence`.

use serde::{Deserialize, Serialize};

use crate::config::{CombinerConfig, FrequencyBand};
use crate::detector::bank::WeightedEstimate;
use crate::utils::stats::{mean, median, median_absolute_deviation, std_dev};

/// The combined answer of an estimator bank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinedEstimate {
    /// Zero when no estimate survived.
    pub frequency_hz: f64,
    /// Mean confidence of the retained estimates.
    pub confidence: f64,
    /// Agreement between the retained estimates, in `[0, 1]`.
    pub clarity: f64,
}

impl CombinedEstimate {
    pub fn none() -> Self {
        CombinedEstimate {
            frequency_hz: 0.0,
            confidence: 0.0,
            clarity: 0.0,
        }
    }

    pub fn is_detected(&self) -> bool {
        self.frequency_hz > 0.0
    }
}

pub struct Combiner {
    config: CombinerConfig,
    band: FrequencyBand,
}

impl Combiner {
    pub fn new(config: CombinerConfig, band: FrequencyBand) -> Self {
        Combiner { config, band }
    }

    fn survivors(&self, estimates: &[WeightedEstimate], gate: f64) -> Vec<WeightedEstimate> {
        estimates
            .iter()
            .filter(|e| {
                e.estimate.is_detected()
                    && self.band.contains(e.estimate.frequency_hz)
                    && e.estimate.confidence >= gate
            })
            .cloned()
            .collect()
    }

    pub fn combine(&self, estimates: &[WeightedEstimate]) -> CombinedEstimate {
        let mut survivors = self.survivors(estimates, self.config.min_confidence);
        if survivors.is_empty() {
            survivors = self.survivors(estimates, self.config.relaxed_min_confidence);
            log::debug!("relaxed confidence gate: {} survivors", survivors.len());
        }

        let frequencies: Vec<f64> = survivors.iter().map(|e| e.estimate.frequency_hz).collect();
        let (center, mad) = match (median(&frequencies), median_absolute_deviation(&frequencies)) {
            (Some(center), Some(mad)) => (center, mad),
            _ => return CombinedEstimate::none(),
        };

        let limit = self.config.mad_multiplier * mad;
        let retained: Vec<WeightedEstimate> = survivors
            .iter()
            .filter(|e| (e.estimate.frequency_hz - center).abs() <= limit)
            .cloned()
            .collect();
        let retained = if retained.is_empty() { survivors } else { retained };

        for rejected in estimates.iter().filter(|e| !retained.contains(e)) {
            log::debug!(
                "{} excluded at {:.2} Hz",
                rejected.kind.name(),
                rejected.estimate.frequency_hz
            );
        }

        let weights: f64 = retained.iter().map(|e| e.weight * e.estimate.confidence).sum();
        let frequencies: Vec<f64> = retained.iter().map(|e| e.estimate.frequency_hz).collect();
        let frequency = if weights > 0.0 {
            retained
                .iter()
                .map(|e| e.estimate.frequency_hz * e.weight * e.estimate.confidence)
                .sum::<f64>()
                / weights
        } else {
            // Only reachable with a zero relaxed gate; fall back to the median.
            center
        };

        let confidences: Vec<f64> = retained.iter().map(|e| e.estimate.confidence).collect();
        let confidence = mean(&confidences).unwrap_or(0.0);

        let clarity = if retained.len() == 1 {
            1.0
        } else {
            match (std_dev(&frequencies), median(&frequencies)) {
                (Some(spread), Some(mid)) if mid > 0.0 => (1.0 - spread / mid).max(0.0),
                _ => 0.0,
            }
        };

        CombinedEstimate {
            frequency_hz: frequency,
            confidence,
            clarity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{EstimatorKind, PitchEstimate};

    fn entry(kind: EstimatorKind, frequency: f64, confidence: f64, weight: f64) -> WeightedEstimate {
        WeightedEstimate {
            kind,
            estimate: PitchEstimate::new(frequency, confidence),
            weight,
        }
    }

    fn combiner() -> Combiner {
        Combiner::new(CombinerConfig::default(), FrequencyBand::default())
    }

    #[test]
    fn divergent_estimate_is_rejected() {
        let estimates = [
            entry(EstimatorKind::Nsdf, 110.1, 0.95, 1.2),
            entry(EstimatorKind::Yin, 109.9, 0.9, 1.1),
            entry(EstimatorKind::SubharmonicSummation, 110.3, 0.85, 1.0),
            entry(EstimatorKind::Phase, 109.8, 0.8, 0.9),
            entry(EstimatorKind::Cepstrum, 300.0, 1.0, 5.0),
        ];
        let combined = combiner().combine(&estimates);
        assert!((combined.frequency_hz - 110.0).abs() < 0.5);
        assert!(combined.clarity > 0.99);
        assert!((combined.confidence - 0.875).abs() < 1e-9);
    }

    #[test]
    fn gate_is_relaxed_once() {
        let estimates = [
            entry(EstimatorKind::Nsdf, 196.0, 0.4, 1.2),
            entry(EstimatorKind::Yin, 196.4, 0.2, 1.1),
        ];
        let combined = combiner().combine(&estimates);
        assert_eq!(combined.frequency_hz, 196.0);
        assert_eq!(combined.clarity, 1.0);
        assert_eq!(combined.confidence, 0.4);
    }

    #[test]
    fn nothing_plausible_is_no_detection() {
        let estimates = [
            entry(EstimatorKind::Nsdf, 0.0, 0.0, 1.2),
            entry(EstimatorKind::Yin, 1000.0, 0.99, 1.1),
            entry(EstimatorKind::Cepstrum, 110.0, 0.1, 1.0),
        ];
        assert_eq!(combiner().combine(&estimates), CombinedEstimate::none());
        assert_eq!(combiner().combine(&[]), CombinedEstimate::none());
    }

    #[test]
    fn identical_estimates_keep_full_clarity() {
        let estimates = [
            entry(EstimatorKind::Nsdf, 146.83, 0.9, 1.2),
            entry(EstimatorKind::Yin, 146.83, 0.7, 1.1),
        ];
        let combined = combiner().combine(&estimates);
        assert!((combined.frequency_hz - 146.83).abs() < 1e-9);
        assert_eq!(combined.clarity, 1.0);
    }

    #[test]
    fn disagreement_lowers_clarity() {
        let estimates = [
            entry(EstimatorKind::Nsdf, 100.0, 0.9, 1.0),
            entry(EstimatorKind::Yin, 140.0, 0.9, 1.0),
        ];
        let combined = combiner().combine(&estimates);
        assert!((combined.frequency_hz - 120.0).abs() < 1e-9);
        assert!(combined.clarity < 0.9);
    }
}
