//! Overtone correction.
//!
//! A plucked low string often carries more energy in its 2nd or 3rd harmonic
//! than in its fundamental, and the bank then agrees on the harmonic. When the
//! combined frequency sits on an overtone of a known note, the buffer is
//! low-pass filtered just above that note's fundamental and estimated again.
//! The correction is kept only if the second pass lands on the fundamental.

use crate::combiner::CombinedEstimate;
use crate::config::OvertoneConfig;
use crate::notes::{NoteDefinition, NoteTable};
use crate::utils::filters::butterworth_lowpass;

/// Outcome of an overtone check.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub estimate: CombinedEstimate,
    /// Name of the note whose fundamental replaced the estimate, if any.
    pub corrected_to: Option<String>,
}

impl Correction {
    fn unchanged(estimate: CombinedEstimate) -> Self {
        Correction {
            estimate,
            corrected_to: None,
        }
    }
}

pub struct OvertoneCorrector {
    config: OvertoneConfig,
}

impl OvertoneCorrector {
    pub fn new(config: OvertoneConfig) -> Self {
        OvertoneCorrector { config }
    }

    /// The note with an overtone closest to `frequency`, if one lies within
    /// the match tolerance.
    pub fn suspect<'a>(&self, frequency: f64, notes: &'a NoteTable) -> Option<&'a NoteDefinition> {
        notes
            .iter()
            .flat_map(|note| {
                note.overtones
                    .iter()
                    .take(self.config.overtones_checked)
                    .map(move |&overtone| (note, (frequency - overtone).abs()))
            })
            .filter(|&(_, distance)| distance <= self.config.match_tolerance_hz)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(note, _)| note)
    }

    /// Check `combined` against the overtones in `notes` and, on a match,
    /// re-run estimation through `reestimate` on a low-passed copy of
    /// `signal`. Runs at most once.
    pub fn correct<F>(
        &self,
        combined: CombinedEstimate,
        signal: &[f64],
        sample_rate: usize,
        notes: &NoteTable,
        mut reestimate: F,
    ) -> Correction
    where
        F: FnMut(&[f64]) -> CombinedEstimate,
    {
        if !self.config.enabled || !combined.is_detected() {
            return Correction::unchanged(combined);
        }
        let note = match self.suspect(combined.frequency_hz, notes) {
            Some(note) => note,
            None => return Correction::unchanged(combined),
        };

        let cutoff = self.config.lowpass_ratio * note.fundamental_hz;
        let filtered = butterworth_lowpass(signal, cutoff, self.config.filter_order, sample_rate);
        let second = reestimate(&filtered);

        if second.is_detected()
            && (second.frequency_hz - note.fundamental_hz).abs() <= self.config.accept_tolerance_hz
        {
            log::debug!(
                "{:.2} Hz is an overtone of {}; corrected to {:.2} Hz",
                combined.frequency_hz,
                note.name,
                second.frequency_hz
            );
            Correction {
                estimate: CombinedEstimate {
                    frequency_hz: second.frequency_hz,
                    confidence: second.confidence * self.config.confidence_discount,
                    clarity: second.clarity,
                },
                corrected_to: Some(note.name.clone()),
            }
        } else {
            log::debug!(
                "{:.2} Hz kept; low-passed re-estimate gave {:.2} Hz",
                combined.frequency_hz,
                second.frequency_hz
            );
            Correction::unchanged(combined)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combiner::Combiner;
    use crate::config::{BankConfig, CombinerConfig, FrequencyBand};
    use crate::detector::bank::EstimatorBank;
    use std::f64::consts::PI;

    const SR: usize = 44100;

    fn estimate(frequency_hz: f64, confidence: f64) -> CombinedEstimate {
        CombinedEstimate {
            frequency_hz,
            confidence,
            clarity: 0.95,
        }
    }

    fn tone(f0: f64, amplitudes: &[f64], len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| {
                let t = i as f64 / SR as f64;
                amplitudes
                    .iter()
                    .enumerate()
                    .map(|(h, a)| a * (2.0 * PI * f0 * (h + 1) as f64 * t).sin())
                    .sum()
            })
            .collect()
    }

    fn pipeline(signal: &[f64]) -> CombinedEstimate {
        let band = FrequencyBand::default();
        let bank = EstimatorBank::new(&BankConfig::full(), band);
        Combiner::new(CombinerConfig::default(), band).combine(&bank.run(signal, SR))
    }

    #[test]
    fn closest_overtone_is_suspected() {
        let corrector = OvertoneCorrector::new(OvertoneConfig::default());
        let notes = NoteTable::standard_guitar();
        assert_eq!(corrector.suspect(165.5, &notes).map(|n| n.name.as_str()), Some("E2"));
        assert_eq!(corrector.suspect(221.0, &notes).map(|n| n.name.as_str()), Some("A2"));
        assert_eq!(corrector.suspect(247.3, &notes).map(|n| n.name.as_str()), Some("E2"));
        assert!(corrector.suspect(110.0, &notes).is_none());
        assert!(corrector.suspect(500.0, &notes).is_none());

        let second_only = OvertoneCorrector::new(OvertoneConfig {
            overtones_checked: 1,
            ..OvertoneConfig::default()
        });
        assert!(second_only.suspect(247.3, &notes).is_none());
    }

    #[test]
    fn accepted_correction_discounts_confidence() {
        let corrector = OvertoneCorrector::new(OvertoneConfig::default());
        let notes = NoteTable::standard_guitar();
        let mut calls = 0;
        let correction = corrector.correct(estimate(164.9, 0.9), &[0.0; 16], SR, &notes, |_| {
            calls += 1;
            estimate(82.5, 0.8)
        });
        assert_eq!(calls, 1);
        assert_eq!(correction.corrected_to.as_deref(), Some("E2"));
        assert_eq!(correction.estimate.frequency_hz, 82.5);
        assert!((correction.estimate.confidence - 0.72).abs() < 1e-12);
    }

    #[test]
    fn rejected_correction_keeps_the_original() {
        let corrector = OvertoneCorrector::new(OvertoneConfig::default());
        let notes = NoteTable::standard_guitar();
        let original = estimate(164.9, 0.9);
        let correction = corrector.correct(original, &[0.0; 16], SR, &notes, |_| estimate(164.7, 0.9));
        assert_eq!(correction, Correction::unchanged(original));

        let disabled = OvertoneCorrector::new(OvertoneConfig {
            enabled: false,
            ..OvertoneConfig::default()
        });
        let correction = disabled.correct(original, &[0.0; 16], SR, &notes, |_| estimate(82.4, 0.9));
        assert_eq!(correction.estimate, original);
    }

    #[test]
    fn harmonic_lock_is_corrected_to_the_low_string() {
        let signal = tone(82.41, &[0.6, 1.0, 0.6], 16384);
        let corrector = OvertoneCorrector::new(OvertoneConfig::default());
        let correction = corrector.correct(
            estimate(164.8, 0.9),
            &signal,
            SR,
            &NoteTable::standard_guitar(),
            pipeline,
        );
        assert_eq!(correction.corrected_to.as_deref(), Some("E2"));
        assert!((correction.estimate.frequency_hz - 82.41).abs() < 1.0);
    }

    #[test]
    fn genuine_high_strings_are_left_alone() {
        let corrector = OvertoneCorrector::new(OvertoneConfig::default());
        let notes = NoteTable::standard_guitar();
        for &f in &[329.63, 246.94] {
            let signal = tone(f, &[1.0], 16384);
            let correction = corrector.correct(estimate(f, 0.95), &signal, SR, &notes, pipeline);
            assert_eq!(correction.corrected_to, None);
            assert_eq!(correction.estimate.frequency_hz, f);
        }
    }
}
