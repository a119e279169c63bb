//! The complete analysis pipeline.
//!
//! [Tuner::tune] takes one [AudioBuffer] through preprocessing, the estimator
//! bank, the combiner and the overtone corrector, records the result in the
//! caller's [StabilityTracker] and maps it to a note.

use std::hash::Hash;

use crate::combiner::{CombinedEstimate, Combiner};
use crate::config::TunerConfig;
use crate::detector::bank::EstimatorBank;
use crate::error::{NoDetection, TunerError};
use crate::notes::NoteTable;
use crate::overtone::OvertoneCorrector;
use crate::preprocess::Preprocessor;
use crate::stability::{SessionStore, StabilityTracker};
use crate::tuning::{NoteMapper, Tolerances, TuningMode, TuningResult};
use crate::utils::stats::{mean, median, std_dev};

/// Mono samples and their sample rate, borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct AudioBuffer<'a> {
    pub samples: &'a [f64],
    pub sample_rate: usize,
}

impl<'a> AudioBuffer<'a> {
    pub fn new(samples: &'a [f64], sample_rate: usize) -> Self {
        AudioBuffer {
            samples,
            sample_rate,
        }
    }
}

pub struct Tuner {
    config: TunerConfig,
    notes: NoteTable,
    preprocessor: Preprocessor,
    bank: EstimatorBank,
    combiner: Combiner,
    corrector: OvertoneCorrector,
}

impl Tuner {
    pub fn new(config: TunerConfig, notes: NoteTable) -> Result<Self, TunerError> {
        config.validate()?;
        Ok(Tuner {
            preprocessor: Preprocessor::new(config.preprocess.clone(), config.working_sample_rate),
            bank: EstimatorBank::new(&config.bank, config.band),
            combiner: Combiner::new(config.combiner.clone(), config.band),
            corrector: OvertoneCorrector::new(config.overtone.clone()),
            config,
            notes,
        })
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn notes(&self) -> &NoteTable {
        &self.notes
    }

    /// Run the estimator bank and the combiner on a preprocessed buffer.
    pub fn estimate(&self, samples: &[f64]) -> CombinedEstimate {
        let estimates = self.bank.run(samples, self.config.working_sample_rate);
        self.combiner.combine(&estimates)
    }

    /// Split the buffer into segments, estimate each, and merge the confident
    /// ones with `whole`. Falls back to `whole` when no segment qualifies.
    fn estimate_segmented(&self, samples: &[f64], whole: CombinedEstimate) -> CombinedEstimate {
        let segment_len = samples.len() / self.config.segments;
        if segment_len < self.config.preprocess.min_length {
            return whole;
        }

        let segments: Vec<CombinedEstimate> = samples
            .chunks_exact(segment_len)
            .map(|segment| self.estimate(segment))
            .filter(|e| e.is_detected() && e.confidence >= self.config.combiner.min_confidence)
            .collect();
        log::debug!("{} of {} segments are confident", segments.len(), self.config.segments);

        merge_segments(&segments, whole)
    }

    /// Analyse one buffer.
    ///
    /// The combined frequency is recorded in `tracker` whenever estimation
    /// ran, including a zero for "no consensus".
    pub fn tune(
        &self,
        buffer: &AudioBuffer,
        tracker: &mut StabilityTracker,
        mode: &TuningMode,
    ) -> Result<TuningResult, NoDetection> {
        if buffer.samples.is_empty() {
            return Err(NoDetection::EmptyBuffer);
        }
        if buffer.sample_rate == 0 {
            return Err(NoDetection::InvalidSampleRate);
        }
        if let TuningMode::Manual(name) = mode {
            if self.notes.get(name).is_none() {
                return Err(NoDetection::UnknownNote(name.clone()));
            }
        }

        let preprocessed = self.preprocessor.process(buffer.samples, buffer.sample_rate);
        let samples = &preprocessed.samples;

        let required = self.config.preprocess.min_length;
        if samples.len() < required {
            return Err(NoDetection::TooShort {
                samples: samples.len(),
                required,
            });
        }
        if preprocessed.input_rms < self.config.min_rms {
            return Err(NoDetection::TooQuiet {
                rms: preprocessed.input_rms,
            });
        }

        let mut combined = self.estimate(samples);
        if self.config.segments > 1 {
            combined = self.estimate_segmented(samples, combined);
        }

        let correction = self.corrector.correct(
            combined,
            samples,
            preprocessed.sample_rate,
            &self.notes,
            |filtered| self.estimate(filtered),
        );
        let combined = correction.estimate;

        tracker.record(combined.frequency_hz);
        if !combined.is_detected() {
            return Err(NoDetection::NoConsensus);
        }

        let matched = NoteMapper::new(&self.notes, self.config.min_frequency_hz)
            .map(combined.frequency_hz, mode)?;
        let tolerances = Tolerances {
            perfect_cents: self.config.perfect_cents,
            in_tune_cents: self.config.in_tune_cents,
            close_cents: self.config.close_cents,
        };

        let result = TuningResult {
            note: matched.note.name.clone(),
            label: matched.note.label.clone(),
            frequency: combined.frequency_hz,
            target_frequency: matched.note.fundamental_hz,
            cents: matched.cents,
            in_tune: tolerances.in_tune(matched.cents),
            direction: tolerances.direction(matched.cents),
            status: tolerances.status(matched.cents),
            confidence: combined.confidence,
            clarity: combined.clarity,
            stability: tracker.stability(),
        };

        log::debug!(
            "{} at {:.2} Hz, {:+.1} cents (confidence {:.2}, clarity {:.2})",
            result.note,
            result.frequency,
            result.cents,
            result.confidence,
            result.clarity
        );

        Ok(result)
    }
}

/// Median frequency of `segments`. The whole-buffer confidence counts for
/// half of the merged confidence and clarity follows the segment spread.
fn merge_segments(segments: &[CombinedEstimate], whole: CombinedEstimate) -> CombinedEstimate {
    let frequencies: Vec<f64> = segments.iter().map(|e| e.frequency_hz).collect();
    let confidences: Vec<f64> = segments.iter().map(|e| e.confidence).collect();
    let (frequency, segment_confidence) = match (median(&frequencies), mean(&confidences)) {
        (Some(f), Some(c)) => (f, c),
        _ => return whole,
    };

    let clarity = match (std_dev(&frequencies), mean(&frequencies)) {
        (Some(spread), Some(m)) if m > 0.0 => (1.0 - spread / m).max(0.0),
        _ => 0.0,
    };

    CombinedEstimate {
        frequency_hz: frequency,
        confidence: ((segment_confidence + whole.confidence) / 2.0).min(1.0),
        clarity,
    }
}

impl<K: Hash + Eq + Clone> SessionStore<K> {
    /// Analyse `buffer` with the tracker of session `key`.
    pub fn tune(
        &self,
        key: &K,
        tuner: &Tuner,
        buffer: &AudioBuffer,
        mode: &TuningMode,
    ) -> Result<TuningResult, NoDetection> {
        self.with_tracker(key, |tracker| tuner.tune(buffer, tracker, mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tuner() -> Tuner {
        Tuner::new(TunerConfig::default(), NoteTable::standard_guitar()).unwrap()
    }

    fn sine(frequency: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * frequency * i as f64 / 44100.0).sin())
            .collect()
    }

    #[test]
    fn rejects_degenerate_buffers() {
        let tuner = tuner();
        let mut tracker = StabilityTracker::new();
        let mode = TuningMode::Automatic;

        let empty = AudioBuffer::new(&[], 44100);
        assert_eq!(tuner.tune(&empty, &mut tracker, &mode), Err(NoDetection::EmptyBuffer));

        let samples = sine(110.0, 4096);
        let no_rate = AudioBuffer::new(&samples, 0);
        assert_eq!(tuner.tune(&no_rate, &mut tracker, &mode), Err(NoDetection::InvalidSampleRate));

        let short = AudioBuffer::new(&samples[..1000], 44100);
        assert!(matches!(
            tuner.tune(&short, &mut tracker, &mode),
            Err(NoDetection::TooShort { samples: 1000, .. })
        ));

        let quiet: Vec<f64> = samples.iter().map(|s| s * 1e-4).collect();
        assert!(matches!(
            tuner.tune(&AudioBuffer::new(&quiet, 44100), &mut tracker, &mode),
            Err(NoDetection::TooQuiet { .. })
        ));
        assert!(tracker.is_empty());
    }

    #[test]
    fn unknown_manual_note_is_reported_before_analysis() {
        let samples = sine(110.0, 16384);
        let mut tracker = StabilityTracker::new();
        let result = tuner().tune(
            &AudioBuffer::new(&samples, 44100),
            &mut tracker,
            &TuningMode::Manual("F#9".into()),
        );
        assert_eq!(result, Err(NoDetection::UnknownNote("F#9".into())));
        assert!(tracker.is_empty());
    }

    #[test]
    fn whole_buffer_counts_for_half_of_the_segment_confidence() {
        let whole = CombinedEstimate {
            frequency_hz: 110.4,
            confidence: 0.6,
            clarity: 0.9,
        };
        let segments: Vec<CombinedEstimate> = [(110.0, 1.0), (110.2, 0.9), (109.8, 0.8), (110.0, 0.9)]
            .iter()
            .map(|&(frequency_hz, confidence)| CombinedEstimate {
                frequency_hz,
                confidence,
                clarity: 1.0,
            })
            .collect();

        let merged = merge_segments(&segments, whole);
        assert_eq!(merged.frequency_hz, 110.0);
        assert!((merged.confidence - 0.75).abs() < 1e-12);
        assert!(merged.clarity > 0.99 && merged.clarity < 1.0);

        assert_eq!(merge_segments(&[], whole), whole);
    }

    #[test]
    fn tunes_a_clean_string() {
        let samples = sine(196.0, 16384);
        let mut tracker = StabilityTracker::new();
        let result = tuner()
            .tune(&AudioBuffer::new(&samples, 44100), &mut tracker, &TuningMode::Automatic)
            .unwrap();
        assert_eq!(result.note, "G3");
        assert_eq!(result.label.as_deref(), Some("3rd string (G)"));
        assert!(result.cents.abs() < 5.0);
        assert_eq!(tracker.len(), 1);
    }
}
