//! Note mapping and the tuning result.

use serde::{Deserialize, Serialize};

use crate::error::NoDetection;
use crate::notes::{NoteDefinition, NoteTable};

/// Distance from `target` to `frequency` in cents, `1200 * log2(f / target)`.
#[inline]
pub fn cents(frequency: f64, target: f64) -> f64 {
    1200.0 * (frequency / target).log2()
}

/// Frequency `cents` away from `target`.
#[inline]
pub fn cents_to_frequency(target: f64, cents: f64) -> f64 {
    target * (cents / 1200.0).exp2()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sharp,
    Flat,
    Perfect,
}

impl Direction {
    /// Sharp above `+epsilon`, flat below `-epsilon`, perfect in between.
    pub fn from_cents(cents: f64, epsilon: f64) -> Self {
        if cents > epsilon {
            Direction::Sharp
        } else if cents < -epsilon {
            Direction::Flat
        } else {
            Direction::Perfect
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningStatus {
    InTune,
    Close,
    OutOfTune,
}

/// Which note a frequency is compared with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TuningMode {
    /// The nearest note of the table.
    #[default]
    Automatic,
    /// A fixed note, by name.
    Manual(String),
}

/// The note a frequency was matched to.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteMatch<'a> {
    pub note: &'a NoteDefinition,
    pub cents: f64,
}

/// The outcome of one successful analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningResult {
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub frequency: f64,
    pub target_frequency: f64,
    pub cents: f64,
    pub in_tune: bool,
    pub direction: Direction,
    pub status: TuningStatus,
    pub confidence: f64,
    pub clarity: f64,
    pub stability: f64,
}

pub struct NoteMapper<'a> {
    table: &'a NoteTable,
    min_frequency_hz: f64,
}

impl<'a> NoteMapper<'a> {
    pub fn new(table: &'a NoteTable, min_frequency_hz: f64) -> Self {
        NoteMapper {
            table,
            min_frequency_hz,
        }
    }

    pub fn map(&self, frequency: f64, mode: &TuningMode) -> Result<NoteMatch<'a>, NoDetection> {
        if !(frequency > self.min_frequency_hz) {
            return Err(NoDetection::BelowMinimumFrequency { frequency });
        }

        let note = match mode {
            TuningMode::Manual(name) => self
                .table
                .get(name)
                .ok_or_else(|| NoDetection::UnknownNote(name.clone()))?,
            TuningMode::Automatic => self
                .table
                .iter()
                .min_by(|a, b| {
                    cents(frequency, a.fundamental_hz)
                        .abs()
                        .total_cmp(&cents(frequency, b.fundamental_hz).abs())
                })
                .ok_or(NoDetection::NoConsensus)?,
        };

        Ok(NoteMatch {
            note,
            cents: cents(frequency, note.fundamental_hz),
        })
    }
}

/// Tolerances that turn a cents deviation into a verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub perfect_cents: f64,
    pub in_tune_cents: f64,
    pub close_cents: f64,
}

impl Tolerances {
    pub fn direction(&self, cents: f64) -> Direction {
        Direction::from_cents(cents, self.perfect_cents)
    }

    pub fn in_tune(&self, cents: f64) -> bool {
        cents.abs() <= self.in_tune_cents
    }

    pub fn status(&self, cents: f64) -> TuningStatus {
        let deviation = cents.abs();
        if deviation <= self.in_tune_cents {
            TuningStatus::InTune
        } else if deviation <= self.close_cents {
            TuningStatus::Close
        } else {
            TuningStatus::OutOfTune
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_properties() {
        assert_eq!(cents(110.0, 110.0), 0.0);
        assert!((cents(220.0, 110.0) - 1200.0).abs() < 1e-9);
        assert!((cents(110.0, 220.0) + 1200.0).abs() < 1e-9);
        assert!(cents(111.0, 110.0) < cents(112.0, 110.0));
        let shifted = cents_to_frequency(110.0, 50.0);
        assert!((cents(shifted, 110.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn direction_follows_sign() {
        assert_eq!(Direction::from_cents(0.3, 0.0), Direction::Sharp);
        assert_eq!(Direction::from_cents(-0.3, 0.0), Direction::Flat);
        assert_eq!(Direction::from_cents(0.0, 0.0), Direction::Perfect);
        assert_eq!(Direction::from_cents(0.3, 1.0), Direction::Perfect);
        assert_eq!(Direction::from_cents(-1.5, 1.0), Direction::Flat);
    }

    #[test]
    fn automatic_mode_picks_the_nearest_note() {
        let table = NoteTable::standard_guitar();
        let mapper = NoteMapper::new(&table, 10.0);
        let matched = mapper.map(112.0, &TuningMode::Automatic).unwrap();
        assert_eq!(matched.note.name, "A2");
        assert!(matched.cents > 0.0);

        // Closer to D3 in cents even though both neighbours are tens of Hz away.
        let matched = mapper.map(140.0, &TuningMode::Automatic).unwrap();
        assert_eq!(matched.note.name, "D3");
    }

    #[test]
    fn manual_mode_uses_the_requested_note() {
        let table = NoteTable::standard_guitar();
        let mapper = NoteMapper::new(&table, 10.0);
        let matched = mapper.map(112.0, &TuningMode::Manual("D3".into())).unwrap();
        assert_eq!(matched.note.name, "D3");
        assert!(matched.cents < -400.0);

        assert_eq!(
            mapper.map(112.0, &TuningMode::Manual("C9".into())).unwrap_err(),
            NoDetection::UnknownNote("C9".into())
        );
    }

    #[test]
    fn tiny_frequencies_do_not_match() {
        let table = NoteTable::standard_guitar();
        let mapper = NoteMapper::new(&table, 10.0);
        assert!(matches!(
            mapper.map(10.0, &TuningMode::Automatic),
            Err(NoDetection::BelowMinimumFrequency { .. })
        ));
        assert!(mapper.map(0.0, &TuningMode::Automatic).is_err());
    }

    #[test]
    fn status_bands() {
        let tolerances = Tolerances {
            perfect_cents: 1.0,
            in_tune_cents: 5.0,
            close_cents: 25.0,
        };
        assert_eq!(tolerances.status(-4.9), TuningStatus::InTune);
        assert_eq!(tolerances.status(12.0), TuningStatus::Close);
        assert_eq!(tolerances.status(-40.0), TuningStatus::OutOfTune);
        assert!(tolerances.in_tune(5.0));
        assert!(!tolerances.in_tune(5.1));
    }
}
