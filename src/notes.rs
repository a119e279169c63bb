//! # Note Table
//!
//! The set of notes a recording is matched against. A table is validated once
//! when it is built and is immutable afterwards, so it can be shared freely
//! between sessions.
//!
//! Each [NoteDefinition] lists its overtones (2nd, 3rd, 4th harmonic...).
//! The overtone corrector uses them to recognise an estimate that locked onto
//! a harmonic of a lower string.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::TunerError;

/// Harmonics generated for a definition that does not list its own overtones.
const DEFAULT_OVERTONES: usize = 3;

/// A single target note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDefinition {
    /// Note name, e.g. "E2".
    pub name: String,
    /// Target fundamental frequency in Hz.
    pub fundamental_hz: f64,
    /// Overtone frequencies in ascending order, starting with the 2nd harmonic.
    #[serde(default)]
    pub overtones: Vec<f64>,
    /// Optional human-readable label such as "6th string (Low E)".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl NoteDefinition {
    /// A note whose overtones are the exact integer harmonics of `fundamental_hz`.
    pub fn new(name: &str, fundamental_hz: f64) -> Self {
        NoteDefinition {
            name: name.to_string(),
            fundamental_hz,
            overtones: harmonics(fundamental_hz, DEFAULT_OVERTONES),
            label: None,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }
}

fn harmonics(fundamental_hz: f64, count: usize) -> Vec<f64> {
    (2..count + 2).map(|n| fundamental_hz * n as f64).collect()
}

/// A validated, immutable collection of [NoteDefinition]s.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NoteTable {
    notes: Vec<NoteDefinition>,
}

impl NoteTable {
    /// Validate `notes` and build a table. Definitions without overtones get
    /// the 2nd to 4th harmonics filled in.
    pub fn new(notes: Vec<NoteDefinition>) -> Result<Self, TunerError> {
        if notes.is_empty() {
            return Err(TunerError::InvalidNoteTable("the table is empty".into()));
        }

        let mut names = HashSet::new();
        let mut validated = Vec::with_capacity(notes.len());
        for mut note in notes {
            if note.name.trim().is_empty() {
                return Err(TunerError::InvalidNoteTable("a note has an empty name".into()));
            }
            if !names.insert(note.name.clone()) {
                return Err(TunerError::InvalidNoteTable(format!(
                    "note '{}' is defined twice",
                    note.name
                )));
            }
            if !(note.fundamental_hz.is_finite() && note.fundamental_hz > 0.0) {
                return Err(TunerError::InvalidNoteTable(format!(
                    "note '{}' has a non-positive fundamental {}",
                    note.name, note.fundamental_hz
                )));
            }
            if note.overtones.is_empty() {
                note.overtones = harmonics(note.fundamental_hz, DEFAULT_OVERTONES);
            }
            let mut previous = note.fundamental_hz;
            for &overtone in &note.overtones {
                if !(overtone.is_finite() && overtone > previous) {
                    return Err(TunerError::InvalidNoteTable(format!(
                        "overtones of '{}' must be finite and strictly ascending above the fundamental",
                        note.name
                    )));
                }
                previous = overtone;
            }
            validated.push(note);
        }

        Ok(NoteTable { notes: validated })
    }

    /// Parse and validate a JSON array of note definitions.
    pub fn from_json(json: &str) -> Result<Self, TunerError> {
        let notes: Vec<NoteDefinition> = serde_json::from_str(json)?;
        NoteTable::new(notes)
    }

    /// Standard six-string guitar tuning, E2 to E4.
    pub fn standard_guitar() -> Self {
        NoteTable {
            notes: vec![
                NoteDefinition::new("E2", 82.41).with_label("6th string (Low E)"),
                NoteDefinition::new("A2", 110.00).with_label("5th string (A)"),
                NoteDefinition::new("D3", 146.83).with_label("4th string (D)"),
                NoteDefinition::new("G3", 196.00).with_label("3rd string (G)"),
                NoteDefinition::new("B3", 246.94).with_label("2nd string (B)"),
                NoteDefinition::new("E4", 329.63).with_label("1st string (High E)"),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&NoteDefinition> {
        self.notes.iter().find(|note| note.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteDefinition> {
        self.notes.iter()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

impl Default for NoteTable {
    fn default() -> Self {
        NoteTable::standard_guitar()
    }
}
