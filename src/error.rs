//! Error types for the tuner.
//!
//! Two categories exist. [TunerError] covers configuration that cannot be
//! used at all, and is reported once at start-up. [NoDetection] is the only
//! outcome of a well-formed analysis that did not produce a pitch; it carries
//! a human-readable reason for the boundary layer to forward.

use thiserror::Error;

/// Invalid configuration or note-table input.
#[derive(Error, Debug)]
pub enum TunerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid note table: {0}")]
    InvalidNoteTable(String),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why an analysis produced no tuning result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NoDetection {
    #[error("No audio samples were supplied")]
    EmptyBuffer,

    #[error("Sample rate must be positive")]
    InvalidSampleRate,

    #[error("Recording too short: {samples} samples, need at least {required}")]
    TooShort { samples: usize, required: usize },

    #[error("Audio too quiet (RMS {rms:.6}). Play louder or closer to the microphone")]
    TooQuiet { rms: f64 },

    #[error("No clear pitch detected. Play a single note louder")]
    NoConsensus,

    #[error("Detected frequency {frequency:.2} Hz is too low to match a note")]
    BelowMinimumFrequency { frequency: f64 },

    #[error("Unknown target note '{0}'")]
    UnknownNote(String),
}
