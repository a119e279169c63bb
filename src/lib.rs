//! # String Tuner
//! *string_tuner* estimates the fundamental frequency of a short recording of
//! a plucked string and maps it to the nearest note of a tuning, reporting
//! the deviation in cents together with confidence, clarity and stability
//! scores.
//!
//! # Pipeline
//!   * [Preprocessing][preprocess]: silence trimming, resampling, DC removal,
//!     A-weighting, noise gating and normalisation.
//!   * [Estimators][detector]: every estimator reads the same buffer and
//!     reports a frequency and a confidence.
//!       * [McLeod / NSDF][detector::mcleod]
//!       * [Sub-harmonic summation][detector::swipe]
//!       * [YIN with an adaptive threshold][detector::yin]
//!       * [Liftered cepstrum][detector::cepstrum]
//!       * [Phase-based instantaneous frequency][detector::phase]
//!       * [Autocorrelation][detector::autocorrelation] and
//!         [harmonic product spectrum][detector::hps], used by the classic bank
//!   * [Combiner][combiner]: confidence-weighted average with MAD outlier rejection.
//!   * [Overtone correction][overtone]: recovers the fundamental when the
//!     bank locked onto a harmonic of a lower string.
//!   * [Stability][stability]: per-session history of results.
//!   * [Note mapping][tuning]: cents, direction and in-tune verdict.
//!
//! # Examples
//! ```
//! use string_tuner::{AudioBuffer, NoteTable, StabilityTracker, Tuner, TunerConfig, TuningMode};
//!
//! fn main() {
//!     const SAMPLE_RATE: usize = 44100;
//!
//!     // An A string played slightly sharp.
//!     let freq = 111.0;
//!     let signal: Vec<f64> = (0..16384)
//!         .map(|i| 0.5 * (2.0 * std::f64::consts::PI * freq * i as f64 / SAMPLE_RATE as f64).sin())
//!         .collect();
//!
//!     let tuner = Tuner::new(TunerConfig::default(), NoteTable::standard_guitar()).unwrap();
//!     let mut session = StabilityTracker::new();
//!
//!     let result = tuner
//!         .tune(&AudioBuffer::new(&signal, SAMPLE_RATE), &mut session, &TuningMode::Automatic)
//!         .unwrap();
//!
//!     println!("{}: {:+.1} cents ({:?})", result.note, result.cents, result.direction);
//! }
//! ```

pub use combiner::CombinedEstimate;
pub use config::{FrequencyBand, TunerConfig};
pub use detector::{EstimatorKind, PitchEstimate, PitchEstimator};
pub use error::{NoDetection, TunerError};
pub use notes::{NoteDefinition, NoteTable};
pub use stability::{SessionStore, StabilityTracker};
pub use tuner::{AudioBuffer, Tuner};
pub use tuning::{Direction, TuningMode, TuningResult, TuningStatus};

pub mod combiner;
pub mod config;
pub mod detector;
pub mod error;
pub mod notes;
pub mod overtone;
pub mod preprocess;
pub mod stability;
pub mod tuner;
pub mod tuning;
pub mod utils;
