//! Tune a WAV file and print the result as JSON.
//!
//! ```text
//! RUST_LOG=debug cargo run --example tune_wav -- recording.wav [NOTE]
//! ```
//!
//! Multi-channel files are mixed down to mono. With a note name the result is
//! measured against that note instead of the nearest one.

use std::error::Error;

use string_tuner::{AudioBuffer, NoteTable, StabilityTracker, Tuner, TunerConfig, TuningMode};

fn read_mono(path: &str) -> Result<(Vec<f64>, usize), Box<dyn Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f64 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f64>() / frame.len() as f64)
        .collect();
    Ok((mono, spec.sample_rate as usize))
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let path = args.next().ok_or("usage: tune_wav <file.wav> [NOTE]")?;
    let mode = match args.next() {
        Some(note) => TuningMode::Manual(note),
        None => TuningMode::Automatic,
    };

    let (samples, sample_rate) = read_mono(&path)?;
    log::info!("{}: {} samples at {} Hz", path, samples.len(), sample_rate);

    let tuner = Tuner::new(TunerConfig::default(), NoteTable::standard_guitar())?;
    let mut session = StabilityTracker::new();

    match tuner.tune(&AudioBuffer::new(&samples, sample_rate), &mut session, &mode) {
        Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        Err(reason) => {
            eprintln!("No pitch detected: {}", reason);
            std::process::exit(1);
        }
    }

    Ok(())
}
