//! Sample-rate conversion to the working rate.

use rubato::{FftFixedIn, Resampler};

const CHUNK_SIZE: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Resample `samples` from `from` Hz to `to` Hz. The output holds
/// `round(len * to / from)` samples aligned with the input.
pub fn resample(samples: &[f64], from: usize, to: usize) -> Vec<f64> {
    if from == to || samples.is_empty() {
        return samples.to_vec();
    }
    let expected = (samples.len() as f64 * to as f64 / from as f64).round() as usize;

    match FftFixedIn::<f64>::new(from, to, CHUNK_SIZE, SUB_CHUNKS, 1) {
        Ok(mut resampler) => {
            let delay = resampler.output_delay();
            let mut output: Vec<f64> = Vec::with_capacity(expected + delay + CHUNK_SIZE);
            let mut position = 0;

            // Input past the end is zero, which also flushes the filter delay.
            while output.len() < expected + delay {
                let needed = resampler.input_frames_next();
                let mut chunk = vec![0.0; needed];
                if position < samples.len() {
                    let available = (samples.len() - position).min(needed);
                    chunk[..available].copy_from_slice(&samples[position..position + available]);
                }
                position += needed;

                match resampler.process(&[chunk], None) {
                    Ok(mut frames) => match frames.pop() {
                        Some(channel) => output.extend(channel),
                        None => break,
                    },
                    Err(err) => {
                        log::warn!("resampler failed ({}); using linear interpolation", err);
                        return linear_resample(samples, from, to);
                    }
                }
            }

            output.into_iter().skip(delay).take(expected).collect()
        }
        Err(err) => {
            log::warn!(
                "cannot resample {} Hz to {} Hz with rubato ({}); using linear interpolation",
                from,
                to,
                err
            );
            linear_resample(samples, from, to)
        }
    }
}

/// Linear interpolation, used when the FFT resampler is unavailable.
pub fn linear_resample(samples: &[f64], from: usize, to: usize) -> Vec<f64> {
    if from == to || samples.is_empty() || from == 0 || to == 0 {
        return samples.to_vec();
    }
    let expected = (samples.len() as f64 * to as f64 / from as f64).round() as usize;
    let step = from as f64 / to as f64;
    let last = samples.len() - 1;
    (0..expected)
        .map(|i| {
            let position = i as f64 * step;
            let lo = (position.floor() as usize).min(last);
            let hi = (lo + 1).min(last);
            let frac = position - lo as f64;
            samples[lo] + (samples[hi] - samples[lo]) * frac
        })
        .collect()
}
