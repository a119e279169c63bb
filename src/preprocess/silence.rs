//! Silence trimming

use crate::utils::buffer::rms;

/// Remove leading and trailing frames whose RMS is more than `floor_db` below
/// the loudest frame. The buffer is returned unchanged when it is entirely
/// silent or when trimming would leave fewer than `min_length` samples.
pub fn trim_silence(samples: &[f64], frame: usize, floor_db: f64, min_length: usize) -> &[f64] {
    if frame == 0 || samples.len() <= frame {
        return samples;
    }

    let levels: Vec<f64> = samples.chunks(frame).map(rms).collect();
    let loudest = levels.iter().cloned().fold(0.0, f64::max);
    if !(loudest > 0.0) {
        return samples;
    }
    let threshold = loudest * 10f64.powf(floor_db / 20.0);

    let first = levels.iter().position(|&l| l >= threshold);
    let last = levels.iter().rposition(|&l| l >= threshold);
    let (first, last) = match (first, last) {
        (Some(first), Some(last)) => (first, last),
        _ => return samples,
    };

    let start = first * frame;
    let end = ((last + 1) * frame).min(samples.len());
    if end - start < min_length {
        log::debug!("trimming would leave {} samples; kept {}", end - start, samples.len());
        return samples;
    }
    &samples[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(lead: usize, body: usize, tail: usize) -> Vec<f64> {
        let mut samples = vec![0.0; lead];
        samples.extend((0..body).map(|i| (i as f64 * 0.05).sin()));
        samples.extend(vec![0.0; tail]);
        samples
    }

    #[test]
    fn quiet_edges_are_removed() {
        let samples = padded(2048, 8192, 3072);
        let trimmed = trim_silence(&samples, 1024, -40.0, 2048);
        assert_eq!(trimmed.len(), 8192);
        assert_eq!(trimmed.as_ptr(), samples[2048..].as_ptr());
    }

    #[test]
    fn short_results_keep_the_whole_buffer() {
        let samples = padded(4096, 1024, 4096);
        assert_eq!(trim_silence(&samples, 1024, -40.0, 2048).len(), samples.len());
    }

    #[test]
    fn all_zero_input_is_untouched() {
        let samples = vec![0.0; 10000];
        assert_eq!(trim_silence(&samples, 1024, -40.0, 2048).len(), 10000);
    }
}
