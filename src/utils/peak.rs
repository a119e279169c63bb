pub enum PeakCorrection {
    Quadratic,
    None,
}

struct Point {
    x: f64,
    y: f64,
}

/// Yields `(start, stop)` index pairs for every stretch of `arr` that begins at
/// a positive-going zero crossing and ends at the following negative-going one.
fn detect_crossings(arr: &[f64]) -> impl Iterator<Item = (usize, usize)> + '_ {
    arr.windows(2)
        .enumerate()
        .scan(
            None,
            |positive_zero_cross: &mut Option<usize>, (i, win)| match positive_zero_cross.take() {
                Some(idx) => {
                    if win[1] < 0.0 && win[0] > 0.0 {
                        *positive_zero_cross = None;
                        Some(Some((idx, i + 1)))
                    } else {
                        *positive_zero_cross = Some(idx);
                        Some(None)
                    }
                }
                None => {
                    if win[1] > 0.0 && win[0] <= 0.0 {
                        *positive_zero_cross = Some(i + 1);
                    }
                    Some(None)
                }
            },
        )
        .flatten()
}

/// The maximum of each positive lobe of `arr`, as `(index, value)`.
pub fn detect_peaks(arr: &[f64]) -> impl Iterator<Item = (usize, f64)> + '_ {
    detect_crossings(arr).map(move |(start, stop)| {
        let mut peak_idx = start;
        let mut peak_val = f64::NEG_INFINITY;
        for (i, &val) in arr.iter().enumerate().take(stop).skip(start) {
            if val > peak_val {
                peak_val = val;
                peak_idx = i;
            }
        }
        (peak_idx, peak_val)
    })
}

pub fn choose_peak<I: Iterator<Item = (usize, f64)>>(mut peaks: I, threshold: f64) -> Option<(usize, f64)> {
    peaks.find(|p| p.1 >= threshold)
}

/// Index and value of the largest element of `arr`. The first of equal
/// maxima wins and NaNs are skipped.
pub fn global_max(arr: &[f64]) -> Option<(usize, f64)> {
    extremum(arr, |val, best| val > best)
}

/// Index and value of the smallest element of `arr`, see [global_max].
pub fn global_min(arr: &[f64]) -> Option<(usize, f64)> {
    extremum(arr, |val, best| val < best)
}

fn extremum(arr: &[f64], better: impl Fn(f64, f64) -> bool) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &val) in arr.iter().enumerate() {
        if val.is_nan() {
            continue;
        }
        match best {
            Some((_, best_val)) if !better(val, best_val) => {}
            _ => best = Some((i, val)),
        }
    }
    best
}

/// Refine a sampled peak to fractional precision. Peaks on the edge of `data`
/// are returned unchanged.
pub fn correct_peak(peak: (usize, f64), data: &[f64], correction: PeakCorrection) -> (f64, f64) {
    match correction {
        PeakCorrection::Quadratic => {
            let idx = peak.0;
            if idx == 0 || idx + 1 >= data.len() {
                return (idx as f64, peak.1);
            }
            let point = quadratic_interpolation(
                Point {
                    x: (idx - 1) as f64,
                    y: data[idx - 1],
                },
                Point {
                    x: idx as f64,
                    y: data[idx],
                },
                Point {
                    x: (idx + 1) as f64,
                    y: data[idx + 1],
                },
            );
            (point.x, point.y)
        }
        PeakCorrection::None => (peak.0 as f64, peak.1),
    }
}

/// Vertex of the parabola through three equally spaced samples, as an offset
/// from the centre sample in units of the spacing together with the value at
/// the vertex. Works for minima as well as maxima.
pub fn parabolic_vertex(left: f64, center: f64, right: f64) -> (f64, f64) {
    let point = quadratic_interpolation(
        Point { x: -1.0, y: left },
        Point { x: 0.0, y: center },
        Point { x: 1.0, y: right },
    );
    (point.x, point.y)
}

fn quadratic_interpolation(left: Point, center: Point, right: Point) -> Point {
    let denominator = 2.0 * center.y - left.y - right.y;
    if denominator.abs() < 1e-12 {
        return center;
    }
    let shift = (0.5 * (right.y - left.y) / denominator).clamp(-1.0, 1.0);
    let x = center.x + shift;
    let y = center.y + 0.25 * (right.y - left.y) * shift;
    Point { x, y }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_correction() {
        let point = quadratic_interpolation(
            Point {
                x: -1.5,
                y: -(1.5 * 1.5) + 4.0,
            },
            Point {
                x: -0.5,
                y: -(0.5 * 0.5) + 4.0,
            },
            Point {
                x: 0.5,
                y: -(0.5 * 0.5) + 4.0,
            },
        );
        assert_eq!(point.x, 0.0);
        assert_eq!(point.y, 4.0);
    }

    #[test]
    fn flat_neighbourhood_is_left_alone() {
        assert_eq!(parabolic_vertex(1.0, 1.0, 1.0), (0.0, 1.0));
    }

    #[test]
    fn vertex_of_a_minimum() {
        // y = (x - 0.25)^2 sampled at -1, 0, 1
        let (shift, value) = parabolic_vertex(1.5625, 0.0625, 0.5625);
        assert!((shift - 0.25).abs() < 1e-12);
        assert!(value.abs() < 1e-12);
    }

    #[test]
    fn peaks_are_found_per_positive_lobe() {
        let data = [-1.0, 0.5, 2.0, 0.5, -1.0, 1.0, 3.0, -0.5];
        let peaks: Vec<_> = detect_peaks(&data).collect();
        assert_eq!(peaks, vec![(2, 2.0), (6, 3.0)]);
        assert_eq!(choose_peak(peaks.into_iter(), 2.5), Some((6, 3.0)));
    }

    #[test]
    fn global_extrema() {
        let data = [0.5, f64::NAN, 3.0, -2.0, 3.0, -2.0];
        assert_eq!(global_max(&data), Some((2, 3.0)));
        assert_eq!(global_min(&data), Some((3, -2.0)));
        assert_eq!(global_max(&[]), None);
        assert_eq!(global_min(&[f64::NAN]), None);
    }

    #[test]
    fn edge_peaks_are_not_interpolated() {
        let data = [3.0, 1.0];
        assert_eq!(correct_peak((0, 3.0), &data, PeakCorrection::Quadratic), (0.0, 3.0));
    }
}
