//! Small numeric helpers shared by the decoder and refiner.
//!
//! These mirror the leaf reductions `rf-dsp::analysis` and
//! `rf-pitch::detection` hand-roll for spectral buffers (no logging, no
//! allocation beyond the caller-visible return value).

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Index of the maximum value in `row`. Ties are broken by the lowest
/// index; an empty row has no argmax.
pub fn arg_max(row: ArrayView1<f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in row.iter().enumerate() {
        match best {
            Some((_, best_v)) if v <= best_v => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Row-wise argmax: one index per row, `usize::MAX` for an empty row (no
/// empty rows occur in practice since every matrix here has >=1 column).
pub fn arg_max_axis1(a: ArrayView2<f32>) -> Vec<usize> {
    a.axis_iter(Axis(0))
        .map(|row| arg_max(row).unwrap_or(usize::MAX))
        .collect()
}

/// `(rows, cols)` coordinates of every cell in `a` that is strictly
/// greater than `thresh`, in row-major order.
pub fn where_greater_than(a: ArrayView2<f32>, thresh: f32) -> (Vec<usize>, Vec<usize>) {
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    for ((r, c), &v) in a.indexed_iter() {
        if v > thresh {
            rows.push(r);
            cols.push(c);
        }
    }
    (rows, cols)
}

/// Sample mean and sample standard deviation (denominator `N-1`) of every
/// element in `a`. Returns `(mean, std)`; `std` is `0.0` for fewer than 2
/// elements.
pub fn mean_std_dev(a: ArrayView2<f32>) -> (f64, f64) {
    let n = a.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let sum: f64 = a.iter().map(|&v| v as f64).sum();
    let mean = sum / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let var: f64 = a
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / (n as f64 - 1.0);
    (mean, var.sqrt())
}

/// Global maximum over every element of `a`, or `f32::NEG_INFINITY` for an
/// empty matrix.
pub fn global_max(a: ArrayView2<f32>) -> f32 {
    a.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

/// Global minimum over every element of `a`, or `f32::INFINITY` for an
/// empty matrix.
pub fn global_min(a: ArrayView2<f32>) -> f32 {
    a.iter().copied().fold(f32::INFINITY, f32::min)
}

/// Relative-maxima mask along axis 0 (time): for each column, row `r`
/// qualifies iff `a[r][c] > a[r-k][c]` and `a[r][c] > a[r+k][c]` for every
/// `k` in `1..=order`, with out-of-range neighbours simply omitted from the
/// comparison (edges are clipped, not padded). Plateaus (equal neighbours)
/// do not qualify, matching the strict `>` comparison in spec.md §4.3.3.
pub fn arg_rel_max(a: ArrayView2<f32>, order: usize) -> Array2<bool> {
    let (rows, cols) = a.dim();
    let mut mask = Array2::from_elem((rows, cols), false);
    for c in 0..cols {
        for r in 0..rows {
            let v = a[[r, c]];
            let mut is_peak = true;
            for k in 1..=order {
                if r >= k && a[[r - k, c]] >= v {
                    is_peak = false;
                    break;
                }
                if r + k < rows && a[[r + k, c]] >= v {
                    is_peak = false;
                    break;
                }
            }
            mask[[r, c]] = is_peak;
        }
    }
    mask
}

/// Unnormalized Gaussian window of length `m`, centred at `(m-1)/2`, with
/// the given standard deviation: `exp(-0.5 * ((n - (m-1)/2) / std)^2)`.
pub fn gaussian(m: usize, std: f64) -> Array1<f64> {
    let center = (m as f64 - 1.0) / 2.0;
    Array1::from_iter((0..m).map(|n| {
        let z = (n as f64 - center) / std;
        (-0.5 * z * z).exp()
    }))
}

/// `12 * (log2(hz) - log2(440)) + 69`.
pub fn hz_to_midi(hz: f64) -> f64 {
    12.0 * ((hz.log2()) - 440f64.log2()) + 69.0
}

/// Inverse of [`hz_to_midi`].
pub fn midi_to_hz(midi: f64) -> f64 {
    440.0 * 2f64.powf((midi - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn arg_max_empty_is_none() {
        let empty = Array1::<f32>::zeros(0);
        assert_eq!(arg_max(empty.view()), None);
    }

    #[test]
    fn arg_max_picks_lowest_index_on_tie() {
        let row = array![1.0f32, 2.0, -1.0];
        assert_eq!(arg_max(row.view()), Some(1));
        let tied = array![1.0f32, 2.0, 2.0];
        assert_eq!(arg_max(tied.view()), Some(1));
    }

    #[test]
    fn arg_max_axis1_matches_spec_example() {
        let a = array![[10.0f32, 11.0, 12.0], [13.0, 14.0, 15.0]];
        assert_eq!(arg_max_axis1(a.view()), vec![2, 2]);
    }

    #[test]
    fn where_greater_than_matches_spec_example() {
        let a = array![[1.0f32, 2.0], [3.0, 4.0]];
        let (rows, cols) = where_greater_than(a.view(), 1.0);
        assert_eq!(rows, vec![0, 1, 1]);
        assert_eq!(cols, vec![1, 0, 1]);
    }

    #[test]
    fn mean_std_dev_on_large_normal_sample() {
        // Deterministic Box-Muller sample with mean 2, std 2.
        let mut values = Vec::with_capacity(1_000_000);
        let mut seed = 12345u64;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((seed >> 33) as f64) / (u32::MAX as f64)
        };
        for _ in 0..500_000 {
            let u1 = next().max(1e-12);
            let u2 = next();
            let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
            let z1 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).sin();
            values.push((2.0 + 2.0 * z0) as f32);
            values.push((2.0 + 2.0 * z1) as f32);
        }
        let a = Array2::from_shape_vec((1000, 1000), values).unwrap();
        let (mean, std) = mean_std_dev(a.view());
        assert!((mean - 2.0).abs() < 0.05, "mean={mean}");
        assert!((std - 2.0).abs() < 0.05, "std={std}");
    }

    #[test]
    fn global_max_matches_spec_example() {
        let a = array![[1.0f32, 100.0, 3.0], [4.0, 5.0, 6.0]];
        assert_eq!(global_max(a.view()), 100.0);
    }

    #[test]
    fn arg_rel_max_single_peak() {
        let a = array![
            [0.0f32, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [0.9, 0.9],
            [0.1, 0.1],
        ];
        let mask = arg_rel_max(a.view(), 1);
        let peaks: Vec<(usize, usize)> = mask
            .indexed_iter()
            .filter(|(_, &v)| v)
            .map(|(idx, _)| idx)
            .collect();
        assert_eq!(peaks, vec![(3, 0), (3, 1)]);
    }

    #[test]
    fn arg_rel_max_rejects_plateaus() {
        let a = array![[0.0f32], [1.0], [1.0], [0.0]];
        let mask = arg_rel_max(a.view(), 1);
        assert!(mask.iter().all(|&v| !v));
    }

    #[test]
    fn gaussian_matches_spec_example() {
        let g = gaussian(10, 4.0);
        let expected = [
            0.53109599, 0.68194075, 0.82257756, 0.93210249, 0.99221794, 0.99221794, 0.93210249,
            0.82257756, 0.68194075, 0.53109599,
        ];
        for (got, want) in g.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-4);
        }
    }

    #[test]
    fn hz_midi_roundtrip() {
        assert_abs_diff_eq!(hz_to_midi(440.0), 69.0, epsilon = 1e-9);
        assert_abs_diff_eq!(midi_to_hz(69.0), 440.0, epsilon = 1e-9);
        for midi in 21..=108 {
            let hz = midi_to_hz(midi as f64);
            assert_abs_diff_eq!(hz_to_midi(hz), midi as f64, epsilon = 1e-9);
        }
    }
}
