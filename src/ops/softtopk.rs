// This file implements the soft top-k operator: a differentiable relaxation
// of "select the k largest elements" over the last axis of a batched array.
// The per-row threshold is found in closed form per sorted position and the
// bracketing position is selected, so the whole routine stays expressible as
// sort + cumulative scan + elementwise work (no per-row iterative solver).

use ndarray::{Array, Axis, Dimension};

use super::lse::{cumlogsumexp, cumlogsumexp_rev};

/// Soft top-k membership scores, f32 surface.
///
/// Returns an array of the same shape as `x` where each entry is a score in
/// [0, 1] approximating membership of that element in the k largest of its
/// row (the last axis). Scores within a row sum to `k` and are monotone in
/// the element values; an element exactly at the row threshold scores 0.5.
///
/// `k` may be fractional and is clamped into `[0, N]` where `N` is the last
/// axis length. The interior `0 < k < N` yields an exact soft count; at
/// `k = N`, or on rows so heavily tied that no sorted interval contains the
/// threshold, the solve falls back to the lowest-position candidate and only
/// the [0, 1] range bound holds.
///
/// Accumulation runs in f64 internally and the result is cast back, so the
/// output dtype matches the input dtype.
///
/// # Panics
///
/// Panics if `x` has no axes or its last axis is empty.
pub fn soft_topk<D: Dimension>(x: &Array<f32, D>, k: f32) -> Array<f32, D> {
    let wide = x.mapv(f64::from);
    soft_topk_f64(&wide, f64::from(k)).mapv(|v| v as f32)
}

/// Soft top-k membership scores, f64 core.
///
/// See [`soft_topk`] for the contract.
pub fn soft_topk_f64<D: Dimension>(x: &Array<f64, D>, k: f64) -> Array<f64, D> {
    assert!(x.ndim() >= 1, "soft_topk: input must have at least one axis");
    let axis = Axis(x.ndim() - 1);
    let n = x.len_of(axis);
    assert!(n >= 1, "soft_topk: last axis must be non-empty");

    let k = k.clamp(0.0, n as f64);
    let mut p = x.clone();
    let mut row = vec![0.0f64; n];
    let mut scores = vec![0.0f64; n];
    for mut lane in p.lanes_mut(axis) {
        for (r, &v) in row.iter_mut().zip(lane.iter()) {
            *r = v;
        }
        soft_topk_lane(&row, k, &mut scores);
        for (dst, &s) in lane.iter_mut().zip(scores.iter()) {
            *dst = s;
        }
    }
    p
}

/// One row: solve for the threshold, then score every element in its
/// original position.
fn soft_topk_lane(row: &[f64], k: f64, out: &mut [f64]) {
    let mut x_sort = row.to_vec();
    x_sort.sort_unstable_by(|a, b| a.total_cmp(b));
    let lamb = row_threshold(&x_sort, k);
    for (o, &v) in out.iter_mut().zip(row.iter()) {
        let d = v - lamb;
        // Laplace-shaped soft step: 0.5 at the threshold, -> {0, 1} as the
        // distance grows, smooth in between.
        *o = 0.5 + 0.5 * d.signum() * (1.0 - (-d.abs()).exp());
    }
}

/// Closed-form threshold for an ascending-sorted row.
///
/// For each sorted position i, solving "soft count of elements above lambda
/// equals k, assuming lambda lands between x_sort[i] and x_sort[i+1]" is a
/// quadratic in exp(lambda); its positive root, taken in log space, is the
/// candidate. Exactly one position brackets its own candidate for interior
/// k; that candidate is the threshold. With ties the first match wins, and
/// with no match (k at the top of its range) the position-0 candidate is
/// the fallback.
fn row_threshold(x_sort: &[f64], k: f64) -> f64 {
    let n = x_sort.len();
    let lse1 = cumlogsumexp(x_sort);
    let neg: Vec<f64> = x_sort.iter().map(|&v| -v).collect();
    let mut lse2 = cumlogsumexp_rev(&neg);
    // Shift so lse2[i] aggregates strictly after position i; nothing follows
    // the maximum.
    lse2.rotate_left(1);
    lse2[n - 1] = f64::NEG_INFINITY;

    let mut fallback = f64::NAN;
    for i in 0..n {
        // Slots k must fill from position i upward if the cut lands here.
        let km = k - (n - 1 - i) as f64;
        let cand = lse1[i] - ((km * km + (lse1[i] + lse2[i]).exp()).sqrt() + km).ln();
        let next = if i + 1 < n { x_sort[i + 1] } else { f64::INFINITY };
        if cand >= x_sort[i] && cand <= next {
            return cand;
        }
        if i == 0 {
            fallback = cand;
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    fn row_sum(p: &Array1<f64>) -> f64 {
        p.sum()
    }

    #[test]
    fn well_separated_row_splits_cleanly() {
        let x: Array1<f64> = array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let p = soft_topk_f64(&x, 3.0);
        // The three largest head toward 1, the rest toward 0; the elements
        // straddling the threshold carry the transition (~0.3 / ~0.7).
        for i in 0..5 {
            assert!(p[i] < 0.5, "p[{}] = {}", i, p[i]);
        }
        for i in 5..8 {
            assert!(p[i] > 0.5, "p[{}] = {}", i, p[i]);
        }
        assert!(p[0] < 0.01 && p[7] > 0.95);
        let bottom: f64 = (0..5).map(|i| p[i]).sum();
        let top: f64 = (5..8).map(|i| p[i]).sum();
        assert!(bottom < 0.5 && top > 2.5);
        assert!((row_sum(&p) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn symmetric_pair_splits_the_unit() {
        let x: Array1<f64> = array![-2.0, 2.0];
        let p = soft_topk_f64(&x, 1.0);
        // Threshold sits at 0 by symmetry, so the scores mirror around 0.5.
        assert!((p[0] + p[1] - 1.0).abs() < 1e-12);
        assert!(p[1] > 0.5 && p[0] < 0.5);
    }

    #[test]
    fn element_at_threshold_scores_half() {
        // For [-1, 0, 1] and k = 1.5 the threshold is exactly 0.
        let x: Array1<f64> = array![-1.0, 0.0, 1.0];
        let p = soft_topk_f64(&x, 1.5);
        assert!((p[1] - 0.5).abs() < 1e-9, "p at threshold = {}", p[1]);
        assert!((row_sum(&p) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn fractional_k_conserves_mass() {
        let x: Array1<f64> = array![0.3, -1.1, 2.4, 0.9, -0.2, 1.7];
        let p = soft_topk_f64(&x, 2.5);
        assert!((row_sum(&p) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn k_zero_scores_everything_out() {
        let x: Array1<f64> = array![1.0, -3.0, 0.5];
        let p = soft_topk_f64(&x, 0.0);
        for &v in p.iter() {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn k_is_clamped_into_range() {
        let x: Array1<f64> = array![1.0, -3.0, 0.5];
        assert_eq!(soft_topk_f64(&x, -4.0), soft_topk_f64(&x, 0.0));
        assert_eq!(soft_topk_f64(&x, 99.0), soft_topk_f64(&x, 3.0));
    }

    #[test]
    fn k_equals_n_falls_back_in_range() {
        // No sorted interval brackets the threshold at k = N; documented
        // behavior is the position-0 fallback, everything above 0.5.
        let x: Array1<f64> = array![0.0, 1.0, 2.0];
        let p = soft_topk_f64(&x, 3.0);
        for &v in p.iter() {
            assert!(v >= 0.5 && v <= 1.0, "score {}", v);
        }
    }

    #[test]
    fn single_element_row() {
        let x: Array1<f64> = array![4.2];
        let p = soft_topk_f64(&x, 0.5);
        assert!((p[0] - 0.5).abs() < 1e-12);
        let p = soft_topk_f64(&x, 0.0);
        assert_eq!(p[0], 0.0);
    }

    #[test]
    fn large_magnitudes_stay_finite() {
        // Non-bracketing candidates may overflow exp(lse1 + lse2) to inf,
        // which rejects them; the bracketing candidate's exponent is bounded
        // by the local gap, so the threshold itself stays stable.
        let x: Array1<f64> = array![-500.0, -200.0, 150.0, 500.0];
        let p = soft_topk_f64(&x, 2.0);
        assert!(p.iter().all(|v| v.is_finite()));
        assert!((row_sum(&p) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn nan_poisons_the_row() {
        let x: Array1<f64> = array![0.0, f64::NAN, 1.0];
        let p = soft_topk_f64(&x, 1.0);
        assert!(p.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn tied_row_stays_in_range() {
        let x: Array1<f64> = array![1.0, 1.0, 1.0, 1.0];
        let p = soft_topk_f64(&x, 2.0);
        for &v in p.iter() {
            assert!((0.0..=1.0).contains(&v));
        }
        // All-equal elements must score equally.
        for &v in p.iter() {
            assert_eq!(v, p[0]);
        }
    }
}
