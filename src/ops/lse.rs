// This file implements the cumulative log-sum-exp primitives used by the
// soft top-k threshold solve. Both directions are running, max-subtracted
// accumulations; the naive log(sum(exp(..))) over a growing sum overflows
// for large-magnitude inputs and is never used.

use std::f64::consts::LN_2;

/// Stable log(exp(a) + exp(b)).
///
/// Exact at the identities: both operands `-inf` stay `-inf`, equal
/// infinite operands stay infinite. NaN propagates.
pub fn logaddexp(a: f64, b: f64) -> f64 {
    if a == b {
        // Covers the +-inf == +-inf cases, where hi - lo would be NaN.
        return a + LN_2;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    if hi == f64::NEG_INFINITY {
        f64::NEG_INFINITY
    } else {
        hi + (lo - hi).exp().ln_1p()
    }
}

/// Forward cumulative log-sum-exp: `out[i] = log(sum_{j<=i} exp(x[j]))`.
pub fn cumlogsumexp(x: &[f64]) -> Vec<f64> {
    let mut acc = f64::NEG_INFINITY;
    x.iter()
        .map(|&v| {
            acc = logaddexp(acc, v);
            acc
        })
        .collect()
}

/// Reverse cumulative log-sum-exp: `out[i] = log(sum_{j>=i} exp(x[j]))`.
pub fn cumlogsumexp_rev(x: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NEG_INFINITY; x.len()];
    let mut acc = f64::NEG_INFINITY;
    for (o, &v) in out.iter_mut().rev().zip(x.iter().rev()) {
        acc = logaddexp(acc, v);
        *o = acc;
    }
    out
}
