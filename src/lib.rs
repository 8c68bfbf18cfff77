// Differentiable top-k membership scores over the last axis of a batched array.
//
// `soft_topk(x, k)` returns, for every row of `x`, a score in [0, 1] per
// element approximating "is this element among the k largest of its row",
// with the scores summing to k. The relaxation is smooth almost everywhere,
// so the transform stays usable inside gradient-based optimization where a
// hard top-k mask would have zero gradient.

pub mod ops;

pub use ops::softtopk::{soft_topk, soft_topk_f64};
