//! Deterministic float ordering for sorting.

use core::cmp::Ordering;

/// Canonicalize a floating-point value for deterministic ordering.
///
/// `-0.0` becomes `0.0` and every NaN becomes the canonical NaN.
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Total ordering for floats that never panics and treats `-0.0 == 0.0`.
///
/// `atan2` returns `-0.0` or `0.0` for points on the +x axis depending on the
/// sign of a tiny y offset; both must sort as the same angle.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}
