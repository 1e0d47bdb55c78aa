//! Relative-difference score kernels.
//!
//! The score of an object placed at `(i, j)` inside a picture is
//!
//! ```text
//! sum over r, c < n of | (P[i + r][j + c] - O[r][c]) / P[i + r][j + c] |
//! ```
//!
//! Every term is non-negative, so partial sums never decrease. Kernels use
//! this to abandon a window as soon as its partial sum reaches the limit.
//! Picture values are divisors and are assumed non-zero.

use crate::dataset::{Object, Picture};
use crate::ImageView;

/// Kernel trait for evaluating one candidate window.
///
/// Callers guarantee `i + n <= picture.height()` and `j + n <= picture.width()`
/// where `n` is the object side.
pub trait ScoreKernel {
    /// Computes the complete score at a placement (top-left coordinates).
    fn score_at(picture: ImageView<'_, i32>, object: ImageView<'_, i32>, i: usize, j: usize)
        -> f64;

    /// Computes the score if it stays below `limit`.
    ///
    /// Returns `None` as soon as the partial sum reaches `limit`.
    fn score_below(
        picture: ImageView<'_, i32>,
        object: ImageView<'_, i32>,
        i: usize,
        j: usize,
        limit: f64,
    ) -> Option<f64>;
}

pub mod scalar;

#[cfg(feature = "simd")]
pub mod simd;

/// Kernel used by the search engines.
#[cfg(not(feature = "simd"))]
pub type DefaultKernel = scalar::ScalarKernel;
#[cfg(feature = "simd")]
pub type DefaultKernel = simd::SimdKernel;

/// Scores `object` placed at row `i`, column `j` of `picture`.
///
/// Returns `None` when the object does not fit at that offset.
pub fn score(picture: &Picture, object: &Object, i: usize, j: usize) -> Option<f64> {
    let span = picture.span_for(object.size())?;
    if i >= span || j >= span {
        return None;
    }
    Some(<DefaultKernel as ScoreKernel>::score_at(
        picture.view(),
        object.view(),
        i,
        j,
    ))
}

#[inline]
pub(crate) fn relative_diff(pv: i32, ov: i32) -> f64 {
    let pv = f64::from(pv);
    ((pv - f64::from(ov)) / pv).abs()
}
