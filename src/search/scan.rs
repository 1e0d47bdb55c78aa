//! Sequential scans over candidate windows.

use crate::dataset::{Object, Picture};
use crate::kernel::{DefaultKernel, ScoreKernel};
use crate::search::Position;
use crate::ImageView;

/// Scans columns `0..span` of row `i` in increasing order.
///
/// `stop` is consulted before every column; the scan returns `None` as soon
/// as it reports true. Returns the first column whose score is below
/// `threshold`.
#[inline]
pub(crate) fn scan_row<K: ScoreKernel>(
    picture: ImageView<'_, i32>,
    object: ImageView<'_, i32>,
    i: usize,
    span: usize,
    threshold: f64,
    stop: impl Fn() -> bool,
) -> Option<usize> {
    for j in 0..span {
        if stop() {
            return None;
        }
        if K::score_below(picture, object, i, j, threshold).is_some() {
            return Some(j);
        }
    }
    None
}

/// Returns the lexicographically smallest position with a score below
/// `threshold`, scanning rows and columns in increasing order on the
/// calling thread.
///
/// Objects larger than the picture yield `None`.
pub fn scan_first(picture: &Picture, object: &Object, threshold: f64) -> Option<Position> {
    scan_first_with::<DefaultKernel>(picture, object, threshold)
}

pub(crate) fn scan_first_with<K: ScoreKernel>(
    picture: &Picture,
    object: &Object,
    threshold: f64,
) -> Option<Position> {
    let span = picture.span_for(object.size())?;
    let pic = picture.view();
    let obj = object.view();
    (0..span).find_map(|i| {
        scan_row::<K>(pic, obj, i, span, threshold, || false).map(|j| Position { i, j })
    })
}
