//! Row-parallel search with cooperative early stop.
//!
//! Each candidate row is scanned by its own rayon task. Tasks share one
//! `found` flag: a task checks it before every column and the first task to
//! see a score below the threshold claims it with a single compare-and-set.
//! Only the winner stores its coordinates. The parallel iterator joins all
//! row tasks before the winner is read, so nothing is written after return.
//!
//! Rows race, so the reported position is the first one discovered, not
//! necessarily the lexicographically smallest.

use crate::dataset::{Object, Picture};
use crate::kernel::{DefaultKernel, ScoreKernel};
use crate::search::scan::scan_row;
use crate::search::Position;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Searches `picture` for `object` on the current rayon pool.
///
/// Returns a position whose score is below `threshold`, or `None`. Objects
/// larger than the picture are skipped without search.
pub fn tasked_row_search(picture: &Picture, object: &Object, threshold: f64) -> Option<Position> {
    tasked_row_search_with::<DefaultKernel>(picture, object, threshold)
}

pub(crate) fn tasked_row_search_with<K: ScoreKernel>(
    picture: &Picture,
    object: &Object,
    threshold: f64,
) -> Option<Position> {
    let span = picture.span_for(object.size())?;
    let pic = picture.view();
    let obj = object.view();

    let found = AtomicBool::new(false);
    let winner = AtomicUsize::new(usize::MAX);

    (0..span).into_par_iter().for_each(|i| {
        if found.load(Ordering::Relaxed) {
            return;
        }
        let hit = scan_row::<K>(pic, obj, i, span, threshold, || {
            found.load(Ordering::Relaxed)
        });
        if let Some(j) = hit {
            if found
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                winner.store(i * span + j, Ordering::Relaxed);
            }
        }
    });

    if !found.load(Ordering::SeqCst) {
        return None;
    }
    let packed = winner.load(Ordering::SeqCst);
    Some(Position {
        i: packed / span,
        j: packed % span,
    })
}
