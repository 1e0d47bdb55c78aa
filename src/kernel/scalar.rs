//! Scalar reference kernel.

use crate::kernel::{relative_diff, ScoreKernel};
use crate::ImageView;

/// Scalar kernel; accumulates terms in row-major order.
pub struct ScalarKernel;

impl ScalarKernel {
    #[inline]
    fn accumulate_row(sum: f64, picture_row: &[i32], object_row: &[i32]) -> f64 {
        picture_row
            .iter()
            .zip(object_row)
            .fold(sum, |acc, (&pv, &ov)| acc + relative_diff(pv, ov))
    }
}

impl ScoreKernel for ScalarKernel {
    fn score_at(
        picture: ImageView<'_, i32>,
        object: ImageView<'_, i32>,
        i: usize,
        j: usize,
    ) -> f64 {
        let n = object.width();
        let pic = picture.as_slice();
        let stride = picture.stride();
        let mut sum = 0.0f64;
        for r in 0..n {
            let start = (i + r) * stride + j;
            let Some(obj_row) = object.row(r) else {
                break;
            };
            sum = Self::accumulate_row(sum, &pic[start..start + n], obj_row);
        }
        sum
    }

    fn score_below(
        picture: ImageView<'_, i32>,
        object: ImageView<'_, i32>,
        i: usize,
        j: usize,
        limit: f64,
    ) -> Option<f64> {
        let n = object.width();
        let pic = picture.as_slice();
        let stride = picture.stride();
        let mut sum = 0.0f64;
        for r in 0..n {
            let start = (i + r) * stride + j;
            let obj_row = object.row(r)?;
            sum = Self::accumulate_row(sum, &pic[start..start + n], obj_row);
            if sum >= limit {
                return None;
            }
        }
        Some(sum)
    }
}
