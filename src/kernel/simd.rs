//! SIMD-accelerated kernel using the `wide` crate.
//!
//! The relative-difference terms of each window row are computed four at a
//! time using `f64x4`. Terms are then added to the running sum in column
//! order, so scores are bit-identical to [`ScalarKernel`] and to the device
//! kernel, and all paths agree on which windows fall below a threshold.
//!
//! [`ScalarKernel`]: crate::kernel::scalar::ScalarKernel

use crate::kernel::{relative_diff, ScoreKernel};
use crate::ImageView;
use wide::f64x4;

const LANES: usize = 4;

/// Load 4 i32 values and convert to f64x4.
#[inline]
fn load_i32x4_as_f64x4(slice: &[i32]) -> f64x4 {
    f64x4::from([
        f64::from(slice[0]),
        f64::from(slice[1]),
        f64::from(slice[2]),
        f64::from(slice[3]),
    ])
}

/// SIMD relative-difference kernel.
pub struct SimdKernel;

impl SimdKernel {
    #[inline]
    fn accumulate_row(mut sum: f64, picture_row: &[i32], object_row: &[i32]) -> f64 {
        let n = object_row.len();
        let simd_end = n / LANES * LANES;

        let mut c = 0;
        while c < simd_end {
            let pv = load_i32x4_as_f64x4(&picture_row[c..]);
            let ov = load_i32x4_as_f64x4(&object_row[c..]);
            for term in ((pv - ov) / pv).abs().to_array() {
                sum += term;
            }
            c += LANES;
        }

        while c < n {
            sum += relative_diff(picture_row[c], object_row[c]);
            c += 1;
        }
        sum
    }
}

impl ScoreKernel for SimdKernel {
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
