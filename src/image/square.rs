//! Owned square intensity grids.

use crate::image::ImageView;
use crate::util::{PicMatchError, PicMatchResult};

/// Owned, contiguous `size`x`size` grid of intensities with an identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SquareImage {
    id: i32,
    size: usize,
    data: Vec<i32>,
}

impl SquareImage {
    /// Creates a grid from row-major data holding exactly `size * size` values.
    pub fn new(id: i32, size: usize, data: Vec<i32>) -> PicMatchResult<Self> {
        if size == 0 {
            return Err(PicMatchError::InvalidDimensions {
                width: size,
                height: size,
            });
        }
        let needed = size
            .checked_mul(size)
            .ok_or(PicMatchError::InvalidDimensions {
                width: size,
                height: size,
            })?;
        if data.len() != needed {
            return Err(PicMatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self { id, size, data })
    }

    /// Returns the identifier from the dataset.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Returns the side length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the row-major values.
    pub fn data(&self) -> &[i32] {
        &self.data
    }

    /// Returns a borrowed view of the grid.
    pub fn view(&self) -> ImageView<'_, i32> {
        ImageView {
            data: &self.data,
            width: self.size,
            height: self.size,
            stride: self.size,
        }
    }
}
