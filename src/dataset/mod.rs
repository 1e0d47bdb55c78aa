//! Pictures, objects and the validated dataset handed to the search engine.
//!
//! A dataset is built once (usually by [`parse_dataset`]) and stays
//! read-only for the rest of the run. Input order of both pictures and
//! objects is preserved: objects are tried in that order and results are
//! reported in picture order.

use crate::image::SquareImage;
use crate::util::{PicMatchError, PicMatchResult};
use std::collections::HashSet;
use std::ops::Deref;

mod parse;

pub use parse::parse_dataset;

/// Large grid searched for objects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Picture(SquareImage);

/// Template grid searched for inside pictures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Object(SquareImage);

impl Picture {
    /// Creates a picture from row-major data holding `size * size` values.
    pub fn new(id: i32, size: usize, data: Vec<i32>) -> PicMatchResult<Self> {
        SquareImage::new(id, size, data).map(Self)
    }

    /// Returns the number of candidate offsets per axis for a template of
    /// side `n`, or `None` when the template does not fit.
    pub fn span_for(&self, n: usize) -> Option<usize> {
        if n == 0 || n > self.size() {
            return None;
        }
        Some(self.size() - n + 1)
    }
}

impl Object {
    /// Creates an object from row-major data holding `size * size` values.
    pub fn new(id: i32, size: usize, data: Vec<i32>) -> PicMatchResult<Self> {
        SquareImage::new(id, size, data).map(Self)
    }

    /// Returns true when the object fits inside `picture`.
    pub fn fits_in(&self, picture: &Picture) -> bool {
        self.size() <= picture.size()
    }
}

impl Deref for Picture {
    type Target = SquareImage;

    fn deref(&self) -> &SquareImage {
        &self.0
    }
}

impl Deref for Object {
    type Target = SquareImage;

    fn deref(&self) -> &SquareImage {
        &self.0
    }
}

impl From<SquareImage> for Picture {
    fn from(image: SquareImage) -> Self {
        Self(image)
    }
}

impl From<SquareImage> for Object {
    fn from(image: SquareImage) -> Self {
        Self(image)
    }
}

/// Threshold plus the ordered pictures and objects of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    threshold: f64,
    pictures: Vec<Picture>,
    objects: Vec<Object>,
}

impl Dataset {
    /// Validates and assembles a dataset.
    ///
    /// The threshold must be finite and picture ids unique.
    pub fn new(threshold: f64, pictures: Vec<Picture>, objects: Vec<Object>) -> PicMatchResult<Self> {
        if !threshold.is_finite() {
            return Err(PicMatchError::InvalidInput("threshold must be finite"));
        }
        let mut seen = HashSet::with_capacity(pictures.len());
        for picture in &pictures {
            if !seen.insert(picture.id()) {
                return Err(PicMatchError::DuplicatePictureId { id: picture.id() });
            }
        }
        Ok(Self {
            threshold,
            pictures,
            objects,
        })
    }

    /// Returns the match threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Returns the pictures in input order.
    pub fn pictures(&self) -> &[Picture] {
        &self.pictures
    }

    /// Returns the objects in input order.
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }
}
