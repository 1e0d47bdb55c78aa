//! picmatch finds which template objects appear in large grayscale pictures.
//!
//! For every picture the objects are tried in input order; the first window
//! whose relative-difference score falls below the threshold ends that
//! picture's search. Work runs on three levels: pictures are striped across
//! independent workers ([`cluster`]), each object search fans out over
//! candidate rows on a rayon pool ([`search::rows`]), and when an
//! accelerator is present every candidate position is evaluated at once
//! with object uploads double-buffered against computation ([`accel`]).

pub mod accel;
pub mod cluster;
pub mod dataset;
pub mod image;
pub mod kernel;
pub mod search;
mod trace;
pub mod util;

pub use accel::{probe, Accelerator, AcceleratorSession, EmulatedDevice};
pub use cluster::{Collective, DistributeConfig, WorkDistributor};
pub use dataset::{parse_dataset, Dataset, Object, Picture};
pub use image::{ImageView, SquareImage};
pub use kernel::{score, ScoreKernel};
pub use search::matcher::PictureMatcher;
pub use search::rows::tasked_row_search;
pub use search::scan::scan_first;
pub use search::{AcceleratorMode, Found, MatchConfig, MatchResult, Position};
pub use util::{PicMatchError, PicMatchResult};
