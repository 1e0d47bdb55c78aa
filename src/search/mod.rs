//! Search engines and per-picture orchestration.
//!
//! `scan` holds the sequential row scan shared by every CPU path, `rows`
//! runs one cooperating task per candidate row, and `matcher` walks a
//! picture's objects in input order, preferring the accelerator.

pub mod matcher;
pub mod rows;
pub mod scan;

use std::fmt;

/// Top-left offset of a candidate window: `i` is the row, `j` the column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    pub i: usize,
    pub j: usize,
}

/// A successful match of one object inside a picture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Found {
    pub object_id: i32,
    pub position: Position,
}

/// Final outcome of one picture's search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchResult {
    picture_id: i32,
    found: Option<Found>,
}

impl MatchResult {
    /// Records that `object_id` matched at `position`.
    pub fn found(picture_id: i32, object_id: i32, position: Position) -> Self {
        Self {
            picture_id,
            found: Some(Found {
                object_id,
                position,
            }),
        }
    }

    /// Records that no object matched.
    pub fn not_found(picture_id: i32) -> Self {
        Self {
            picture_id,
            found: None,
        }
    }

    /// Returns the picture this result belongs to.
    pub fn picture_id(&self) -> i32 {
        self.picture_id
    }

    /// Returns the match, if any.
    pub fn matched(&self) -> Option<Found> {
        self.found
    }

    /// Returns true when an object was found.
    pub fn is_found(&self) -> bool {
        self.found.is_some()
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.found {
            Some(found) => write!(
                f,
                "Picture {} found Object {} in Position({},{})",
                self.picture_id, found.object_id, found.position.i, found.position.j
            ),
            None => write!(f, "Picture {} No Objects were found", self.picture_id),
        }
    }
}

/// Whether the accelerator may be used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AcceleratorMode {
    /// Use the accelerator when the process-wide probe found one.
    #[default]
    Auto,
    /// Always use the CPU row search.
    Disabled,
}

/// Per-worker matching configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchConfig {
    /// Accelerator policy.
    pub accelerator: AcceleratorMode,
    /// Row-task threads per worker; `0` lets rayon decide.
    pub threads: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            accelerator: AcceleratorMode::Auto,
            threads: 0,
        }
    }
}
