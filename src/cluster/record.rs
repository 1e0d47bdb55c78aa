//! Fixed-size wire form of a picture result.

use crate::search::{MatchResult, Position};
use crate::util::{PicMatchError, PicMatchResult};

/// Number of `i32` words in a [`ResultRecord`].
pub const RECORD_WORDS: usize = 5;

/// `[picture_id, found, object_id, i, j]`, with `-1` for absent fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResultRecord([i32; RECORD_WORDS]);

impl ResultRecord {
    /// Wraps raw words received from another worker.
    pub fn from_words(words: [i32; RECORD_WORDS]) -> Self {
        Self(words)
    }

    /// Returns the raw words.
    pub fn words(&self) -> [i32; RECORD_WORDS] {
        self.0
    }
}

impl TryFrom<&MatchResult> for ResultRecord {
    type Error = PicMatchError;

    fn try_from(result: &MatchResult) -> PicMatchResult<Self> {
        let words = match result.matched() {
            Some(found) => {
                let to_word = |v: usize| {
                    i32::try_from(v)
                        .map_err(|_| PicMatchError::InvalidInput("position exceeds record range"))
                };
                [
                    result.picture_id(),
                    1,
                    found.object_id,
                    to_word(found.position.i)?,
                    to_word(found.position.j)?,
                ]
            }
            None => [result.picture_id(), 0, -1, -1, -1],
        };
        Ok(Self(words))
    }
}

impl TryFrom<ResultRecord> for MatchResult {
    type Error = PicMatchError;

    fn try_from(record: ResultRecord) -> PicMatchResult<Self> {
        let [picture_id, found, object_id, i, j] = record.0;
        match found {
            0 => Ok(MatchResult::not_found(picture_id)),
            1 => {
                let to_index = |v: i32| {
                    usize::try_from(v).map_err(|_| PicMatchError::Distribution {
                        reason: format!("negative position in record for picture {picture_id}"),
                    })
                };
                let position = Position {
                    i: to_index(i)?,
                    j: to_index(j)?,
                };
                Ok(MatchResult::found(picture_id, object_id, position))
            }
            other => Err(PicMatchError::Distribution {
                reason: format!("invalid found flag {other} for picture {picture_id}"),
            }),
        }
    }
}
