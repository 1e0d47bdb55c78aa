//! Whitespace-separated text format.
//!
//! ```text
//! <threshold>
//! <picture count>
//! <id> <N> <N*N values> ...
//! <object count>
//! <id> <n> <n*n values> ...
//! ```
//!
//! Line breaks carry no meaning; any whitespace separates tokens.

use crate::dataset::{Dataset, Object, Picture};
use crate::image::SquareImage;
use crate::util::{PicMatchError, PicMatchResult};
use std::str::{FromStr, SplitWhitespace};

/// Parses a complete dataset from text.
pub fn parse_dataset(text: &str) -> PicMatchResult<Dataset> {
    let mut tokens = Tokens::new(text);
    let threshold: f64 = tokens.next_value("threshold")?;

    let picture_count = tokens.next_count("picture count")?;
    let mut pictures = Vec::with_capacity(tokens.bounded(picture_count));
    for _ in 0..picture_count {
        pictures.push(Picture::from(tokens.next_square("picture value")?));
    }

    let object_count = tokens.next_count("object count")?;
    let mut objects = Vec::with_capacity(tokens.bounded(object_count));
    for _ in 0..object_count {
        objects.push(Object::from(tokens.next_square("object value")?));
    }

    if let Some(extra) = tokens.inner.next() {
        return Err(PicMatchError::InvalidToken {
            expected: "end of input",
            index: tokens.index,
            token: extra.to_string(),
        });
    }

    Dataset::new(threshold, pictures, objects)
}

struct Tokens<'a> {
    inner: SplitWhitespace<'a>,
    index: usize,
    // Upper bound on the number of tokens in the text.
    max_tokens: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace(),
            index: 0,
            max_tokens: text.len().div_ceil(2),
        }
    }

    /// Caps a count read from the header by the tokens still unread, so a
    /// malformed count cannot drive an allocation.
    fn bounded(&self, count: usize) -> usize {
        count.min(self.max_tokens.saturating_sub(self.index))
    }

    fn next_value<T: FromStr>(&mut self, expected: &'static str) -> PicMatchResult<T> {
        let token = self
            .inner
            .next()
            .ok_or(PicMatchError::MissingToken { expected })?;
        let index = self.index;
        self.index += 1;
        token.parse().map_err(|_| PicMatchError::InvalidToken {
            expected,
            index,
            token: token.to_string(),
        })
    }

    fn next_count(&mut self, expected: &'static str) -> PicMatchResult<usize> {
        let index = self.index;
        let count: i64 = self.next_value(expected)?;
        usize::try_from(count).map_err(|_| PicMatchError::InvalidToken {
            expected,
            index,
            token: count.to_string(),
        })
    }

    fn next_square(&mut self, value_label: &'static str) -> PicMatchResult<SquareImage> {
        let id: i32 = self.next_value("id")?;
        let size = self.next_count("size")?;
        let len = size
            .checked_mul(size)
            .ok_or(PicMatchError::InvalidDimensions {
                width: size,
                height: size,
            })?;
        let mut data = Vec::with_capacity(self.bounded(len));
        for _ in 0..len {
            data.push(self.next_value::<i32>(value_label)?);
        }
        SquareImage::new(id, size, data)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_dataset;
    use crate::util::PicMatchError;

    const SAMPLE: &str = "0.1\n2\n1 2\n1 2\n3 4\n7 1\n5\n1\n9 1\n5\n";

    #[test]
    fn parses_pictures_and_objects_in_order() {
        let dataset = parse_dataset(SAMPLE).unwrap();
        assert!((dataset.threshold() - 0.1).abs() < 1e-12);
        assert_eq!(dataset.pictures().len(), 2);
        assert_eq!(dataset.pictures()[0].id(), 1);
        assert_eq!(dataset.pictures()[0].data(), &[1, 2, 3, 4]);
        assert_eq!(dataset.pictures()[1].id(), 7);
        assert_eq!(dataset.objects().len(), 1);
        assert_eq!(dataset.objects()[0].id(), 9);
        assert_eq!(dataset.objects()[0].size(), 1);
    }

    #[test]
    fn reports_truncated_matrix() {
        let err = parse_dataset("0.1 1 1 2 1 2 3").unwrap_err();
        assert_eq!(
            err,
            PicMatchError::MissingToken {
                expected: "picture value"
            }
        );
    }

    #[test]
    fn oversized_counts_report_missing_values() {
        let err = parse_dataset("0.5 1 1 3000000000").unwrap_err();
        assert!(matches!(err, PicMatchError::MissingToken { .. }));

        let err = parse_dataset("0.5 9223372036854775807").unwrap_err();
        assert_eq!(err, PicMatchError::MissingToken { expected: "id" });

        let err = parse_dataset("0.5 0 4611686018427387904").unwrap_err();
        assert_eq!(err, PicMatchError::MissingToken { expected: "id" });
    }

    #[test]
    fn rejects_malformed_threshold_and_counts() {
        let err = parse_dataset("abc").unwrap_err();
        assert!(matches!(
            err,
            PicMatchError::InvalidToken {
                expected: "threshold",
                index: 0,
                ..
            }
        ));

        let err = parse_dataset("0.5 -1").unwrap_err();
        assert!(matches!(
            err,
            PicMatchError::InvalidToken {
                expected: "picture count",
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_sized_grid() {
        let err = parse_dataset("0.5 1 3 0 0").unwrap_err();
        assert_eq!(
            err,
            PicMatchError::InvalidDimensions {
                width: 0,
                height: 0
            }
        );
    }

    #[test]
    fn rejects_trailing_tokens() {
        let err = parse_dataset("0.5 0 0 42").unwrap_err();
        assert!(matches!(
            err,
            PicMatchError::InvalidToken {
                expected: "end of input",
                ..
            }
        ));
    }
}
