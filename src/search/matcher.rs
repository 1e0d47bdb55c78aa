//! Per-picture search over the ordered object sequence.

use crate::accel::{self, AccelOutcome, Accelerator, SystemAccelerator};
use crate::dataset::{Object, Picture};
use crate::search::rows::tasked_row_search;
use crate::search::{AcceleratorMode, MatchConfig, MatchResult};
use crate::trace::{trace_event, trace_span};
use crate::util::{PicMatchError, PicMatchResult};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Finds the first object (in input order) that appears in a picture.
///
/// The accelerator is tried first. When it is absent, disabled, or declines
/// part-way, the remaining objects are searched with the row-parallel CPU
/// engine on the matcher's own thread pool.
pub struct PictureMatcher<'d, A: Accelerator = SystemAccelerator> {
    accelerator: Option<&'d A>,
    pool: ThreadPool,
}

impl PictureMatcher<'static, SystemAccelerator> {
    /// Creates a matcher using the process-wide accelerator probe.
    pub fn new(cfg: &MatchConfig) -> PicMatchResult<Self> {
        let accelerator = match cfg.accelerator {
            AcceleratorMode::Auto => accel::probe(),
            AcceleratorMode::Disabled => None,
        };
        Self::with_accelerator(cfg, accelerator)
    }
}

impl<'d, A: Accelerator> PictureMatcher<'d, A> {
    /// Creates a matcher with an explicit accelerator.
    ///
    /// `AcceleratorMode::Disabled` in `cfg` discards `accelerator`.
    pub fn with_accelerator(cfg: &MatchConfig, accelerator: Option<&'d A>) -> PicMatchResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(cfg.threads)
            .thread_name(|idx| format!("picmatch-rows-{idx}"))
            .build()
            .map_err(|err| PicMatchError::ThreadPool {
                reason: err.to_string(),
            })?;
        let accelerator = match cfg.accelerator {
            AcceleratorMode::Auto => accelerator,
            AcceleratorMode::Disabled => None,
        };
        Ok(Self { accelerator, pool })
    }

    /// Returns true when searches are offered to an accelerator first.
    pub fn uses_accelerator(&self) -> bool {
        self.accelerator.is_some()
    }

    /// Searches `picture` for `objects` in order and stops at the first match.
    pub fn match_picture(
        &self,
        picture: &Picture,
        objects: &[Object],
        threshold: f64,
    ) -> MatchResult {
        let span = trace_span!("match_picture", picture = picture.id());
        self.pool.install(move || {
            let _span = span.entered();
            self.match_picture_inner(picture, objects, threshold)
        })
    }

    fn match_picture_inner(
        &self,
        picture: &Picture,
        objects: &[Object],
        threshold: f64,
    ) -> MatchResult {
        let mut resume_at = 0;
        if let Some(accelerator) = self.accelerator {
            match accel::search_picture(accelerator, picture, objects, threshold) {
                AccelOutcome::Found {
                    object_id,
                    position,
                } => return MatchResult::found(picture.id(), object_id, position),
                AccelOutcome::Exhausted => return MatchResult::not_found(picture.id()),
                AccelOutcome::Declined { resume_at: index } => resume_at = index,
            }
        }

        let remaining = objects.get(resume_at..).unwrap_or_default();
        for object in remaining.iter().filter(|object| object.fits_in(picture)) {
            if let Some(position) = tasked_row_search(picture, object, threshold) {
                trace_event!("row_search_match", object = object.id());
                return MatchResult::found(picture.id(), object.id(), position);
            }
        }
        MatchResult::not_found(picture.id())
    }
}
