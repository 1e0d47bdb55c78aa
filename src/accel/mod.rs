//! Accelerator offload with double-buffered object transfer.
//!
//! A device evaluates every candidate position of one object at once: one
//! execution unit per `(i, j)`, each computing a full score and racing for a
//! device-resident found flag with a compare-and-set. Objects are still
//! tried one at a time, but the upload of object `k + 1` runs on a transfer
//! channel while object `k` is evaluated on a compute channel.
//!
//! Two object slots alternate. Evaluation of `k` waits only on the transfer
//! that filled its slot. The slot is refilled with object `k + 2` only after
//! evaluation of `k` has completed. Objects larger than the picture never
//! get a slot.
//!
//! Device resources live in a per-picture [`AcceleratorSession`]; dropping
//! the session drains both channels and releases every buffer, whichever
//! way the search ends.

use crate::dataset::{Object, Picture};
use crate::search::Position;
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{PicMatchError, PicMatchResult};
use std::sync::{Once, OnceLock};

pub mod emulated;
#[cfg(feature = "opencl")]
pub mod opencl;

pub use emulated::{DeviceEvent, EmulatedDevice};

/// Number of alternating object slots per session.
pub const SLOTS: usize = 2;

/// A device able to open per-picture search sessions.
pub trait Accelerator: Sync {
    /// Resources held for one picture's search.
    type Session<'d>: AcceleratorSession
    where
        Self: 'd;

    /// Human-readable device name.
    fn name(&self) -> &str;

    /// Copies `picture` to the device and allocates [`SLOTS`] object slots of
    /// `slot_len` values each.
    fn open_session<'d>(
        &'d self,
        picture: &Picture,
        slot_len: usize,
    ) -> PicMatchResult<Self::Session<'d>>;
}

/// One picture's device resources.
pub trait AcceleratorSession {
    /// Completion handle for an asynchronous upload.
    type Transfer;

    /// Starts copying `object` into `slot` on the transfer channel and
    /// returns without waiting.
    fn upload(&mut self, slot: usize, object: &Object) -> PicMatchResult<Self::Transfer>;

    /// Waits for `ready`, evaluates every position of the `size`-sided object
    /// held in `slot` on the compute channel, and reads back the winner.
    fn evaluate(
        &mut self,
        slot: usize,
        ready: Self::Transfer,
        size: usize,
        threshold: f64,
    ) -> PicMatchResult<Option<Position>>;
}

/// Outcome of an accelerated picture search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccelOutcome {
    /// An object matched; later objects were not evaluated.
    Found { object_id: i32, position: Position },
    /// Every fitting object was evaluated without a match.
    Exhausted,
    /// The device failed; objects from `resume_at` (index into the object
    /// sequence) onwards are still undecided.
    Declined { resume_at: usize },
}

struct Decline {
    resume_at: usize,
    error: PicMatchError,
}

/// Evaluates `objects` in order against `picture` on `accelerator`.
///
/// Device errors never escape: they turn into [`AccelOutcome::Declined`].
pub fn search_picture<A: Accelerator>(
    accelerator: &A,
    picture: &Picture,
    objects: &[Object],
    threshold: f64,
) -> AccelOutcome {
    let queue: Vec<(usize, &Object)> = objects
        .iter()
        .enumerate()
        .filter(|(_, object)| object.fits_in(picture))
        .collect();
    let Some(slot_len) = queue.iter().map(|(_, object)| object.data().len()).max() else {
        return AccelOutcome::Exhausted;
    };

    let _span = trace_span!(
        "accelerated_search",
        picture = picture.id(),
        objects = queue.len()
    )
    .entered();

    let outcome = accelerator
        .open_session(picture, slot_len)
        .map_err(|error| Decline {
            resume_at: queue[0].0,
            error,
        })
        .and_then(|mut session| run_pipeline(&mut session, &queue, threshold));

    match outcome {
        Ok(Some(found)) => found,
        Ok(None) => AccelOutcome::Exhausted,
        Err(decline) => {
            report_decline(&decline.error);
            AccelOutcome::Declined {
                resume_at: decline.resume_at,
            }
        }
    }
}

fn run_pipeline<S: AcceleratorSession>(
    session: &mut S,
    queue: &[(usize, &Object)],
    threshold: f64,
) -> Result<Option<AccelOutcome>, Decline> {
    let mut pending: [Option<S::Transfer>; SLOTS] = [None, None];
    for (k, &(_, object)) in queue.iter().enumerate().take(SLOTS) {
        let transfer = session.upload(k, object).map_err(|error| Decline {
            resume_at: queue[0].0,
            error,
        })?;
        pending[k] = Some(transfer);
    }

    for (k, &(index, object)) in queue.iter().enumerate() {
        let slot = k % SLOTS;
        let decline = |error| Decline {
            resume_at: index,
            error,
        };
        let ready = pending[slot]
            .take()
            .ok_or_else(|| PicMatchError::Accelerator {
                reason: format!("slot {slot} has no pending transfer"),
            })
            .map_err(decline)?;
        let hit = session
            .evaluate(slot, ready, object.size(), threshold)
            .map_err(decline)?;
        if let Some(position) = hit {
            trace_event!("accelerated_match", object = object.id());
            return Ok(Some(AccelOutcome::Found {
                object_id: object.id(),
                position,
            }));
        }

        if let Some(&(_, next)) = queue.get(k + SLOTS) {
            let transfer = session.upload(slot, next).map_err(|error| Decline {
                resume_at: queue[k + 1].0,
                error,
            })?;
            pending[slot] = Some(transfer);
        }
    }
    Ok(None)
}

fn report_decline(error: &PicMatchError) {
    static REPORTED: Once = Once::new();
    REPORTED.call_once(|| {
        let reason = error.to_string();
        trace_warn!(
            "accelerator session failed, continuing on CPU",
            reason = reason.as_str()
        );
    });
}

/// Accelerator type selected at build time.
#[cfg(feature = "opencl")]
pub type SystemAccelerator = opencl::OpenClAccelerator;
/// Accelerator type selected at build time.
#[cfg(not(feature = "opencl"))]
pub type SystemAccelerator = NoAccelerator;

static PROBE: OnceLock<Option<SystemAccelerator>> = OnceLock::new();

/// Returns the process-wide accelerator, probing for it on first call.
///
/// The probe runs once per process; its result, including unavailability,
/// is cached and never re-queried.
pub fn probe() -> Option<&'static SystemAccelerator> {
    PROBE
        .get_or_init(|| match SystemAccelerator::detect() {
            Ok(accelerator) => {
                trace_event!("accelerator_ready", device = accelerator.name());
                Some(accelerator)
            }
            Err(err) => {
                let reason = err.to_string();
                trace_warn!(
                    "no accelerator, using CPU row search",
                    reason = reason.as_str()
                );
                None
            }
        })
        .as_ref()
}

/// Placeholder accelerator for builds without a device backend.
///
/// The type is uninhabited: [`NoAccelerator::detect`] always fails.
#[derive(Debug)]
pub enum NoAccelerator {}

/// Session type of [`NoAccelerator`].
#[derive(Debug)]
pub enum NoSession {}

impl NoAccelerator {
    /// Always reports the accelerator as unavailable.
    pub fn detect() -> PicMatchResult<Self> {
        Err(PicMatchError::AcceleratorUnavailable {
            reason: "built without the `opencl` feature".to_string(),
        })
    }
}

impl Accelerator for NoAccelerator {
    type Session<'d> = NoSession;

    fn name(&self) -> &str {
        match *self {}
    }

    fn open_session<'d>(&'d self, _: &Picture, _: usize) -> PicMatchResult<NoSession> {
        match *self {}
    }
}

impl AcceleratorSession for NoSession {
    type Transfer = ();

    fn upload(&mut self, _: usize, _: &Object) -> PicMatchResult<()> {
        match *self {}
    }

    fn evaluate(&mut self, _: usize, _: (), _: usize, _: f64) -> PicMatchResult<Option<Position>> {
        match *self {}
    }
}
