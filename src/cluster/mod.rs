//! Work distribution across independent workers.
//!
//! Worker `w` of `W` owns pictures `w, w + W, w + 2W, ...`. The partition is
//! fixed up front and ignores picture content and size. Workers share
//! nothing while searching: the dataset reaches each of them through one
//! broadcast, and only fixed-size [`ResultRecord`]s travel back to the root,
//! which merges them by picture id into input order.

mod local;
mod record;

pub use local::{local_cluster, LocalComm};
pub use record::{ResultRecord, RECORD_WORDS};

use crate::accel::{self, Accelerator, SystemAccelerator};
use crate::dataset::{Dataset, Picture};
use crate::search::matcher::PictureMatcher;
use crate::search::{AcceleratorMode, MatchConfig, MatchResult};
use crate::trace::{trace_event, trace_span};
use crate::util::{PicMatchError, PicMatchResult};
use std::collections::HashMap;
use std::iter::StepBy;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::thread;

/// Rank that owns the dataset before broadcast and receives all results.
pub const ROOT: usize = 0;

/// Collective operations between the workers of one run.
pub trait Collective {
    /// Index of this worker in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of workers.
    fn size(&self) -> usize;

    /// Delivers the root's dataset to every worker.
    ///
    /// The root passes `Some`; other ranks pass `None`. Every rank gets its
    /// own copy back.
    fn broadcast(&self, dataset: Option<&Dataset>) -> PicMatchResult<Dataset>;

    /// Sends this worker's records to the root.
    ///
    /// The root returns one record list per rank, ordered by rank; other
    /// ranks return `None`.
    fn gather(&self, records: Vec<ResultRecord>) -> PicMatchResult<Option<Vec<Vec<ResultRecord>>>>;
}

/// Picture indices owned by `rank` among `workers`.
pub fn stripe(len: usize, workers: usize, rank: usize) -> StepBy<Range<usize>> {
    (rank.min(len)..len).step_by(workers.max(1))
}

/// Configuration of a distributed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistributeConfig {
    /// Number of workers.
    pub workers: usize,
    /// Per-worker matcher settings. `threads == 0` splits the available
    /// cores evenly between workers.
    pub matcher: MatchConfig,
}

impl Default for DistributeConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            matcher: MatchConfig::default(),
        }
    }
}

/// Runs a dataset across in-process workers and merges their results.
pub struct WorkDistributor<'d, A: Accelerator = SystemAccelerator> {
    cfg: DistributeConfig,
    accelerator: Option<&'d A>,
}

impl WorkDistributor<'static, SystemAccelerator> {
    /// Creates a distributor using the process-wide accelerator probe.
    pub fn new(cfg: DistributeConfig) -> Self {
        let accelerator = match cfg.matcher.accelerator {
            AcceleratorMode::Auto => accel::probe(),
            AcceleratorMode::Disabled => None,
        };
        Self { cfg, accelerator }
    }
}

impl<'d, A: Accelerator> WorkDistributor<'d, A> {
    /// Creates a distributor with an explicit accelerator.
    pub fn with_accelerator(cfg: DistributeConfig, accelerator: Option<&'d A>) -> Self {
        Self { cfg, accelerator }
    }

    /// Matches every picture of `dataset` and returns results in input order.
    pub fn run(&self, dataset: &Dataset) -> PicMatchResult<Vec<MatchResult>> {
        if self.cfg.workers == 0 {
            return Err(PicMatchError::InvalidInput("worker count must be at least 1"));
        }
        let matcher_cfg = self.worker_matcher_config();
        let _span = trace_span!(
            "distribute",
            workers = self.cfg.workers,
            pictures = dataset.pictures().len()
        )
        .entered();

        let comms = local_cluster(self.cfg.workers);
        thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    let payload = (comm.rank() == ROOT).then_some(dataset);
                    let matcher_cfg = &matcher_cfg;
                    let accelerator = self.accelerator;
                    thread::Builder::new()
                        .name(format!("picmatch-worker-{}", comm.rank()))
                        .spawn_scoped(scope, move || {
                            run_worker(&comm, payload, matcher_cfg, accelerator)
                        })
                        .map_err(|err| PicMatchError::Distribution {
                            reason: err.to_string(),
                        })
                })
                .collect();

            let mut merged = None;
            let mut first_error = None;
            for handle in handles {
                let outcome = handle.and_then(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(PicMatchError::Distribution {
                            reason: "worker panicked".to_string(),
                        })
                    })
                });
                match outcome {
                    Ok(Some(results)) => merged = Some(results),
                    Ok(None) => {}
                    Err(err) => {
                        first_error.get_or_insert(err);
                    }
                }
            }

            match (first_error, merged) {
                (Some(err), _) => Err(err),
                (None, Some(results)) => Ok(results),
                (None, None) => Err(PicMatchError::Distribution {
                    reason: "root produced no results".to_string(),
                }),
            }
        })
    }

    fn worker_matcher_config(&self) -> MatchConfig {
        let mut cfg = self.cfg.matcher.clone();
        if cfg.threads == 0 {
            let cores = thread::available_parallelism().map_or(1, NonZeroUsize::get);
            cfg.threads = (cores / self.cfg.workers).max(1);
        }
        cfg
    }
}

/// Runs one worker: receive the dataset, match its stripe, gather results.
///
/// Returns the merged results on the root and `None` elsewhere.
pub fn run_worker<C: Collective, A: Accelerator>(
    comm: &C,
    payload: Option<&Dataset>,
    cfg: &MatchConfig,
    accelerator: Option<&A>,
) -> PicMatchResult<Option<Vec<MatchResult>>> {
    let dataset = comm.broadcast(payload)?;
    let matcher = PictureMatcher::with_accelerator(cfg, accelerator)?;
    let pictures = dataset.pictures();

    let _span = trace_span!("worker", rank = comm.rank()).entered();
    let mut records = Vec::new();
    for idx in stripe(pictures.len(), comm.size(), comm.rank()) {
        let result = matcher.match_picture(&pictures[idx], dataset.objects(), dataset.threshold());
        records.push(ResultRecord::try_from(&result)?);
    }
    trace_event!("worker_done", rank = comm.rank(), pictures = records.len());

    match comm.gather(records)? {
        Some(per_rank) => merge(pictures, per_rank).map(Some),
        None => Ok(None),
    }
}

/// Places gathered records at their picture's input position.
///
/// Every picture must receive exactly one record.
pub fn merge(
    pictures: &[Picture],
    per_rank: Vec<Vec<ResultRecord>>,
) -> PicMatchResult<Vec<MatchResult>> {
    let index: HashMap<i32, usize> = pictures
        .iter()
        .enumerate()
        .map(|(idx, picture)| (picture.id(), idx))
        .collect();

    let mut slots: Vec<Option<MatchResult>> = vec![None; pictures.len()];
    for record in per_rank.into_iter().flatten() {
        let result = MatchResult::try_from(record)?;
        let idx = *index
            .get(&result.picture_id())
            .ok_or_else(|| PicMatchError::Distribution {
                reason: format!("result for unknown picture {}", result.picture_id()),
            })?;
        if slots[idx].replace(result).is_some() {
            return Err(PicMatchError::Distribution {
                reason: format!("duplicate result for picture {}", result.picture_id()),
            });
        }
    }

    slots
        .into_iter()
        .zip(pictures)
        .map(|(slot, picture)| {
            slot.ok_or_else(|| PicMatchError::Distribution {
                reason: format!("no result for picture {}", picture.id()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{merge, stripe, ResultRecord};
    use crate::dataset::Picture;
    use crate::search::{MatchResult, Position};
    use crate::util::PicMatchError;

    #[test]
    fn stripes_cover_every_index_once() {
        for len in 0..23 {
            for workers in 1..7 {
                let mut seen = vec![0usize; len];
                for rank in 0..workers {
                    for idx in stripe(len, workers, rank) {
                        assert_eq!(idx % workers, rank);
                        seen[idx] += 1;
                    }
                }
                assert!(seen.iter().all(|&count| count == 1));
            }
        }
    }

    #[test]
    fn stripe_for_idle_worker_is_empty() {
        assert_eq!(stripe(2, 4, 3).count(), 0);
    }

    fn pictures() -> Vec<Picture> {
        [40, 7, 12]
            .iter()
            .map(|&id| Picture::new(id, 1, vec![1]).unwrap())
            .collect()
    }

    #[test]
    fn merge_restores_input_order_by_identity() {
        let hit = MatchResult::found(12, 3, Position { i: 1, j: 2 });
        let per_rank = vec![
            vec![ResultRecord::try_from(&hit).unwrap()],
            vec![
                ResultRecord::try_from(&MatchResult::not_found(7)).unwrap(),
                ResultRecord::try_from(&MatchResult::not_found(40)).unwrap(),
            ],
        ];
        let merged = merge(&pictures(), per_rank).unwrap();
        let ids: Vec<i32> = merged.iter().map(MatchResult::picture_id).collect();
        assert_eq!(ids, vec![40, 7, 12]);
        assert_eq!(merged[2], hit);
    }

    #[test]
    fn merge_rejects_missing_and_duplicate_results() {
        let miss = ResultRecord::try_from(&MatchResult::not_found(7)).unwrap();
        let err = merge(&pictures(), vec![vec![miss]]).unwrap_err();
        assert!(matches!(err, PicMatchError::Distribution { .. }));

        let all: Vec<_> = [40, 7, 12, 7]
            .iter()
            .map(|&id| ResultRecord::try_from(&MatchResult::not_found(id)).unwrap())
            .collect();
        let err = merge(&pictures(), vec![all]).unwrap_err();
        assert_eq!(
            err,
            PicMatchError::Distribution {
                reason: "duplicate result for picture 7".to_string()
            }
        );
    }
}
