//! In-process collective over `std::sync::mpsc` channels.
//!
//! Each worker is expected to run on its own thread and holds one
//! [`LocalComm`]. The broadcast hands every rank a separate clone of the
//! dataset; the gather moves only raw record words back to the root.

use crate::cluster::{Collective, ResultRecord, RECORD_WORDS, ROOT};
use crate::dataset::Dataset;
use crate::util::{PicMatchError, PicMatchResult};
use std::sync::mpsc::{self, Receiver, Sender};

type RecordBatch = (usize, Vec<[i32; RECORD_WORDS]>);

/// Endpoint of one worker in a [`local_cluster`].
#[derive(Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    role: Role,
}

#[derive(Debug)]
enum Role {
    Root {
        datasets: Vec<Sender<Dataset>>,
        results: Receiver<RecordBatch>,
    },
    Worker {
        dataset: Receiver<Dataset>,
        results: Sender<RecordBatch>,
    },
}

/// Creates connected endpoints for `size` workers, indexed by rank.
pub fn local_cluster(size: usize) -> Vec<LocalComm> {
    let size = size.max(1);
    let (result_tx, result_rx) = mpsc::channel();
    let mut dataset_txs = Vec::with_capacity(size - 1);
    let mut comms = Vec::with_capacity(size);

    for rank in 1..size {
        let (tx, rx) = mpsc::channel();
        dataset_txs.push(tx);
        comms.push(LocalComm {
            rank,
            size,
            role: Role::Worker {
                dataset: rx,
                results: result_tx.clone(),
            },
        });
    }
    drop(result_tx);

    comms.insert(
        ROOT,
        LocalComm {
            rank: ROOT,
            size,
            role: Role::Root {
                datasets: dataset_txs,
                results: result_rx,
            },
        },
    );
    comms
}

fn distribution_error(reason: String) -> PicMatchError {
    PicMatchError::Distribution { reason }
}

impl Collective for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast(&self, dataset: Option<&Dataset>) -> PicMatchResult<Dataset> {
        match &self.role {
            Role::Root { datasets, .. } => {
                let dataset = dataset.ok_or(PicMatchError::InvalidInput(
                    "root must supply the dataset to broadcast",
                ))?;
                for (offset, tx) in datasets.iter().enumerate() {
                    tx.send(dataset.clone()).map_err(|_| {
                        distribution_error(format!("worker {} is gone", offset + 1))
                    })?;
                }
                Ok(dataset.clone())
            }
            Role::Worker { dataset, .. } => dataset.recv().map_err(|_| {
                distribution_error(format!("worker {} received no dataset", self.rank))
            }),
        }
    }

    fn gather(&self, records: Vec<ResultRecord>) -> PicMatchResult<Option<Vec<Vec<ResultRecord>>>> {
        match &self.role {
            Role::Worker { results, .. } => {
                let words = records.iter().map(ResultRecord::words).collect();
                results.send((self.rank, words)).map_err(|_| {
                    distribution_error(format!("root is gone, worker {} dropped results", self.rank))
                })?;
                Ok(None)
            }
            Role::Root { results, .. } => {
                let mut per_rank: Vec<Option<Vec<ResultRecord>>> = vec![None; self.size];
                per_rank[ROOT] = Some(records);
                for _ in 1..self.size {
                    let (rank, words) = results.recv().map_err(|_| {
                        distribution_error("a worker exited before sending results".to_string())
                    })?;
                    let slot = per_rank.get_mut(rank).ok_or_else(|| {
                        distribution_error(format!("results from unknown worker {rank}"))
                    })?;
                    if slot.is_some() {
                        return Err(distribution_error(format!(
                            "worker {rank} sent results twice"
                        )));
                    }
                    *slot = Some(words.into_iter().map(ResultRecord::from_words).collect());
                }
                Ok(Some(per_rank.into_iter().flatten().collect()))
            }
        }
    }
}
