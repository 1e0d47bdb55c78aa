//! Software device implementing the accelerator contract on the host.
//!
//! The emulated device keeps its own copy of the picture ("device memory"),
//! runs uploads on a dedicated transfer thread and evaluates every candidate
//! position as an independent rayon job racing on an atomic flag. It records
//! each session, upload, evaluation and release in an event log, and can be
//! told to fail, which makes the pipeline observable without hardware.

use crate::accel::{Accelerator, AcceleratorSession, SLOTS};
use crate::dataset::{Object, Picture};
use crate::kernel::{DefaultKernel, ScoreKernel};
use crate::search::Position;
use crate::util::{PicMatchError, PicMatchResult};
use crate::ImageView;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Device operation recorded by [`EmulatedDevice`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    Open { picture_id: i32 },
    Upload { slot: usize, object_id: i32 },
    Evaluate { slot: usize, object_id: i32 },
    Release { picture_id: i32 },
}

/// Host-side stand-in for a massively parallel device.
#[derive(Debug, Default)]
pub struct EmulatedDevice {
    events: Mutex<Vec<DeviceEvent>>,
    evaluations: AtomicUsize,
    fail_at: Option<usize>,
    fail_open: bool,
}

impl EmulatedDevice {
    /// Creates a device that never fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `index`-th evaluation (counting from zero, across all
    /// sessions) fail.
    pub fn failing_at_evaluation(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Makes every session fail to open.
    pub fn failing_on_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Returns the operations recorded so far.
    pub fn events(&self) -> Vec<DeviceEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, event: DeviceEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl Accelerator for EmulatedDevice {
    type Session<'d> = EmulatedSession<'d>;

    fn name(&self) -> &str {
        "emulated"
    }

    fn open_session<'d>(
        &'d self,
        picture: &Picture,
        slot_len: usize,
    ) -> PicMatchResult<EmulatedSession<'d>> {
        if self.fail_open {
            return Err(device_error("session setup failed"));
        }

        let (jobs, queue) = mpsc::channel::<TransferJob>();
        let transfer_thread = thread::Builder::new()
            .name("picmatch-transfer".to_string())
            .spawn(move || run_transfers(queue))
            .map_err(|err| device_error(&err.to_string()))?;

        self.record(DeviceEvent::Open {
            picture_id: picture.id(),
        });
        Ok(EmulatedSession {
            device: self,
            picture_id: picture.id(),
            size: picture.size(),
            picture: picture.data().to_vec(),
            slots: [(); SLOTS].map(|_| Arc::new(Mutex::new(Vec::with_capacity(slot_len)))),
            resident: [None; SLOTS],
            jobs: Some(jobs),
            transfer_thread: Some(transfer_thread),
        })
    }
}

struct TransferJob {
    staged: Vec<i32>,
    buffer: Arc<Mutex<Vec<i32>>>,
    done: Sender<()>,
}

fn run_transfers(queue: Receiver<TransferJob>) {
    for job in queue {
        if let Ok(mut buffer) = job.buffer.lock() {
            buffer.clear();
            buffer.extend_from_slice(&job.staged);
        }
        let _ = job.done.send(());
    }
}

/// Completion handle of an emulated upload.
#[derive(Debug)]
pub struct EmulatedTransfer {
    slot: usize,
    done: Receiver<()>,
}

/// Per-picture resources of an [`EmulatedDevice`].
pub struct EmulatedSession<'d> {
    device: &'d EmulatedDevice,
    picture_id: i32,
    size: usize,
    picture: Vec<i32>,
    slots: [Arc<Mutex<Vec<i32>>>; SLOTS],
    resident: [Option<i32>; SLOTS],
    jobs: Option<Sender<TransferJob>>,
    transfer_thread: Option<JoinHandle<()>>,
}

impl AcceleratorSession for EmulatedSession<'_> {
    type Transfer = EmulatedTransfer;

    fn upload(&mut self, slot: usize, object: &Object) -> PicMatchResult<EmulatedTransfer> {
        let buffer = self
            .slots
            .get(slot)
            .ok_or_else(|| device_error("slot out of range"))?;
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| device_error("transfer channel closed"))?;

        let (done, ready) = mpsc::channel();
        jobs.send(TransferJob {
            staged: object.data().to_vec(),
            buffer: Arc::clone(buffer),
            done,
        })
        .map_err(|_| device_error("transfer channel closed"))?;

        self.resident[slot] = Some(object.id());
        self.device.record(DeviceEvent::Upload {
            slot,
            object_id: object.id(),
        });
        Ok(EmulatedTransfer { slot, done: ready })
    }

    fn evaluate(
        &mut self,
        slot: usize,
        ready: EmulatedTransfer,
        size: usize,
        threshold: f64,
    ) -> PicMatchResult<Option<Position>> {
        if ready.slot != slot {
            return Err(device_error("transfer belongs to another slot"));
        }
        ready
            .done
            .recv()
            .map_err(|_| device_error("transfer did not complete"))?;

        let index = self.device.evaluations.fetch_add(1, Ordering::SeqCst);
        if self.device.fail_at == Some(index) {
            return Err(device_error("kernel launch failed"));
        }
        self.device.record(DeviceEvent::Evaluate {
            slot,
            object_id: self.resident[slot].unwrap_or(-1),
        });

        if size == 0 || size > self.size {
            return Err(device_error("object does not fit the picture"));
        }
        let span = self.size - size + 1;
        let buffer = self.slots[slot]
            .lock()
            .map_err(|_| device_error("slot buffer poisoned"))?;
        let object = ImageView::from_slice(buffer.as_slice(), size, size)?;
        let picture = ImageView::from_slice(&self.picture, self.size, self.size)?;

        let found = AtomicBool::new(false);
        let winner = AtomicUsize::new(usize::MAX);
        (0..span * span).into_par_iter().for_each(|unit| {
            if found.load(Ordering::Relaxed) {
                return;
            }
            let (i, j) = (unit / span, unit % span);
            let score = <DefaultKernel as ScoreKernel>::score_at(picture, object, i, j);
            if score < threshold
                && found
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
                    .is_ok()
            {
                winner.store(unit, Ordering::Relaxed);
            }
        });

        if !found.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let unit = winner.load(Ordering::SeqCst);
        Ok(Some(Position {
            i: unit / span,
            j: unit % span,
        }))
    }
}

impl Drop for EmulatedSession<'_> {
    fn drop(&mut self) {
        // Closing the job channel lets the transfer thread drain and exit.
        self.jobs.take();
        if let Some(handle) = self.transfer_thread.take() {
            let _ = handle.join();
        }
        self.device.record(DeviceEvent::Release {
            picture_id: self.picture_id,
        });
    }
}

fn device_error(reason: &str) -> PicMatchError {
    PicMatchError::Accelerator {
        reason: reason.to_string(),
    }
}
