//! OpenCL backend (feature-gated).
//!
//! Each session owns two in-order command queues on the same device: one
//! for object uploads and one for kernel launches and read-back. A launch
//! waits on the event of the upload that filled its slot, so the queues only
//! synchronize where the pipeline requires it.
//!
//! The kernel accumulates in double precision in the same order as the CPU
//! kernels, so both paths agree on which windows fall below the
//! threshold. Devices without `cl_khr_fp64` are rejected by the probe.

use crate::accel::{Accelerator, AcceleratorSession, SLOTS};
use crate::dataset::{Object, Picture};
use crate::search::Position;
use crate::util::{PicMatchError, PicMatchResult};
use ocl::enums::DeviceInfo;
use ocl::{Buffer, Context, Device, Event, Kernel, Platform, Program, Queue};

const KERNEL_NAME: &str = "score_positions";

static KERNEL_SRC: &str = r#"
    #pragma OPENCL EXTENSION cl_khr_fp64 : enable

    // One work item per candidate offset (i, j) of an n x n object inside a
    // size x size picture.
    __kernel void score_positions(
        __global const int* picture, const int size,
        __global const int* object, const int n,
        const double threshold,
        __global volatile int* found,
        __global int* position)
    {
        const int span = size - n + 1;
        const int unit = get_global_id(0);
        if (unit >= span * span) {
            return;
        }
        if (atomic_add(found, 0) != 0) {
            return;
        }

        const int i = unit / span;
        const int j = unit % span;
        double sum = 0.0;
        for (int r = 0; r < n; ++r) {
            const int base_p = (i + r) * size + j;
            const int base_o = r * n;
            for (int c = 0; c < n; ++c) {
                const double pv = (double)picture[base_p + c];
                sum += fabs((pv - (double)object[base_o + c]) / pv);
            }
        }

        if (sum < threshold && atomic_cmpxchg(found, 0, 1) == 0) {
            position[0] = i;
            position[1] = j;
        }
    }
"#;

impl From<ocl::Error> for PicMatchError {
    fn from(err: ocl::Error) -> Self {
        PicMatchError::Accelerator {
            reason: err.to_string(),
        }
    }
}

fn unavailable(reason: impl ToString) -> PicMatchError {
    PicMatchError::AcceleratorUnavailable {
        reason: reason.to_string(),
    }
}

/// First OpenCL device with double-precision support.
#[derive(Debug)]
pub struct OpenClAccelerator {
    context: Context,
    device: Device,
    program: Program,
    name: String,
}

impl OpenClAccelerator {
    /// Enumerates platforms and builds the scoring program on the first
    /// suitable device.
    pub fn detect() -> PicMatchResult<Self> {
        let platform_ids = ocl::core::get_platform_ids().map_err(unavailable)?;
        for platform in platform_ids.into_iter().map(Platform::new) {
            let Ok(devices) = Device::list_all(platform) else {
                continue;
            };
            for device in devices {
                if supports_fp64(device) {
                    return Self::build(platform, device);
                }
            }
        }
        Err(unavailable("no OpenCL device with double precision support"))
    }

    fn build(platform: Platform, device: Device) -> PicMatchResult<Self> {
        let context = Context::builder()
            .platform(platform)
            .devices(device)
            .build()
            .map_err(unavailable)?;
        let program = Program::builder()
            .src(KERNEL_SRC)
            .devices(device)
            .build(&context)
            .map_err(unavailable)?;
        let name = device.name().unwrap_or_else(|_| "opencl".to_string());
        Ok(Self {
            context,
            device,
            program,
            name,
        })
    }
}

/// Converts a picture side to the kernel's `int`.
///
/// The kernel indexes the picture with 32-bit arithmetic, so `side * side`
/// must fit in an `int`.
fn device_side(side: usize) -> PicMatchResult<i32> {
    side
        .checked_mul(side)
        .and_then(|cells| i32::try_from(cells).ok())
        .and_then(|_| i32::try_from(side).ok())
        .ok_or_else(|| PicMatchError::Accelerator {
            reason: format!("picture side {side} exceeds 32-bit device indexing"),
        })
}

fn supports_fp64(device: Device) -> bool {
    device
        .info(DeviceInfo::Extensions)
        .map(|info| info.to_string().contains("cl_khr_fp64"))
        .unwrap_or(false)
}

impl Accelerator for OpenClAccelerator {
    type Session<'d> = OpenClSession;

    fn name(&self) -> &str {
        &self.name
    }

    fn open_session<'d>(
        &'d self,
        picture: &Picture,
        slot_len: usize,
    ) -> PicMatchResult<OpenClSession> {
        let size = device_side(picture.size())?;
        let transfer = Queue::new(&self.context, self.device, None)?;
        let compute = Queue::new(&self.context, self.device, None)?;

        let picture_buf = Buffer::<i32>::builder()
            .queue(compute.clone())
            .flags(ocl::flags::MEM_READ_ONLY)
            .len(picture.data().len())
            .copy_host_slice(picture.data())
            .build()?;
        let found = Buffer::<i32>::builder()
            .queue(compute.clone())
            .flags(ocl::flags::MEM_READ_WRITE)
            .len(1)
            .fill_val(0)
            .build()?;
        let position = Buffer::<i32>::builder()
            .queue(compute.clone())
            .flags(ocl::flags::MEM_READ_WRITE)
            .len(2)
            .fill_val(-1)
            .build()?;

        let mut slots = Vec::with_capacity(SLOTS);
        let mut kernels = Vec::with_capacity(SLOTS);
        for _ in 0..SLOTS {
            let slot = Buffer::<i32>::builder()
                .queue(transfer.clone())
                .flags(ocl::flags::MEM_READ_ONLY)
                .len(slot_len.max(1))
                .build()?;
            let kernel = Kernel::builder()
                .program(&self.program)
                .name(KERNEL_NAME)
                .queue(compute.clone())
                .global_work_size(1)
                .arg(&picture_buf)
                .arg(size)
                .arg(&slot)
                .arg_named("n", 0i32)
                .arg_named("threshold", 0.0f64)
                .arg(&found)
                .arg(&position)
                .build()?;
            slots.push(slot);
            kernels.push(kernel);
        }

        Ok(OpenClSession {
            transfer,
            compute,
            picture_size: picture.size(),
            _picture: picture_buf,
            slots,
            staging: vec![Vec::with_capacity(slot_len); SLOTS],
            kernels,
            found,
            position,
        })
    }
}

/// Per-picture OpenCL resources.
///
/// Dropping the session finishes both queues before the buffers are
/// released.
pub struct OpenClSession {
    transfer: Queue,
    compute: Queue,
    picture_size: usize,
    _picture: Buffer<i32>,
    slots: Vec<Buffer<i32>>,
    staging: Vec<Vec<i32>>,
    kernels: Vec<Kernel>,
    found: Buffer<i32>,
    position: Buffer<i32>,
}

impl AcceleratorSession for OpenClSession {
    type Transfer = Event;

    fn upload(&mut self, slot: usize, object: &Object) -> PicMatchResult<Event> {
        if slot >= SLOTS {
            return Err(PicMatchError::InvalidInput("slot out of range"));
        }
        let staging = &mut self.staging[slot];
        staging.clear();
        staging.extend_from_slice(object.data());

        let mut event = Event::empty();
        // SAFETY: the staging vector for this slot is neither modified nor
        // dropped until the upload event has been waited on by the launch
        // reading this slot, or until both queues are finished on drop.
        unsafe {
            self.slots[slot]
                .write(&self.staging[slot][..])
                .queue(&self.transfer)
                .block(false)
                .enew(&mut event)
                .enq()?;
        }
        self.transfer.flush()?;
        Ok(event)
    }

    fn evaluate(
        &mut self,
        slot: usize,
        ready: Event,
        size: usize,
        threshold: f64,
    ) -> PicMatchResult<Option<Position>> {
        if slot >= SLOTS || size == 0 || size > self.picture_size {
            return Err(PicMatchError::InvalidInput("invalid slot or object size"));
        }
        let span = self.picture_size - size + 1;
        let n = i32::try_from(size)
            .map_err(|_| PicMatchError::InvalidInput("object too large for device"))?;

        self.found.write(&[0i32][..]).queue(&self.compute).enq()?;
        let kernel = &self.kernels[slot];
        kernel.set_arg("n", n)?;
        kernel.set_arg("threshold", threshold)?;
        // SAFETY: every buffer the kernel touches is owned by this session
        // and the launch waits for the upload that filled its slot.
        unsafe {
            kernel
                .cmd()
                .queue(&self.compute)
                .global_work_size(span * span)
                .ewait(&ready)
                .enq()?;
        }

        let mut flag = [0i32];
        self.found.read(&mut flag[..]).queue(&self.compute).enq()?;
        if flag[0] == 0 {
            return Ok(None);
        }
        let mut coords = [0i32; 2];
        self.position
            .read(&mut coords[..])
            .queue(&self.compute)
            .enq()?;
        let to_index = |v: i32| {
            usize::try_from(v).map_err(|_| PicMatchError::Accelerator {
                reason: format!("device reported invalid coordinate {v}"),
            })
        };
        Ok(Some(Position {
            i: to_index(coords[0])?,
            j: to_index(coords[1])?,
        }))
    }
}

impl Drop for OpenClSession {
    fn drop(&mut self) {
        let _ = self.transfer.finish();
        let _ = self.compute.finish();
    }
}
