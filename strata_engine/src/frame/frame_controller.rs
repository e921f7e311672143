/// FrameController - acquire, record, submit and present across fenced frame slots
///
/// Each slot owns a command buffer, an image-acquired semaphore, a
/// rendering-finished semaphore and a fence. The CPU records into the
/// current slot while the GPU may still execute the others; the fence wait
/// in `wait_for_slot` is the only steady-state blocking point.
///
/// An image acquired by a frame that is later dropped stays held by the
/// slot and is reused by the retried frame, so its semaphore signal is
/// always consumed by exactly one submission.

use crate::error::{StrataError, StrataResult};
use crate::graphics_device::{
    AcquireStatus, CommandBufferHandle, FenceHandle, FenceStatus, GraphicsDevice, PresentStatus,
    SemaphoreHandle,
};
use crate::{engine_debug, engine_error, engine_warn};

/// Where the current frame is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Recording,
    Submitted,
    Presented,
}

/// Per-slot command and synchronization objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    pub command_buffer: CommandBufferHandle,
    pub image_acquired: SemaphoreHandle,
    pub rendering_finished: SemaphoreHandle,
    pub fence: FenceHandle,
    /// The fence has a pending signal from the last submission
    pub submitted: bool,
}

/// Result of presenting the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// The surface is stale or no longer matches; the swapchain must be restarted
    NeedsRestart,
    /// Minimized: nothing was presented
    Skipped,
}

pub struct FrameController {
    slots: Vec<FrameSlot>,
    current: usize,
    state: FrameState,
    image_index: u32,
    image_count: u32,
    /// Acquired image not yet presented (kept across a dropped frame)
    held_image: Option<u32>,
    minimized: bool,
    fence_timeout_ns: u64,
    acquire_timeout_ns: u64,
}

impl FrameController {
    /// Create `slot_count` slots
    ///
    /// # Arguments
    ///
    /// * `image_count` - Swapchain image count (round robin while minimized)
    pub fn new<D: GraphicsDevice>(
        device: &mut D,
        slot_count: u32,
        image_count: u32,
        fence_timeout_ns: u64,
        acquire_timeout_ns: u64,
    ) -> StrataResult<Self> {
        let mut slots = Vec::with_capacity(slot_count as usize);
        for _ in 0..slot_count {
            slots.push(FrameSlot {
                command_buffer: device.allocate_command_buffer()?,
                image_acquired: device.create_semaphore()?,
                rendering_finished: device.create_semaphore()?,
                fence: device.create_fence(false)?,
                submitted: false,
            });
        }
        Ok(Self {
            slots,
            current: 0,
            state: FrameState::Idle,
            image_index: 0,
            image_count: image_count.max(1),
            held_image: None,
            minimized: false,
            fence_timeout_ns,
            acquire_timeout_ns,
        })
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn slot_index(&self) -> usize {
        self.current
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self) -> &FrameSlot {
        &self.slots[self.current]
    }

    pub fn command_buffer(&self) -> CommandBufferHandle {
        self.slots[self.current].command_buffer
    }

    /// Swapchain image the current frame renders into
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Whether the current frame holds an acquired swapchain image
    pub fn has_image(&self) -> bool {
        self.held_image.is_some()
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    pub fn set_minimized(&mut self, minimized: bool) {
        self.minimized = minimized;
    }

    pub fn set_image_count(&mut self, image_count: u32) {
        self.image_count = image_count.max(1);
        self.image_index = 0;
    }

    /// Block until the current slot's last submission has completed
    ///
    /// # Errors
    ///
    /// `Timeout` if the fence does not signal in time. A lost device is only
    /// logged here; it resurfaces on the next submit.
    pub fn wait_for_slot<D: GraphicsDevice>(&mut self, device: &mut D) -> StrataResult<()> {
        let slot = self.slots[self.current];
        if !slot.submitted {
            return Ok(());
        }
        match device.wait_fence(slot.fence, self.fence_timeout_ns)? {
            FenceStatus::Signaled => {}
            FenceStatus::DeviceLost => {
                engine_warn!("strata::frame", "Device lost while waiting for frame slot {}", self.current);
            }
            FenceStatus::Timeout => {
                engine_error!("strata::frame", "Frame slot {} fence wait timed out", self.current);
                return Err(StrataError::Timeout);
            }
        }
        device.reset_fence(slot.fence)?;
        self.slots[self.current].submitted = false;
        Ok(())
    }

    /// Pick the image for the current frame
    ///
    /// Returns `false` when the surface is out of date and the swapchain must
    /// be restarted before retrying. While minimized the index only advances
    /// round robin.
    pub fn acquire_image<D: GraphicsDevice>(&mut self, device: &mut D) -> StrataResult<bool> {
        if let Some(index) = self.held_image {
            self.image_index = index;
            return Ok(true);
        }
        if self.minimized {
            self.image_index = (self.image_index + 1) % self.image_count;
            return Ok(true);
        }

        let semaphore = self.slots[self.current].image_acquired;
        match device.acquire_next_image(semaphore, self.acquire_timeout_ns)? {
            AcquireStatus::Acquired(index) | AcquireStatus::Suboptimal(index) => {
                self.image_index = index;
                self.held_image = Some(index);
                Ok(true)
            }
            AcquireStatus::OutOfDate => Ok(false),
            AcquireStatus::Timeout => {
                engine_error!("strata::frame", "Swapchain image acquire timed out");
                Err(StrataError::Timeout)
            }
        }
    }

    pub fn begin_recording<D: GraphicsDevice>(&mut self, device: &mut D) -> StrataResult<()> {
        device.begin_command_buffer(self.command_buffer())?;
        self.state = FrameState::Recording;
        Ok(())
    }

    /// Discard the recorded frame without submitting it
    ///
    /// The slot and any held image stay current so the retried frame reuses them.
    pub fn abort_recording<D: GraphicsDevice>(&mut self, device: &mut D) -> StrataResult<()> {
        let cb = self.command_buffer();
        device.end_command_buffer(cb)?;
        device.reset_command_buffer(cb)?;
        self.state = FrameState::Idle;
        engine_debug!("strata::frame", "Dropped frame in slot {}", self.current);
        Ok(())
    }

    /// End recording and submit
    ///
    /// Semaphores are attached only when an image was acquired; the fence is
    /// always signaled so slot reuse stays gated. A rejected submission
    /// leaves the frame `Idle` with a reset command buffer, like an aborted
    /// one.
    pub fn submit<D: GraphicsDevice>(&mut self, device: &mut D) -> StrataResult<()> {
        let slot = self.slots[self.current];
        device.end_command_buffer(slot.command_buffer)?;
        let (wait, signal) = if self.held_image.is_some() {
            (Some(slot.image_acquired), Some(slot.rendering_finished))
        } else {
            (None, None)
        };
        if let Err(err) = device.submit(slot.command_buffer, wait, signal, Some(slot.fence)) {
            engine_error!("strata::frame", "Submit of frame slot {} failed: {}", self.current, err);
            self.state = FrameState::Idle;
            if let Err(reset) = device.reset_command_buffer(slot.command_buffer) {
                engine_warn!("strata::frame", "Command buffer reset after failed submit: {}", reset);
            }
            return Err(err);
        }
        self.slots[self.current].submitted = true;
        self.state = FrameState::Submitted;
        Ok(())
    }

    pub fn present<D: GraphicsDevice>(&mut self, device: &mut D) -> StrataResult<PresentOutcome> {
        let Some(index) = self.held_image.take() else {
            self.state = FrameState::Presented;
            return Ok(PresentOutcome::Skipped);
        };
        let wait = self.slots[self.current].rendering_finished;
        let outcome = match device.present(index, wait)? {
            PresentStatus::Presented => PresentOutcome::Presented,
            PresentStatus::Suboptimal | PresentStatus::OutOfDate => PresentOutcome::NeedsRestart,
            PresentStatus::DeviceLost => {
                engine_warn!("strata::frame", "Device lost at present; continuing");
                PresentOutcome::Presented
            }
        };
        self.state = FrameState::Presented;
        Ok(outcome)
    }

    /// Move to the next slot
    pub fn finish_frame(&mut self) {
        self.current = (self.current + 1) % self.slots.len().max(1);
        self.state = FrameState::Idle;
    }

    /// Replace every semaphore and fence (device must be idle)
    ///
    /// Used on swapchain restart, where an acquired image may have left a
    /// semaphore signaled with no submission waiting on it.
    pub fn recreate_sync<D: GraphicsDevice>(&mut self, device: &mut D) -> StrataResult<()> {
        for slot in &mut self.slots {
            device.destroy_semaphore(slot.image_acquired);
            device.destroy_semaphore(slot.rendering_finished);
            device.destroy_fence(slot.fence);
            slot.image_acquired = device.create_semaphore()?;
            slot.rendering_finished = device.create_semaphore()?;
            slot.fence = device.create_fence(false)?;
            slot.submitted = false;
        }
        self.held_image = None;
        Ok(())
    }

    pub fn destroy<D: GraphicsDevice>(&mut self, device: &mut D) {
        for slot in self.slots.drain(..) {
            device.free_command_buffer(slot.command_buffer);
            device.destroy_semaphore(slot.image_acquired);
            device.destroy_semaphore(slot.rendering_finished);
            device.destroy_fence(slot.fence);
        }
        self.held_image = None;
        self.state = FrameState::Idle;
    }
}

#[cfg(test)]
#[path = "frame_controller_tests.rs"]
mod tests;
