//! GPU/CPU synchronization primitives
//!
//! Binary semaphores order work inside a single frame (acquire -> render ->
//! present). The frame fence is a monotonically increasing timeline
//! semaphore: the CPU tracks the next value to signal, the GPU reports the
//! last value reached, and waiting for a value proves all work submitted
//! before its signal has finished.

use ash::{vk, Device};

use super::context::{VulkanError, VulkanResult};

/// Pure CPU-side bookkeeping for a monotonic frame counter.
///
/// Split out from the GPU object so the signal/wait arithmetic is testable
/// without a device. Values start at 1: value 0 is the semaphore's initial
/// state and never corresponds to submitted work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceTimeline {
    next_value: u64,
}

impl FenceTimeline {
    /// A fresh timeline whose first signal will carry value 1.
    pub const fn new() -> Self {
        Self { next_value: 1 }
    }

    /// The value the next signal will carry.
    pub const fn next_value(&self) -> u64 {
        self.next_value
    }

    /// Record a signal: returns the value just signaled and advances.
    pub fn advance(&mut self) -> u64 {
        let signaled = self.next_value;
        self.next_value += 1;
        signaled
    }

    /// Whether a wait for `target` is already satisfied by `completed`.
    pub const fn is_complete(completed: u64, target: u64) -> bool {
        completed >= target
    }
}

impl Default for FenceTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Timeline-semaphore frame fence with RAII cleanup.
///
/// One instance serializes the whole application: after every submission the
/// CPU signals the next timeline value and blocks until the GPU reaches it,
/// so CPU and GPU advance in lockstep and at most one frame is ever in
/// flight.
pub struct FrameFence {
    device: Device,
    semaphore: vk::Semaphore,
    timeline: FenceTimeline,
}

impl FrameFence {
    /// Create the timeline semaphore at initial value 0.
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::builder()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);
        let create_info = vk::SemaphoreCreateInfo::builder().push_next(&mut type_info);

        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::from_vk)?
        };

        Ok(Self {
            device: device.clone(),
            semaphore,
            timeline: FenceTimeline::new(),
        })
    }

    /// The raw semaphore handle, for embedding in a frame submission.
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// The value the next signal will carry. A frame submission that signals
    /// this value must be followed by [`Self::finish_frame`].
    pub fn pending_value(&self) -> u64 {
        self.timeline.next_value()
    }

    /// Complete a frame whose submission signaled [`Self::pending_value`]:
    /// advance the counter and block until the GPU reaches the value.
    pub fn finish_frame(&mut self) -> VulkanResult<()> {
        let target = self.timeline.advance();
        self.wait_for_value(target)
    }

    /// Signal the next value from the queue and block until the GPU reaches
    /// it. Used standalone for teardown and resize drains, where no frame
    /// submission carries the signal.
    pub fn signal_and_wait(&mut self, queue: vk::Queue) -> VulkanResult<()> {
        let target = self.timeline.advance();

        let signal_values = [target];
        let mut timeline_info =
            vk::TimelineSemaphoreSubmitInfo::builder().signal_semaphore_values(&signal_values);
        let signal_semaphores = [self.semaphore];
        let submit_info = vk::SubmitInfo::builder()
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info)
            .build();

        unsafe {
            self.device
                .queue_submit(queue, &[submit_info], vk::Fence::null())
                .map_err(VulkanError::from_vk)?;
        }

        self.wait_for_value(target)
    }

    fn wait_for_value(&self, target: u64) -> VulkanResult<()> {
        let completed = unsafe {
            self.device
                .get_semaphore_counter_value(self.semaphore)
                .map_err(VulkanError::from_vk)?
        };

        if FenceTimeline::is_complete(completed, target) {
            return Ok(());
        }

        let semaphores = [self.semaphore];
        let values = [target];
        let wait_info = vk::SemaphoreWaitInfo::builder()
            .semaphores(&semaphores)
            .values(&values);

        // Unbounded wait: a hang here is a GPU fault, not a recoverable
        // condition, and validation layers report it better than a timeout.
        unsafe {
            self.device
                .wait_semaphores(&wait_info, u64::MAX)
                .map_err(VulkanError::from_vk)
        }
    }
}

impl Drop for FrameFence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Binary semaphore with RAII cleanup.
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create an unsignaled binary semaphore.
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::from_vk)?
        };

        Ok(Self {
            device: device.clone(),
            semaphore,
        })
    }

    /// The raw semaphore handle.
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_starts_at_one() {
        let timeline = FenceTimeline::new();
        assert_eq!(timeline.next_value(), 1);
    }

    #[test]
    fn advance_returns_signaled_value_and_increments() {
        let mut timeline = FenceTimeline::new();
        assert_eq!(timeline.advance(), 1);
        assert_eq!(timeline.advance(), 2);
        assert_eq!(timeline.next_value(), 3);
    }

    #[test]
    fn completion_is_at_or_past_target() {
        assert!(FenceTimeline::is_complete(5, 5));
        assert!(FenceTimeline::is_complete(6, 5));
        assert!(!FenceTimeline::is_complete(4, 5));
    }
}
