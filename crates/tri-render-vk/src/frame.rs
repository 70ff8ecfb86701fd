// SPDX-License-Identifier: CEPL-1.0
//! Per-frame synchronization and the acquire / submit / present sequence.
use crate::device::Queues;
use crate::error::{Result, VkError, VkResultExt};
use ash::khr::swapchain;
use ash::prelude::VkResult;
use ash::vk;

/// The stage that waits on the acquired image. Only color output touches it.
pub const SUBMIT_WAIT_STAGE: vk::PipelineStageFlags = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;

/// One frame in flight: two semaphores chaining acquire, render and present,
/// plus a fence keeping the CPU from reusing them before the GPU is done.
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
}

impl FrameSync {
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        let sem_info = vk::SemaphoreCreateInfo::default();
        // Signaled so the very first wait returns immediately.
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        Ok(FrameSync {
            image_available: device
                .create_semaphore(&sem_info, None)
                .during("vkCreateSemaphore")?,
            render_finished: device
                .create_semaphore(&sem_info, None)
                .during("vkCreateSemaphore")?,
            in_flight: device
                .create_fence(&fence_info, None)
                .during("vkCreateFence")?,
        })
    }

    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_fence(self.in_flight, None);
        device.destroy_semaphore(self.render_finished, None);
        device.destroy_semaphore(self.image_available, None);
    }
}

/// Outcome of one `draw_frame`, ordered from best to worst.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FrameStatus {
    Presented,
    /// Presented, but the surface no longer matches the swapchain exactly.
    Suboptimal,
    /// Submitted, but presentation reported the swapchain out of date.
    OutOfDate,
    /// Acquire reported out of date; nothing was submitted.
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    Image { index: u32, suboptimal: bool },
    OutOfDate,
}

pub fn classify_acquire(result: VkResult<(u32, bool)>) -> Result<Acquire> {
    match result {
        Ok((index, suboptimal)) => Ok(Acquire::Image { index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquire::OutOfDate),
        Err(result) => Err(VkError::Frame {
            stage: "vkAcquireNextImageKHR",
            result,
        }),
    }
}

pub fn classify_present(result: VkResult<bool>) -> Result<FrameStatus> {
    match result {
        Ok(false) => Ok(FrameStatus::Presented),
        Ok(true) => Ok(FrameStatus::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(FrameStatus::OutOfDate),
        Err(result) => Err(VkError::Frame {
            stage: "vkQueuePresentKHR",
            result,
        }),
    }
}

fn frame_stage(stage: &'static str) -> impl FnOnce(vk::Result) -> VkError {
    move |result| VkError::Frame { stage, result }
}

/// Everything `draw_frame` touches, borrowed from the renderer.
pub struct FrameContext<'a> {
    pub device: &'a ash::Device,
    pub swapchain_loader: &'a swapchain::Device,
    pub swapchain: vk::SwapchainKHR,
    pub queues: Queues,
    /// Indexed by swapchain image index.
    pub command_buffers: &'a [vk::CommandBuffer],
    pub sync: &'a FrameSync,
}

/// Waits for the previous frame, then acquires, submits and presents one image.
pub unsafe fn draw_frame(ctx: &FrameContext<'_>) -> Result<FrameStatus> {
    let sync = ctx.sync;
    let fences = [sync.in_flight];

    ctx.device
        .wait_for_fences(&fences, true, u64::MAX)
        .map_err(frame_stage("vkWaitForFences"))?;

    let acquired = classify_acquire(ctx.swapchain_loader.acquire_next_image(
        ctx.swapchain,
        u64::MAX,
        sync.image_available,
        vk::Fence::null(),
    ))?;
    let (index, acquire_status) = match acquired {
        Acquire::Image { index, suboptimal } => (
            index,
            if suboptimal {
                FrameStatus::Suboptimal
            } else {
                FrameStatus::Presented
            },
        ),
        // Fence stays signaled, so the next call does not deadlock.
        Acquire::OutOfDate => return Ok(FrameStatus::Skipped),
    };

    ctx.device
        .reset_fences(&fences)
        .map_err(frame_stage("vkResetFences"))?;

    let wait_semaphores = [sync.image_available];
    let wait_stages = [SUBMIT_WAIT_STAGE];
    let command_buffers = [ctx.command_buffers[index as usize]];
    let signal_semaphores = [sync.render_finished];
    let submit = vk::SubmitInfo::default()
        .wait_semaphores(&wait_semaphores)
        .wait_dst_stage_mask(&wait_stages)
        .command_buffers(&command_buffers)
        .signal_semaphores(&signal_semaphores);
    ctx.device
        .queue_submit(ctx.queues.graphics, &[submit], sync.in_flight)
        .map_err(frame_stage("vkQueueSubmit"))?;

    let swapchains = [ctx.swapchain];
    let image_indices = [index];
    let present = vk::PresentInfoKHR::default()
        .wait_semaphores(&signal_semaphores)
        .swapchains(&swapchains)
        .image_indices(&image_indices);
    let present_status =
        classify_present(ctx.swapchain_loader.queue_present(ctx.queues.present, &present))?;

    Ok(acquire_status.max(present_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_success_and_suboptimal_both_yield_an_image() {
        assert_eq!(
            classify_acquire(Ok((2, false))).unwrap(),
            Acquire::Image {
                index: 2,
                suboptimal: false
            }
        );
        assert_eq!(
            classify_acquire(Ok((0, true))).unwrap(),
            Acquire::Image {
                index: 0,
                suboptimal: true
            }
        );
    }

    #[test]
    fn acquire_out_of_date_is_not_fatal() {
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            Acquire::OutOfDate
        );
    }

    #[test]
    fn acquire_device_lost_is_fatal() {
        let err = classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)).unwrap_err();
        assert!(matches!(
            err,
            VkError::Frame {
                stage: "vkAcquireNextImageKHR",
                result: vk::Result::ERROR_DEVICE_LOST
            }
        ));
    }

    #[test]
    fn present_results() {
        assert_eq!(classify_present(Ok(false)).unwrap(), FrameStatus::Presented);
        assert_eq!(classify_present(Ok(true)).unwrap(), FrameStatus::Suboptimal);
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            FrameStatus::OutOfDate
        );
        assert!(matches!(
            classify_present(Err(vk::Result::ERROR_SURFACE_LOST_KHR)),
            Err(VkError::Frame {
                stage: "vkQueuePresentKHR",
                ..
            })
        ));
    }

    #[test]
    fn worse_status_wins() {
        assert_eq!(
            FrameStatus::Suboptimal.max(FrameStatus::Presented),
            FrameStatus::Suboptimal
        );
        assert_eq!(
            FrameStatus::Suboptimal.max(FrameStatus::OutOfDate),
            FrameStatus::OutOfDate
        );
    }

    #[test]
    fn submit_waits_at_color_output() {
        assert_eq!(
            SUBMIT_WAIT_STAGE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        );
    }
}
