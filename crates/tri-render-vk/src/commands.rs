// SPDX-License-Identifier: CEPL-1.0
//! Framebuffers, the command pool and the once-recorded command buffers.
use crate::error::{Result, VkResultExt};
use ash::vk;

pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

pub unsafe fn create_framebuffers(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>> {
    let mut framebuffers = Vec::with_capacity(views.len());
    for view in views {
        let attachments = [*view];
        let info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        framebuffers.push(
            device
                .create_framebuffer(&info, None)
                .during("vkCreateFramebuffer")?,
        );
    }
    Ok(framebuffers)
}

pub unsafe fn create_command_pool(device: &ash::Device, graphics_family: u32) -> Result<vk::CommandPool> {
    let info = vk::CommandPoolCreateInfo::default().queue_family_index(graphics_family);
    device
        .create_command_pool(&info, None)
        .during("vkCreateCommandPool")
}

pub unsafe fn allocate_command_buffers(
    device: &ash::Device,
    pool: vk::CommandPool,
    count: usize,
) -> Result<Vec<vk::CommandBuffer>> {
    let info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(count as u32);
    device
        .allocate_command_buffers(&info)
        .during("vkAllocateCommandBuffers")
}

/// Destination of a recorded command stream.
pub trait CommandSink {
    fn begin(&mut self) -> Result<()>;
    fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        area: vk::Rect2D,
        clear: vk::ClearValue,
    );
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline);
    fn draw(&mut self, vertex_count: u32, instance_count: u32);
    fn end_render_pass(&mut self);
    fn end(&mut self) -> Result<()>;
}

#[derive(Clone, Copy, Debug)]
pub struct TriangleDraw {
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
}

/// The whole per-image command stream. It depends on nothing that changes
/// between frames, which is what allows recording it only once.
pub fn record_triangle<S: CommandSink>(
    sink: &mut S,
    draw: &TriangleDraw,
    framebuffer: vk::Framebuffer,
) -> Result<()> {
    let area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: draw.extent,
    };
    let clear = vk::ClearValue {
        color: vk::ClearColorValue {
            float32: CLEAR_COLOR,
        },
    };

    sink.begin()?;
    sink.begin_render_pass(draw.render_pass, framebuffer, area, clear);
    sink.bind_pipeline(draw.pipeline);
    sink.draw(3, 1);
    sink.end_render_pass();
    sink.end()
}

struct DeviceRecorder<'a> {
    device: &'a ash::Device,
    cmd: vk::CommandBuffer,
}

// Only built by `record_command_buffers`, whose caller guarantees the
// command buffer and every handle passed in are alive.
impl CommandSink for DeviceRecorder<'_> {
    fn begin(&mut self) -> Result<()> {
        let info = vk::CommandBufferBeginInfo::default();
        unsafe { self.device.begin_command_buffer(self.cmd, &info) }.during("vkBeginCommandBuffer")
    }

    fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        area: vk::Rect2D,
        clear: vk::ClearValue,
    ) {
        let clears = [clear];
        let info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(area)
            .clear_values(&clears);
        unsafe {
            self.device
                .cmd_begin_render_pass(self.cmd, &info, vk::SubpassContents::INLINE)
        };
    }

    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(self.cmd, vk::PipelineBindPoint::GRAPHICS, pipeline)
        };
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        unsafe { self.device.cmd_draw(self.cmd, vertex_count, instance_count, 0, 0) };
    }

    fn end_render_pass(&mut self) {
        unsafe { self.device.cmd_end_render_pass(self.cmd) };
    }

    fn end(&mut self) -> Result<()> {
        unsafe { self.device.end_command_buffer(self.cmd) }.during("vkEndCommandBuffer")
    }
}

/// Records one command buffer per framebuffer; the two slices pair up by index.
pub unsafe fn record_command_buffers(
    device: &ash::Device,
    cmd_bufs: &[vk::CommandBuffer],
    framebuffers: &[vk::Framebuffer],
    draw: &TriangleDraw,
) -> Result<()> {
    for (&cmd, &framebuffer) in cmd_bufs.iter().zip(framebuffers) {
        let mut recorder = DeviceRecorder { device, cmd };
        record_triangle(&mut recorder, draw, framebuffer)?;
    }
    Ok(())
}
