// SPDX-License-Identifier: CEPL-1.0
//! Render pass contract and the fixed triangle pipeline bound to it.
use crate::error::{Result, VkError, VkResultExt};
use crate::shader;
use ash::vk;
use std::ffi::CStr;
use tracing::info;

const SHADER_ENTRY: &CStr = c"main";

/// Single color attachment: cleared on load, stored, handed to present.
#[derive(Clone, Copy, Debug)]
pub struct RenderPassLayout {
    pub color: vk::AttachmentDescription,
    pub color_ref: vk::AttachmentReference,
    pub dependency: vk::SubpassDependency,
}

impl RenderPassLayout {
    pub fn for_format(format: vk::Format) -> Self {
        RenderPassLayout {
            color: vk::AttachmentDescription {
                format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::STORE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
                ..Default::default()
            },
            color_ref: vk::AttachmentReference {
                attachment: 0,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            },
            // The acquire semaphore is waited at COLOR_ATTACHMENT_OUTPUT, so the
            // implicit UNDEFINED -> COLOR_ATTACHMENT_OPTIMAL transition has to
            // wait for that stage too.
            dependency: vk::SubpassDependency {
                src_subpass: vk::SUBPASS_EXTERNAL,
                dst_subpass: 0,
                src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                src_access_mask: vk::AccessFlags::empty(),
                dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                ..Default::default()
            },
        }
    }
}

pub unsafe fn create_render_pass(device: &ash::Device, layout: &RenderPassLayout) -> Result<vk::RenderPass> {
    let attachments = [layout.color];
    let color_refs = [layout.color_ref];
    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)];
    let dependencies = [layout.dependency];

    let info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);
    device
        .create_render_pass(&info, None)
        .during("vkCreateRenderPass")
}

/// Fixed-function state of the triangle pipeline. Vertices come from the
/// vertex shader, so there is no vertex input.
#[derive(Clone, Copy, Debug)]
pub struct FixedFunctionState {
    pub topology: vk::PrimitiveTopology,
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub line_width: f32,
    pub samples: vk::SampleCountFlags,
    pub blend: vk::PipelineColorBlendAttachmentState,
}

impl FixedFunctionState {
    pub fn for_extent(extent: vk::Extent2D) -> Self {
        FixedFunctionState {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            viewport: vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            scissor: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            line_width: 1.0,
            samples: vk::SampleCountFlags::TYPE_1,
            // Straight replace: no blending, all channels written.
            blend: vk::PipelineColorBlendAttachmentState {
                blend_enable: vk::FALSE,
                color_write_mask: vk::ColorComponentFlags::RGBA,
                ..Default::default()
            },
        }
    }
}

pub struct Pipeline {
    pub layout: vk::PipelineLayout,
    pub handle: vk::Pipeline,
}

impl Pipeline {
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_pipeline(self.handle, None);
        device.destroy_pipeline_layout(self.layout, None);
    }
}

/// Builds the pipeline from SPIR-V words. The shader modules only live for
/// the duration of this call.
pub unsafe fn create_graphics_pipeline(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    state: &FixedFunctionState,
    vert_code: &[u32],
    frag_code: &[u32],
) -> Result<Pipeline> {
    let vert = shader::create_shader_module(device, vert_code)?;
    let frag = match shader::create_shader_module(device, frag_code) {
        Ok(m) => m,
        Err(e) => {
            device.destroy_shader_module(vert, None);
            return Err(e);
        }
    };

    let built = build_pipeline(device, render_pass, state, vert, frag);

    device.destroy_shader_module(vert, None);
    device.destroy_shader_module(frag, None);

    let pipeline = built?;
    info!("graphics pipeline created");
    Ok(pipeline)
}

unsafe fn build_pipeline(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    state: &FixedFunctionState,
    vert: vk::ShaderModule,
    frag: vk::ShaderModule,
) -> Result<Pipeline> {
    let stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vert)
            .name(SHADER_ENTRY),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(frag)
            .name(SHADER_ENTRY),
    ];

    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(state.topology)
        .primitive_restart_enable(false);

    let viewports = [state.viewport];
    let scissors = [state.scissor];
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewports(&viewports)
        .scissors(&scissors);

    let raster = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(state.polygon_mode)
        .line_width(state.line_width)
        .cull_mode(state.cull_mode)
        .front_face(state.front_face)
        .depth_bias_enable(false);

    let multisample = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(state.samples);

    let blend_attachments = [state.blend];
    let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&blend_attachments);

    // No descriptor sets or push constants.
    let layout = device
        .create_pipeline_layout(&vk::PipelineLayoutCreateInfo::default(), None)
        .during("vkCreatePipelineLayout")?;

    let info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&raster)
        .multisample_state(&multisample)
        .color_blend_state(&color_blend)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    match device.create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&info), None) {
        Ok(pipelines) => Ok(Pipeline {
            layout,
            handle: pipelines[0],
        }),
        Err((_, result)) => {
            device.destroy_pipeline_layout(layout, None);
            Err(VkError::Vk {
                what: "vkCreateGraphicsPipelines",
                result,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_clears_stores_and_ends_presentable() {
        let rp = RenderPassLayout::for_format(vk::Format::B8G8R8A8_UNORM);
        assert_eq!(rp.color.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(rp.color.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(rp.color.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(rp.color.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(rp.color.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(rp.color_ref.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn dependency_orders_first_write_after_acquire() {
        let dep = RenderPassLayout::for_format(vk::Format::B8G8R8A8_UNORM).dependency;
        assert_eq!(dep.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(dep.dst_subpass, 0);
        assert_eq!(dep.src_stage_mask, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(dep.dst_stage_mask, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert!(dep.src_access_mask.is_empty());
        assert_eq!(dep.dst_access_mask, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
    }

    #[test]
    fn viewport_and_scissor_cover_the_extent() {
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let s = FixedFunctionState::for_extent(extent);
        assert_eq!((s.viewport.width, s.viewport.height), (800.0, 600.0));
        assert_eq!((s.viewport.min_depth, s.viewport.max_depth), (0.0, 1.0));
        assert_eq!(s.scissor.extent, extent);
        assert_eq!(s.scissor.offset, vk::Offset2D { x: 0, y: 0 });
    }

    #[test]
    fn rasterizer_culls_back_faces_clockwise() {
        let s = FixedFunctionState::for_extent(vk::Extent2D {
            width: 1,
            height: 1,
        });
        assert_eq!(s.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(s.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(s.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(s.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(s.samples, vk::SampleCountFlags::TYPE_1);
    }

    #[test]
    fn blending_is_straight_replace() {
        let s = FixedFunctionState::for_extent(vk::Extent2D {
            width: 1,
            height: 1,
        });
        assert_eq!(s.blend.blend_enable, vk::FALSE);
        assert_eq!(s.blend.color_write_mask, vk::ColorComponentFlags::RGBA);
    }
}
