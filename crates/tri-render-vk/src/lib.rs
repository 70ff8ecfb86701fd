// SPDX-License-Identifier: CEPL-1.0
//! Vulkan bootstrap for a single hard-coded triangle.
pub mod capabilities;
pub mod commands;
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod swapchain;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use tracing::{debug, info, warn};
use tri_render::{RenderSize, Renderer};

use ash::khr::{surface, swapchain as khr_swapchain};
use ash::{vk, Entry, Instance};

pub use config::VkConfig;
pub use error::{CapabilityKind, VkError};
pub use frame::FrameStatus;

use commands::TriangleDraw;
use device::Queues;
use error::{Result, VkResultExt};
use frame::{FrameContext, FrameSync};
use instance::{DebugMessenger, InstancePlan};
use pipeline::{FixedFunctionState, Pipeline, RenderPassLayout};
use swapchain::{Swapchain, SwapchainDescriptor};

pub struct VkRenderer {
    _entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,

    device: ash::Device,
    queues: Queues,

    swapchain_loader: khr_swapchain::Device,
    swapchain: Swapchain,

    render_pass: vk::RenderPass,
    pipeline: Pipeline,
    framebuffers: Vec<vk::Framebuffer>,

    cmd_pool: vk::CommandPool,
    cmd_bufs: Vec<vk::CommandBuffer>,

    sync: FrameSync,
    degraded: bool,
}

impl VkRenderer {
    /// Acquires, submits and presents one frame.
    pub fn draw_frame(&mut self) -> Result<FrameStatus> {
        let ctx = FrameContext {
            device: &self.device,
            swapchain_loader: &self.swapchain_loader,
            swapchain: self.swapchain.handle,
            queues: self.queues,
            command_buffers: &self.cmd_bufs,
            sync: &self.sync,
        };
        let status = unsafe { frame::draw_frame(&ctx)? };

        if status != FrameStatus::Presented && !self.degraded {
            // The swapchain is never rebuilt, so this holds for the rest of the run.
            warn!("swapchain no longer matches the surface ({:?}); continuing without recreation", status);
            self.degraded = true;
        }
        if status != FrameStatus::Presented {
            debug!("frame status: {:?}", status);
        }
        Ok(status)
    }
}

impl Drop for VkRenderer {
    fn drop(&mut self) {
        unsafe {
            let d = &self.device;
            d.device_wait_idle().ok();

            self.sync.destroy(d);
            // Frees the command buffers with it.
            d.destroy_command_pool(self.cmd_pool, None);
            for &fb in &self.framebuffers {
                d.destroy_framebuffer(fb, None);
            }
            self.pipeline.destroy(d);
            d.destroy_render_pass(self.render_pass, None);
            for &iv in &self.swapchain.image_views {
                d.destroy_image_view(iv, None);
            }
            self.swapchain_loader
                .destroy_swapchain(self.swapchain.handle, None);
            d.destroy_device(None);

            self.surface_loader.destroy_surface(self.surface, None);
            if let Some(messenger) = &self.debug {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan renderer torn down");
    }
}

unsafe fn build_renderer(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    size: RenderSize,
    cfg: &VkConfig,
) -> Result<VkRenderer> {
    // Shader bytes first: a missing file should not cost a device.
    let vert_code = shader::load_spirv(&cfg.vertex_shader)?;
    let frag_code = shader::load_spirv(&cfg.fragment_shader)?;

    let entry = Entry::load()?;

    let dh: RawDisplayHandle = display.display_handle()?.as_raw();
    let wh: RawWindowHandle = window.window_handle()?.as_raw();

    let available_exts = capabilities::available_instance_extensions(&entry)?;
    capabilities::log_names("Available extensions", &available_exts);

    let windowing = capabilities::windowing_extensions(dh)?;
    let plan = InstancePlan::new(cfg, &windowing);
    capabilities::log_names("Required extensions", &plan.extensions);
    capabilities::ensure_available(CapabilityKind::InstanceExtension, &plan.extensions, &available_exts)?;

    if !plan.layers.is_empty() {
        let available_layers = capabilities::available_layers(&entry)?;
        capabilities::ensure_available(CapabilityKind::InstanceLayer, &plan.layers, &available_layers)?;
    }

    let instance = instance::create_instance(&entry, &plan)?;
    let debug = match &plan.messenger {
        Some(m) => Some(DebugMessenger::new(&entry, &instance, m)?),
        None => None,
    };

    let surface = ash_window::create_surface(&entry, &instance, dh, wh, None)
        .during("ash_window::create_surface")?;
    let surface_loader = surface::Instance::new(&entry, &instance);

    let selected = device::pick_physical_device(&instance, &surface_loader, surface, cfg)?;
    let (device, queues) = device::create_logical_device(&instance, &selected, cfg)?;

    let desc = SwapchainDescriptor::negotiate(&selected.swapchain, size, selected.families)?;
    let swapchain_loader = khr_swapchain::Device::new(&instance, &device);
    let swapchain = swapchain::create_swapchain(&device, &swapchain_loader, surface, &desc)?;

    let render_pass = pipeline::create_render_pass(&device, &RenderPassLayout::for_format(swapchain.format))?;
    let state = FixedFunctionState::for_extent(swapchain.extent);
    let pipeline = pipeline::create_graphics_pipeline(&device, render_pass, &state, &vert_code, &frag_code)?;

    let framebuffers = commands::create_framebuffers(&device, render_pass, &swapchain.image_views, swapchain.extent)?;
    let cmd_pool = commands::create_command_pool(&device, selected.families.graphics)?;
    let cmd_bufs = commands::allocate_command_buffers(&device, cmd_pool, framebuffers.len())?;
    let draw = TriangleDraw {
        render_pass,
        pipeline: pipeline.handle,
        extent: swapchain.extent,
    };
    commands::record_command_buffers(&device, &cmd_bufs, &framebuffers, &draw)?;

    let sync = FrameSync::new(&device)?;

    Ok(VkRenderer {
        _entry: entry,
        instance,
        debug,
        surface_loader,
        surface,
        device,
        queues,
        swapchain_loader,
        swapchain,
        render_pass,
        pipeline,
        framebuffers,
        cmd_pool,
        cmd_bufs,
        sync,
        degraded: false,
    })
}

impl Renderer for VkRenderer {
    type Config = VkConfig;

    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        config: &VkConfig,
    ) -> anyhow::Result<Self> {
        let r = unsafe { build_renderer(window, display, size, config)? };
        info!(
            "Vulkan swapchain ready ({}x{}, fmt 0x{:x}, {} images)",
            r.swapchain.extent.width,
            r.swapchain.extent.height,
            r.swapchain.format.as_raw(),
            r.swapchain.images.len()
        );
        Ok(r)
    }

    fn render(&mut self) -> anyhow::Result<()> {
        self.draw_frame()?;
        Ok(())
    }
}
