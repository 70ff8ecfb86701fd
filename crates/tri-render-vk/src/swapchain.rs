// SPDX-License-Identifier: CEPL-1.0
//! Swapchain negotiation and the image views over its images.
use crate::device::QueueFamilies;
use crate::error::{Result, VkError, VkResultExt};
use ash::khr::{surface, swapchain};
use ash::vk;
use tracing::info;
use tri_render::RenderSize;

#[derive(Clone, Debug)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub unsafe fn query(
        surface_loader: &surface::Instance,
        phys: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        Ok(SwapchainSupport {
            capabilities: surface_loader
                .get_physical_device_surface_capabilities(phys, surface)
                .during("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?,
            formats: surface_loader
                .get_physical_device_surface_formats(phys, surface)
                .during("vkGetPhysicalDeviceSurfaceFormatsKHR")?,
            present_modes: surface_loader
                .get_physical_device_surface_present_modes(phys, surface)
                .during("vkGetPhysicalDeviceSurfacePresentModesKHR")?,
        })
    }

    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// BGRA8 UNORM in sRGB non-linear space if offered, otherwise whatever the
/// driver lists first. `formats` must not be empty.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_UNORM
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or(formats[0])
}

/// MAILBOX if available; FIFO is the one mode every driver must support.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// `current_extent` unless the surface reports the `u32::MAX` sentinel, in
/// which case the window size is clamped into the allowed range.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 == "no max").
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        wanted
    } else {
        wanted.min(caps.max_image_count)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sharing {
    Exclusive,
    /// Images are used by both families without ownership transfers.
    Concurrent([u32; 2]),
}

impl Sharing {
    pub fn for_families(families: QueueFamilies) -> Self {
        if families.is_shared() {
            Sharing::Exclusive
        } else {
            Sharing::Concurrent([families.graphics, families.present])
        }
    }

    pub fn mode(&self) -> vk::SharingMode {
        match self {
            Sharing::Exclusive => vk::SharingMode::EXCLUSIVE,
            Sharing::Concurrent(_) => vk::SharingMode::CONCURRENT,
        }
    }

    pub fn family_indices(&self) -> &[u32] {
        match self {
            Sharing::Exclusive => &[],
            Sharing::Concurrent(families) => families,
        }
    }
}

/// The negotiated swapchain parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapchainDescriptor {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub sharing: Sharing,
}

impl SwapchainDescriptor {
    /// Fails with `NoSuitableDevice` when the surface offers no format or no
    /// present mode.
    pub fn negotiate(support: &SwapchainSupport, window: RenderSize, families: QueueFamilies) -> Result<Self> {
        if !support.is_adequate() {
            return Err(VkError::NoSuitableDevice);
        }
        let caps = &support.capabilities;
        Ok(SwapchainDescriptor {
            format: choose_surface_format(&support.formats),
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(caps, window),
            image_count: choose_image_count(caps),
            pre_transform: caps.current_transform,
            sharing: Sharing::for_families(families),
        })
    }

    pub fn create_info(&self, surface: vk::SurfaceKHR) -> vk::SwapchainCreateInfoKHR<'_> {
        vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(self.image_count)
            .image_format(self.format.format)
            .image_color_space(self.format.color_space)
            .image_extent(self.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(self.sharing.mode())
            .queue_family_indices(self.sharing.family_indices())
            .pre_transform(self.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
    }
}

pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    /// Owned by the presentation engine; never destroyed by us.
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
}

pub unsafe fn create_swapchain(
    device: &ash::Device,
    swapchain_loader: &swapchain::Device,
    surface: vk::SurfaceKHR,
    desc: &SwapchainDescriptor,
) -> Result<Swapchain> {
    info!(
        "swapchain: format {:?} / {:?}, present_mode {:?}, extent {}x{}, images(requested={}), sharing {:?}",
        desc.format.format,
        desc.format.color_space,
        desc.present_mode,
        desc.extent.width,
        desc.extent.height,
        desc.image_count,
        desc.sharing,
    );

    let handle = swapchain_loader
        .create_swapchain(&desc.create_info(surface), None)
        .during("vkCreateSwapchainKHR")?;
    // The driver may hand back more images than requested.
    let images = swapchain_loader
        .get_swapchain_images(handle)
        .during("vkGetSwapchainImagesKHR")?;
    info!("swapchain images: {}", images.len());

    let image_views = create_image_views(device, &images, desc.format.format)?;

    Ok(Swapchain {
        handle,
        format: desc.format.format,
        extent: desc.extent,
        images,
        image_views,
    })
}

pub fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

pub unsafe fn create_image_views(
    device: &ash::Device,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());
    for &image in images {
        let info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(color_subresource_range());
        views.push(
            device
                .create_image_view(&info, None)
                .during("vkCreateImageView")?,
        );
    }
    Ok(views)
}
