// SPDX-License-Identifier: CEPL-1.0
//! Physical device selection and logical device creation.
use crate::capabilities;
use crate::config::VkConfig;
use crate::error::{Result, VkError, VkResultExt};
use crate::swapchain::SwapchainSupport;
use ash::khr::surface;
use ash::{vk, Instance};
use std::ffi::{c_char, CStr};
use tracing::info;

static QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// Queue family per role, as found while scanning one device's family table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Scans the family table once, keeping the first family that satisfies
    /// each role. The two searches are independent.
    pub fn resolve<F>(families: &[vk::QueueFamilyProperties], mut supports_present: F) -> Result<Self>
    where
        F: FnMut(u32) -> Result<bool>,
    {
        let mut found = QueueFamilyIndices::default();
        for (i, family) in families.iter().enumerate() {
            let index = i as u32;
            if found.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                found.graphics = Some(index);
            }
            if found.present.is_none() && supports_present(index)? {
                found.present = Some(index);
            }
            if found.is_complete() {
                break;
            }
        }
        Ok(found)
    }

    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    pub fn complete(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// Fully resolved queue families of the selected device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// One queue-create request per distinct family: count 1, priority 1.0.
pub fn queue_create_infos(families: QueueFamilies) -> Vec<vk::DeviceQueueCreateInfo<'static>> {
    families
        .unique()
        .into_iter()
        .map(|index| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(index)
                .queue_priorities(&QUEUE_PRIORITIES)
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct DeviceCandidate {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub vendor_id: u32,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    pub families: QueueFamilyIndices,
    pub missing_extensions: Vec<String>,
    /// Only queried when every required extension is present.
    pub swapchain: Option<SwapchainSupport>,
}

impl DeviceCandidate {
    pub fn is_suitable(&self) -> bool {
        self.families.is_complete()
            && self.missing_extensions.is_empty()
            && self.swapchain.as_ref().is_some_and(SwapchainSupport::is_adequate)
    }

    fn log(&self) {
        info!(
            "device \"{}\" (vendor 0x{:04x}, {:?}, api {}.{}.{}): graphics={:?} present={:?} missing_exts={:?} suitable={}",
            self.name,
            self.vendor_id,
            self.device_type,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.families.graphics,
            self.families.present,
            self.missing_extensions,
            self.is_suitable(),
        );
    }
}

#[derive(Clone, Debug)]
pub struct SelectedDevice {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub families: QueueFamilies,
    pub swapchain: SwapchainSupport,
}

/// Last suitable candidate in enumeration order wins.
pub fn select(candidates: Vec<DeviceCandidate>) -> Result<SelectedDevice> {
    let chosen = candidates
        .into_iter()
        .filter(DeviceCandidate::is_suitable)
        .last()
        .ok_or(VkError::NoSuitableDevice)?;

    match (chosen.families.complete(), chosen.swapchain) {
        (Some(families), Some(swapchain)) => Ok(SelectedDevice {
            handle: chosen.handle,
            name: chosen.name,
            families,
            swapchain,
        }),
        _ => Err(VkError::NoSuitableDevice),
    }
}

pub unsafe fn evaluate(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
    required_extensions: &[&CStr],
) -> Result<DeviceCandidate> {
    let props = instance.get_physical_device_properties(phys);
    let name = props
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "<unnamed>".to_owned());

    let family_props = instance.get_physical_device_queue_family_properties(phys);
    let families = QueueFamilyIndices::resolve(&family_props, |index| {
        surface_loader
            .get_physical_device_surface_support(phys, index, surface)
            .during("vkGetPhysicalDeviceSurfaceSupportKHR")
    })?;

    let ext_props = instance
        .enumerate_device_extension_properties(phys)
        .during("vkEnumerateDeviceExtensionProperties")?;
    let available = capabilities::extension_names(&ext_props);
    let missing_extensions: Vec<String> = capabilities::missing(required_extensions, &available)
        .iter()
        .map(|m| m.to_string_lossy().into_owned())
        .collect();

    let swapchain = if missing_extensions.is_empty() {
        Some(SwapchainSupport::query(surface_loader, phys, surface)?)
    } else {
        None
    };

    Ok(DeviceCandidate {
        handle: phys,
        name,
        vendor_id: props.vendor_id,
        device_type: props.device_type,
        api_version: props.api_version,
        families,
        missing_extensions,
        swapchain,
    })
}

pub unsafe fn pick_physical_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    cfg: &VkConfig,
) -> Result<SelectedDevice> {
    let devices = instance
        .enumerate_physical_devices()
        .during("vkEnumeratePhysicalDevices")?;
    if devices.is_empty() {
        return Err(VkError::NoDevices);
    }
    info!("physical devices: {}", devices.len());

    let mut candidates = Vec::with_capacity(devices.len());
    for phys in devices {
        let candidate = evaluate(instance, surface_loader, surface, phys, &cfg.device_extensions)?;
        candidate.log();
        candidates.push(candidate);
    }

    let selected = select(candidates)?;
    info!(
        "selected \"{}\" (graphics family {}, present family {})",
        selected.name, selected.families.graphics, selected.families.present
    );
    Ok(selected)
}

#[derive(Clone, Copy, Debug)]
pub struct Queues {
    pub graphics: vk::Queue,
    pub present: vk::Queue,
}

pub unsafe fn create_logical_device(
    instance: &Instance,
    selected: &SelectedDevice,
    cfg: &VkConfig,
) -> Result<(ash::Device, Queues)> {
    let queue_infos = queue_create_infos(selected.families);
    let ext_ptrs: Vec<*const c_char> = cfg.device_extensions.iter().map(|e| e.as_ptr()).collect();
    // Device layers are ignored by current loaders; older ones still read them.
    let layer_ptrs: Vec<*const c_char> = cfg.enabled_layers().iter().map(|l| l.as_ptr()).collect();
    let features = vk::PhysicalDeviceFeatures::default();

    #[allow(deprecated)]
    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&ext_ptrs)
        .enabled_layer_names(&layer_ptrs)
        .enabled_features(&features);

    let device = instance
        .create_device(selected.handle, &create_info, None)
        .during("vkCreateDevice")?;

    let queues = Queues {
        graphics: device.get_device_queue(selected.families.graphics, 0),
        present: device.get_device_queue(selected.families.present, 0),
    };
    info!("logical device created with {} queue families", queue_infos.len());
    Ok((device, queues))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn adequate_support() -> SwapchainSupport {
        SwapchainSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        }
    }

    fn candidate(raw: u64) -> DeviceCandidate {
        use ash::vk::Handle;
        DeviceCandidate {
            handle: vk::PhysicalDevice::from_raw(raw),
            name: format!("gpu{raw}"),
            vendor_id: 0x10de,
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            api_version: vk::API_VERSION_1_0,
            families: QueueFamilyIndices {
                graphics: Some(0),
                present: Some(0),
            },
            missing_extensions: Vec::new(),
            swapchain: Some(adequate_support()),
        }
    }

    #[test]
    fn resolves_first_family_per_role_independently() {
        let table = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let found = QueueFamilyIndices::resolve(&table, |i| Ok(i == 0 || i == 2)).unwrap();
        assert_eq!(found.graphics, Some(1));
        assert_eq!(found.present, Some(0));
        assert!(found.is_complete());
    }

    #[test]
    fn roles_can_share_a_family() {
        let table = [family(vk::QueueFlags::GRAPHICS)];
        let found = QueueFamilyIndices::resolve(&table, |_| Ok(true)).unwrap();
        assert_eq!(found.complete(), Some(QueueFamilies { graphics: 0, present: 0 }));
    }

    #[test]
    fn incomplete_without_present_support() {
        let table = [family(vk::QueueFlags::GRAPHICS)];
        let found = QueueFamilyIndices::resolve(&table, |_| Ok(false)).unwrap();
        assert!(!found.is_complete());
        assert_eq!(found.complete(), None);
    }

    #[test]
    fn present_query_failure_propagates() {
        let table = [family(vk::QueueFlags::GRAPHICS)];
        let err = QueueFamilyIndices::resolve(&table, |_| {
            Err(VkError::Vk {
                what: "vkGetPhysicalDeviceSurfaceSupportKHR",
                result: vk::Result::ERROR_SURFACE_LOST_KHR,
            })
        })
        .unwrap_err();
        assert!(matches!(err, VkError::Vk { .. }));
    }

    #[test]
    fn shared_family_yields_one_queue_request() {
        let infos = queue_create_infos(QueueFamilies { graphics: 3, present: 3 });
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].queue_family_index, 3);
        assert_eq!(infos[0].queue_count, 1);
        let priority = unsafe { *infos[0].p_queue_priorities };
        assert_eq!(priority, 1.0);
    }

    #[test]
    fn distinct_families_yield_two_queue_requests() {
        let infos = queue_create_infos(QueueFamilies { graphics: 0, present: 2 });
        let indices: Vec<u32> = infos.iter().map(|i| i.queue_family_index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert!(infos.iter().all(|i| i.queue_count == 1));
    }

    #[test]
    fn device_without_formats_is_never_selected() {
        let mut c = candidate(1);
        c.swapchain.as_mut().unwrap().formats.clear();
        assert!(!c.is_suitable());
        assert!(matches!(select(vec![c]), Err(VkError::NoSuitableDevice)));
    }

    #[test]
    fn device_without_present_modes_is_never_selected() {
        let mut c = candidate(1);
        c.swapchain.as_mut().unwrap().present_modes.clear();
        assert!(!c.is_suitable());
    }

    #[test]
    fn device_missing_extensions_is_rejected() {
        let mut c = candidate(1);
        c.missing_extensions = vec!["VK_KHR_swapchain".into()];
        c.swapchain = None;
        assert!(!c.is_suitable());
    }

    #[test]
    fn last_suitable_candidate_wins() {
        let mut unsuitable = candidate(3);
        unsuitable.families.present = None;
        let picked = select(vec![candidate(1), candidate(2), unsuitable]).unwrap();
        assert_eq!(picked.name, "gpu2");
    }

    #[test]
    fn empty_candidate_list_has_no_suitable_device() {
        assert!(matches!(select(Vec::new()), Err(VkError::NoSuitableDevice)));
    }
}
