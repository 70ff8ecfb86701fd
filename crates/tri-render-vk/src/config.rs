// SPDX-License-Identifier: CEPL-1.0
use ash::khr::swapchain;
use std::ffi::CStr;
use std::path::PathBuf;

pub const KHRONOS_VALIDATION: &CStr = c"VK_LAYER_KHRONOS_validation";

pub const APP_NAME: &CStr = c"Hello Triangle";
pub const ENGINE_NAME: &CStr = c"No Engine";

/// Immutable bootstrap settings, fixed for the lifetime of a renderer.
#[derive(Clone, Debug)]
pub struct VkConfig {
    /// Enables validation layers and the debug-utils messenger.
    pub validation: bool,
    pub validation_layers: Vec<&'static CStr>,
    pub device_extensions: Vec<&'static CStr>,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for VkConfig {
    fn default() -> Self {
        VkConfig {
            validation: cfg!(debug_assertions),
            validation_layers: vec![KHRONOS_VALIDATION],
            device_extensions: vec![swapchain::NAME],
            vertex_shader: PathBuf::from("shaders/vert.spv"),
            fragment_shader: PathBuf::from("shaders/frag.spv"),
        }
    }
}

impl VkConfig {
    /// Layers to enable on the instance (and mirrored on the device).
    pub fn enabled_layers(&self) -> &[&'static CStr] {
        if self.validation {
            &self.validation_layers
        } else {
            &[]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swapchain_is_always_a_device_extension() {
        assert_eq!(VkConfig::default().device_extensions, vec![swapchain::NAME]);
    }

    #[test]
    fn layers_follow_the_validation_flag() {
        let mut cfg = VkConfig {
            validation: true,
            ..VkConfig::default()
        };
        assert_eq!(cfg.enabled_layers(), &[KHRONOS_VALIDATION]);
        cfg.validation = false;
        assert!(cfg.enabled_layers().is_empty());
    }
}
