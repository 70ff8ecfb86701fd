// SPDX-License-Identifier: CEPL-1.0
use crate::config::{VkConfig, APP_NAME, ENGINE_NAME};
use crate::error::{Result, VkResultExt};
use ash::ext::debug_utils;
use ash::{vk, Entry, Instance};
use std::ffi::{c_char, c_void, CStr};
use tracing::{debug, error, info, trace, warn, Level};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessengerConfig {
    pub severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    pub types: vk::DebugUtilsMessageTypeFlagsEXT,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        MessengerConfig {
            severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            types: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        }
    }
}

impl MessengerConfig {
    pub fn create_info(&self) -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(self.severity)
            .message_type(self.types)
            .pfn_user_callback(Some(debug_callback))
    }
}

/// Everything needed to create the instance, resolved before touching the
/// driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstancePlan {
    pub app_name: &'static CStr,
    pub engine_name: &'static CStr,
    pub app_version: u32,
    pub engine_version: u32,
    pub api_version: u32,
    pub extensions: Vec<&'static CStr>,
    pub layers: Vec<&'static CStr>,
    pub messenger: Option<MessengerConfig>,
}

impl InstancePlan {
    pub fn new(cfg: &VkConfig, windowing: &[&'static CStr]) -> Self {
        InstancePlan {
            app_name: APP_NAME,
            engine_name: ENGINE_NAME,
            app_version: vk::make_api_version(0, 1, 0, 0),
            engine_version: vk::make_api_version(0, 1, 0, 0),
            api_version: vk::API_VERSION_1_0,
            extensions: crate::capabilities::required_instance_extensions(
                windowing,
                cfg.validation,
            ),
            layers: cfg.enabled_layers().to_vec(),
            messenger: cfg.validation.then(MessengerConfig::default),
        }
    }
}

pub unsafe fn create_instance(entry: &Entry, plan: &InstancePlan) -> Result<Instance> {
    let app_info = vk::ApplicationInfo::default()
        .application_name(plan.app_name)
        .application_version(plan.app_version)
        .engine_name(plan.engine_name)
        .engine_version(plan.engine_version)
        .api_version(plan.api_version);

    let ext_ptrs: Vec<*const c_char> = plan.extensions.iter().map(|e| e.as_ptr()).collect();
    let layer_ptrs: Vec<*const c_char> = plan.layers.iter().map(|l| l.as_ptr()).collect();

    // Chained so that vkCreateInstance/vkDestroyInstance themselves are reported.
    let mut instance_debug = plan.messenger.as_ref().map(MessengerConfig::create_info);

    let mut create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&ext_ptrs)
        .enabled_layer_names(&layer_ptrs);
    if let Some(dbg) = instance_debug.as_mut() {
        create_info = create_info.push_next(dbg);
    }

    let instance = entry
        .create_instance(&create_info, None)
        .during("vkCreateInstance")?;
    info!(
        "instance created ({} extensions, {} layers)",
        plan.extensions.len(),
        plan.layers.len()
    );
    Ok(instance)
}

/// The debug-utils function table and the messenger it created, kept together
/// so teardown never has to re-resolve anything.
pub struct DebugMessenger {
    loader: debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    pub unsafe fn new(entry: &Entry, instance: &Instance, cfg: &MessengerConfig) -> Result<Self> {
        let loader = debug_utils::Instance::new(entry, instance);
        let handle = loader
            .create_debug_utils_messenger(&cfg.create_info(), None)
            .during("vkCreateDebugUtilsMessengerEXT")?;
        Ok(DebugMessenger { loader, handle })
    }

    /// Must run before the owning instance is destroyed.
    pub unsafe fn destroy(&self) {
        self.loader.destroy_debug_utils_messenger(self.handle, None);
    }
}

pub fn level_for(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Level::ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Level::WARN
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        Level::DEBUG
    } else {
        Level::TRACE
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();

    let level = level_for(severity);
    if level == Level::ERROR {
        error!(target: "vulkan", "({:?}) {}", types, msg);
    } else if level == Level::WARN {
        warn!(target: "vulkan", "({:?}) {}", types, msg);
    } else if level == Level::DEBUG {
        debug!(target: "vulkan", "({:?}) {}", types, msg);
    } else {
        trace!(target: "vulkan", "({:?}) {}", types, msg);
    }

    // Never abort the call that triggered the message.
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    const SURFACE: &CStr = c"VK_KHR_surface";

    fn cfg(validation: bool) -> VkConfig {
        VkConfig {
            validation,
            ..VkConfig::default()
        }
    }

    #[test]
    fn no_messenger_without_validation() {
        let plan = InstancePlan::new(&cfg(false), &[SURFACE]);
        assert!(plan.messenger.is_none());
        assert!(plan.layers.is_empty());
        assert_eq!(plan.extensions, vec![SURFACE]);
    }

    #[test]
    fn validation_adds_layer_extension_and_messenger() {
        let plan = InstancePlan::new(&cfg(true), &[SURFACE]);
        assert_eq!(plan.layers, vec![crate::config::KHRONOS_VALIDATION]);
        assert_eq!(plan.extensions, vec![SURFACE, debug_utils::NAME]);
        assert_eq!(plan.messenger, Some(MessengerConfig::default()));
    }

    #[test]
    fn messenger_masks_cover_verbose_warning_error() {
        let m = MessengerConfig::default();
        assert!(m
            .severity
            .contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
        assert!(!m.severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));
        assert!(m.types.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE));
        let ci = m.create_info();
        assert!(ci.pfn_user_callback.is_some());
    }

    #[test]
    fn plan_targets_vulkan_1_0() {
        let plan = InstancePlan::new(&cfg(false), &[]);
        assert_eq!(plan.api_version, vk::API_VERSION_1_0);
        assert_eq!(plan.app_name, c"Hello Triangle");
        assert_eq!(vk::api_version_major(plan.app_version), 1);
        assert_eq!(plan.engine_name, c"No Engine");
        assert_eq!(plan.engine_version, vk::make_api_version(0, 1, 0, 0));
    }

    #[test]
    fn severities_map_to_tracing_levels() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as S;
        assert_eq!(level_for(S::ERROR), Level::ERROR);
        assert_eq!(level_for(S::WARNING), Level::WARN);
        assert_eq!(level_for(S::INFO), Level::DEBUG);
        assert_eq!(level_for(S::VERBOSE), Level::TRACE);
    }

    #[test]
    fn callback_never_aborts() {
        let data = vk::DebugUtilsMessengerCallbackDataEXT::default()
            .message(c"Validation Error: test");
        let ret = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
                &data,
                std::ptr::null_mut(),
            )
        };
        assert_eq!(ret, vk::FALSE);
    }
}
