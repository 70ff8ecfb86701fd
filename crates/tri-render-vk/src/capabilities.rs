// SPDX-License-Identifier: CEPL-1.0
//! Instance-level extension and layer negotiation.
use crate::error::{CapabilityKind, Result, VkError, VkResultExt};
use ash::{vk, Entry};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString};
use tracing::info;

/// Extensions the windowing system needs to create a surface for `display`.
pub fn windowing_extensions(display: RawDisplayHandle) -> Result<Vec<&'static CStr>> {
    let raw = ash_window::enumerate_required_extensions(display)
        .during("ash_window::enumerate_required_extensions")?;
    // SAFETY: ash-window hands out pointers to 'static, NUL-terminated names.
    Ok(raw
        .iter()
        .map(|&p| unsafe { CStr::from_ptr(p) })
        .collect())
}

/// The full instance extension list: windowing first, debug-utils last.
pub fn required_instance_extensions(
    windowing: &[&'static CStr],
    debug: bool,
) -> Vec<&'static CStr> {
    let mut exts = windowing.to_vec();
    if debug && !exts.contains(&ash::ext::debug_utils::NAME) {
        exts.push(ash::ext::debug_utils::NAME);
    }
    exts
}

pub fn extension_names(props: &[vk::ExtensionProperties]) -> Vec<CString> {
    props
        .iter()
        .filter_map(|p| p.extension_name_as_c_str().ok())
        .map(CStr::to_owned)
        .collect()
}

pub fn layer_names(props: &[vk::LayerProperties]) -> Vec<CString> {
    props
        .iter()
        .filter_map(|p| p.layer_name_as_c_str().ok())
        .map(CStr::to_owned)
        .collect()
}

pub unsafe fn available_instance_extensions(entry: &Entry) -> Result<Vec<CString>> {
    let props = entry
        .enumerate_instance_extension_properties(None)
        .during("vkEnumerateInstanceExtensionProperties")?;
    Ok(extension_names(&props))
}

pub unsafe fn available_layers(entry: &Entry) -> Result<Vec<CString>> {
    let props = entry
        .enumerate_instance_layer_properties()
        .during("vkEnumerateInstanceLayerProperties")?;
    Ok(layer_names(&props))
}

/// Required names absent from `available`, in `required` order.
pub fn missing<'a, S: AsRef<CStr>>(required: &[&'a CStr], available: &[S]) -> Vec<&'a CStr> {
    required
        .iter()
        .copied()
        .filter(|r| !available.iter().any(|a| a.as_ref() == *r))
        .collect()
}

pub fn is_satisfied<S: AsRef<CStr>>(required: &[&CStr], available: &[S]) -> bool {
    missing(required, available).is_empty()
}

pub fn ensure_available<S: AsRef<CStr>>(
    kind: CapabilityKind,
    required: &[&CStr],
    available: &[S],
) -> Result<()> {
    let missing = missing(required, available);
    if missing.is_empty() {
        return Ok(());
    }
    Err(VkError::Unsatisfied {
        kind,
        missing: missing
            .iter()
            .map(|m| m.to_string_lossy().into_owned())
            .collect(),
    })
}

pub fn log_names<S: AsRef<CStr>>(label: &str, names: &[S]) {
    info!("{}: {}", label, names.len());
    for n in names {
        info!("    {}", n.as_ref().to_string_lossy());
    }
}
