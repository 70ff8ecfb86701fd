// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = VkError> = std::result::Result<T, E>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapabilityKind {
    InstanceExtension,
    InstanceLayer,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CapabilityKind::InstanceExtension => "instance extensions",
            CapabilityKind::InstanceLayer => "validation layers",
        })
    }
}

/// Every failure in the bootstrap and frame loop. None of them are retried.
#[derive(Debug, Error)]
pub enum VkError {
    #[error("loading the Vulkan library: {0}")]
    Loader(#[from] ash::LoadingError),

    #[error("required {kind} not available: {}", .missing.join(", "))]
    Unsatisfied {
        kind: CapabilityKind,
        missing: Vec<String>,
    },

    #[error("{what} failed: {result}")]
    Vk {
        what: &'static str,
        result: vk::Result,
    },

    #[error("no Vulkan physical devices found")]
    NoDevices,

    #[error("no physical device offers graphics + present queues, the required extensions and a usable swapchain")]
    NoSuitableDevice,

    #[error("reading shader {path}: {source}")]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shader {path} is empty")]
    EmptyShader { path: PathBuf },

    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("{stage} failed during frame: {result}")]
    Frame {
        stage: &'static str,
        result: vk::Result,
    },
}

/// Tags a raw `vk::Result` with the call that produced it.
pub trait VkResultExt<T> {
    fn during(self, what: &'static str) -> Result<T>;
}

impl<T> VkResultExt<T> for std::result::Result<T, vk::Result> {
    fn during(self, what: &'static str) -> Result<T> {
        self.map_err(|result| VkError::Vk { what, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsatisfied_lists_every_missing_name() {
        let err = VkError::Unsatisfied {
            kind: CapabilityKind::InstanceLayer,
            missing: vec!["VK_LAYER_A".into(), "VK_LAYER_B".into()],
        };
        assert_eq!(
            err.to_string(),
            "required validation layers not available: VK_LAYER_A, VK_LAYER_B"
        );
    }

    #[test]
    fn during_names_the_failing_call() {
        let r: std::result::Result<(), vk::Result> = Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        let err = r.during("vkCreateRenderPass").unwrap_err();
        assert!(matches!(
            err,
            VkError::Vk {
                what: "vkCreateRenderPass",
                result: vk::Result::ERROR_OUT_OF_HOST_MEMORY
            }
        ));
    }

    #[test]
    fn window_handle_error_keeps_its_source() {
        let err: VkError = raw_window_handle::HandleError::Unavailable.into();
        assert!(matches!(err, VkError::WindowHandle(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
