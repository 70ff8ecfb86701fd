// SPDX-License-Identifier: CEPL-1.0
//! Precompiled SPIR-V loading. Nothing here compiles shaders.
use crate::error::{Result, VkError, VkResultExt};
use ash::util::read_spv;
use ash::vk;
use std::io::Cursor;
use std::path::Path;

pub fn load_spirv(path: &Path) -> Result<Vec<u32>> {
    let bytes = std::fs::read(path).map_err(|source| VkError::ShaderIo {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(VkError::EmptyShader {
            path: path.to_path_buf(),
        });
    }
    read_spv(&mut Cursor::new(&bytes[..])).map_err(|source| VkError::ShaderIo {
        path: path.to_path_buf(),
        source,
    })
}

pub unsafe fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let info = vk::ShaderModuleCreateInfo::default().code(code);
    device
        .create_shader_module(&info, None)
        .during("vkCreateShaderModule")
}
