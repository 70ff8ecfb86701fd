// SPDX-License-Identifier: CEPL-1.0
//! Windowing glue. winit is re-exported so the app crate never names it
//! directly.
pub use winit;

use anyhow::Result;
use serde::Deserialize;
use tracing::info;
use winit::dpi::LogicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// The swapchain is never recreated, so resizing stays off unless asked for.
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            title: "Vulkan".to_owned(),
            width: 800,
            height: 600,
            resizable: false,
        }
    }
}

pub fn window_attributes(cfg: &WindowConfig) -> WindowAttributes {
    Window::default_attributes()
        .with_title(cfg.title.clone())
        .with_inner_size(LogicalSize::new(cfg.width.max(1), cfg.height.max(1)))
        .with_resizable(cfg.resizable)
}

pub fn create_window(event_loop: &ActiveEventLoop, cfg: &WindowConfig) -> Result<Window> {
    let window = event_loop.create_window(window_attributes(cfg))?;
    let size = window.inner_size();
    info!(
        "window \"{}\" created ({}x{} physical)",
        cfg.title, size.width, size.height
    );
    Ok(window)
}

/// Size of the drawable area in physical pixels, never zero.
pub fn framebuffer_size(window: &Window) -> (u32, u32) {
    let size = window.inner_size();
    (size.width.max(1), size.height.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_fixed_800x600_window() {
        let cfg = WindowConfig::default();
        assert_eq!((cfg.width, cfg.height), (800, 600));
        assert_eq!(cfg.title, "Vulkan");
        assert!(!cfg.resizable);
    }

    #[test]
    fn attributes_carry_title_and_resizable() {
        let cfg = WindowConfig {
            title: "tri".into(),
            ..WindowConfig::default()
        };
        let attrs = window_attributes(&cfg);
        assert_eq!(attrs.title, "tri");
        assert!(!attrs.resizable);
        assert!(attrs.inner_size.is_some());
    }
}
