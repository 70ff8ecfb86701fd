// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for RenderSize {
    fn from((width, height): (u32, u32)) -> Self {
        RenderSize { width, height }
    }
}

pub trait Renderer {
    type Config;

    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        config: &Self::Config,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Renders and presents one frame.
    fn render(&mut self) -> Result<()>;
}
