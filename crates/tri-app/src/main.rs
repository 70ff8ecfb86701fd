// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};
use tri_core::{init_tracing, load_config};
use tri_platform::WindowConfig;
use tri_render::{RenderSize, Renderer};
use tri_render_vk::{VkConfig, VkRenderer};

use tri_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Draws one triangle with Vulkan", long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "tri.toml")]
    config: PathBuf,
    /// Force validation layers on or off (default: on in debug builds)
    #[arg(long)]
    validation: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
struct RenderCfg {
    validation: Option<bool>,
    vertex_shader: PathBuf,
    fragment_shader: PathBuf,
}

impl Default for RenderCfg {
    fn default() -> Self {
        let vk = VkConfig::default();
        RenderCfg {
            validation: None,
            vertex_shader: vk.vertex_shader,
            fragment_shader: vk.fragment_shader,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct AppCfg {
    #[serde(default)]
    window: WindowConfig,
    #[serde(default)]
    render: RenderCfg,
}

impl AppCfg {
    /// CLI flag beats the file, the file beats the build profile.
    fn vk_config(&self, cli_validation: Option<bool>) -> VkConfig {
        let defaults = VkConfig::default();
        VkConfig {
            validation: cli_validation
                .or(self.render.validation)
                .unwrap_or(defaults.validation),
            vertex_shader: self.render.vertex_shader.clone(),
            fragment_shader: self.render.fragment_shader.clone(),
            ..defaults
        }
    }
}

struct App {
    cfg: AppCfg,
    vk_cfg: VkConfig,
    // Declared before the window so it drops first.
    renderer: Option<VkRenderer>,
    window: Option<Window>,
    fatal: Option<anyhow::Error>,

    exiting: bool,
    frames: u32,
    last_fps_instant: Instant,
}

impl App {
    fn new(cfg: AppCfg, vk_cfg: VkConfig) -> Self {
        App {
            cfg,
            vk_cfg,
            renderer: None,
            window: None,
            fatal: None,
            exiting: false,
            frames: 0,
            last_fps_instant: Instant::now(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = tri_platform::create_window(event_loop, &self.cfg.window)?;
        let size = RenderSize::from(tri_platform::framebuffer_size(&window));
        let renderer = VkRenderer::new(&window, &window, size, &self.vk_cfg)
            .context("initializing Vulkan")?;
        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.shutdown(event_loop);
        self.fatal = Some(err);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.renderer = None;
        self.window = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.exiting {
            return;
        }
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }

            WindowEvent::RedrawRequested => {
                if self.exiting {
                    return;
                }
                let Some(renderer) = &mut self.renderer else {
                    return;
                };
                match renderer.render() {
                    Ok(()) => self.frames = self.frames.saturating_add(1),
                    Err(e) => self.fail(event_loop, e.context("drawing frame")),
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        if let Some(w) = &self.window {
            w.request_redraw();
        }

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg: AppCfg = load_config(&args.config)?;
    let vk_cfg = cfg.vk_config(args.validation);
    info!("validation layers {}", if vk_cfg.validation { "on" } else { "off" });

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg, vk_cfg);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg: AppCfg = toml::from_str("").unwrap();
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.window.height, 600);
        assert_eq!(cfg.render.vertex_shader, PathBuf::from("shaders/vert.spv"));
        assert_eq!(cfg.render.validation, None);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: AppCfg = toml::from_str(
            r#"
            [window]
            title = "tri"

            [render]
            validation = false
            fragment_shader = "assets/f.spv"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "tri");
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.render.validation, Some(false));
        assert_eq!(cfg.render.fragment_shader, PathBuf::from("assets/f.spv"));
        assert_eq!(cfg.render.vertex_shader, PathBuf::from("shaders/vert.spv"));
    }

    #[test]
    fn validation_precedence() {
        let mut cfg = AppCfg::default();
        assert_eq!(cfg.vk_config(None).validation, cfg!(debug_assertions));

        cfg.render.validation = Some(true);
        assert!(cfg.vk_config(None).validation);
        assert!(!cfg.vk_config(Some(false)).validation);
    }

    #[test]
    fn shader_paths_flow_into_vk_config() {
        let mut cfg = AppCfg::default();
        cfg.render.vertex_shader = PathBuf::from("a.spv");
        let vk = cfg.vk_config(None);
        assert_eq!(vk.vertex_shader, PathBuf::from("a.spv"));
        assert_eq!(vk.device_extensions, VkConfig::default().device_extensions);
    }

    #[test]
    fn cli_parses_validation_flag() {
        let args = Args::parse_from(["tri", "--validation", "false", "--config", "x.toml"]);
        assert_eq!(args.validation, Some(false));
        assert_eq!(args.config, PathBuf::from("x.toml"));
    }
}
