// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::Result;
use clap::Parser;
use ember_core::{init_tracing, load_toml_or_default};
use ember_render_vk::{BootstrapConfig, BootstrapError, DeviceRequirements, RenderSize, VkContext};
use tracing::{error, info, warn};

use ember_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use serde::Deserialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file to read
    #[arg(long, default_value = "ember.toml")]
    config: PathBuf,
    /// Never request the validation layer
    #[arg(long)]
    no_validation: bool,
    /// Retry with any device class if no device meets the requirements
    #[arg(long)]
    relax_device: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct WindowCfg {
    title: String,
    width: u32,
    height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "ember".to_string(),
            width: 512,
            height: 512,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RecoveryCfg {
    relax_device_requirements: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct AppCfg {
    window: WindowCfg,
    vulkan: BootstrapConfig,
    app: RecoveryCfg,
}

/// Adjusts `cfg` for one degraded retry after `err`. Returns false when the error is final.
fn degrade(err: &BootstrapError, cfg: &mut BootstrapConfig, relax_allowed: bool) -> bool {
    match err {
        BootstrapError::LayerUnavailable(layer) if cfg.instance.validation => {
            warn!("{layer} not installed; continuing without validation");
            cfg.instance.validation = false;
            true
        }
        BootstrapError::NoSuitableDevice { candidates }
            if relax_allowed && cfg.device != DeviceRequirements::relaxed() =>
        {
            warn!("no device out of {candidates} meets {:?}; accepting any device", cfg.device);
            cfg.device = DeviceRequirements::relaxed();
            true
        }
        _ => false,
    }
}

fn bootstrap(
    window: &Window,
    size: RenderSize,
    base: &BootstrapConfig,
    relax_allowed: bool,
) -> Result<VkContext, BootstrapError> {
    let mut cfg = base.clone();
    loop {
        match VkContext::new(window, window, size, &cfg) {
            Ok(ctx) => return Ok(ctx),
            Err(e) if degrade(&e, &mut cfg, relax_allowed) => continue,
            Err(e) => return Err(e),
        }
    }
}

struct App {
    cfg: AppCfg,
    relax_device: bool,
    window: Option<Window>,
    context: Option<VkContext>,
    failed: bool,
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, e: BootstrapError) {
        error!(stage = %e.stage(), "vulkan {} stage failed: {e}", e.stage());
        self.failed = true;
        self.context = None;
        self.window = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        if self.window.is_some() {
            return;
        }

        let w = &self.cfg.window;
        let window = match ember_platform::create_window(event_loop, &w.title, w.width, w.height) {
            Ok(window) => window,
            Err(e) => {
                error!("{e:#}");
                self.failed = true;
                event_loop.exit();
                return;
            }
        };

        let inner = window.inner_size();
        let size = RenderSize {
            width: inner.width.max(1),
            height: inner.height.max(1),
        };

        match bootstrap(&window, size, &self.cfg.vulkan, self.relax_device) {
            Ok(ctx) => {
                let sc = ctx.swapchain();
                info!(
                    "ready: {} | {}x{} {:?} {:?} | {} image(s) | validation messages {}",
                    ctx.physical_device().name,
                    sc.extent().width,
                    sc.extent().height,
                    sc.format(),
                    sc.present_mode(),
                    sc.images().len(),
                    if ctx.debug_messenger_active() { "on" } else { "off" }
                );
                self.context = Some(ctx);
                self.window = Some(window);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.context = None;
                self.window = None;
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                let size = RenderSize {
                    width: new_size.width,
                    height: new_size.height,
                };
                let result = match &mut self.context {
                    Some(ctx) => ctx.resize(size),
                    None => Ok(()),
                };
                if let Err(e) = result {
                    self.fail(event_loop, e);
                }
            }

            _ => {}
        }
    }
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let args = Args::parse();

    let mut cfg: AppCfg = load_toml_or_default(&args.config);
    if args.no_validation {
        cfg.vulkan.instance.validation = false;
    }
    let relax_device = args.relax_device || cfg.app.relax_device_requirements;

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App {
        cfg,
        relax_device,
        window: None,
        context: None,
        failed: false,
    };
    event_loop.run_app(&mut app)?;

    Ok(if app.failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
