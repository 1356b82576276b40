// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info, warn};

use crate::config::BootstrapConfig;
use crate::device::Device;
use crate::error::BootstrapError;
use crate::instance::Instance;
use crate::physical_device::{
  enumerate_physical_devices, select_physical_device, DeviceRequirement, PhysicalDeviceDescriptor,
};
use crate::queue::{resolve_queue_families, ResolvedQueueFamilies};
use crate::surface::Surface;
use crate::swapchain::Swapchain;
use crate::RenderSize;

/// Everything the render loop needs to start drawing.
///
/// Fields drop top to bottom: views and swapchain, device, surface, instance.
pub struct VkContext {
  swapchain: Swapchain,
  device: Device,
  physical: PhysicalDeviceDescriptor,
  surface: Surface,
  instance: Instance,
  config: BootstrapConfig,
}

impl VkContext {
  /// Bootstraps with the device requirements from `config`.
  pub fn new(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    size: RenderSize,
    config: &BootstrapConfig,
  ) -> Result<Self, BootstrapError> {
    Self::with_requirement(window, display, size, config, &config.device)
  }

  /// Bootstraps with a caller-supplied device predicate; `config.device` is ignored.
  pub fn with_requirement(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    size: RenderSize,
    config: &BootstrapConfig,
    requirement: &dyn DeviceRequirement,
  ) -> Result<Self, BootstrapError> {
    let dh = display.display_handle()?.as_raw();
    let wh = window.window_handle()?.as_raw();

    let instance = Instance::new(&config.instance, dh)?;
    let surface = Surface::new(&instance, dh, wh)?;

    let candidates = enumerate_physical_devices(instance.handle())?;
    let physical = select_physical_device(&candidates, requirement)?.clone();

    let families = resolve_queue_families(&physical, &surface)?;
    let device = Device::new(&instance, &physical, families)?;
    let swapchain = Swapchain::new(&instance, &device, &physical, &surface, &config.swapchain, size)?;

    info!("Vulkan bootstrap complete on {}", physical.name);
    Ok(VkContext { swapchain, device, physical, surface, instance, config: config.clone() })
  }

  /// Rebuilds the swapchain for a new window size. Empty sizes are skipped.
  pub fn resize(&mut self, size: RenderSize) -> Result<(), BootstrapError> {
    if size.is_empty() {
      debug!("ignoring resize to {}x{}", size.width, size.height);
      return Ok(());
    }
    if let Err(e) = self.device.wait_idle() {
      warn!("device_wait_idle before resize failed: {e}");
    }
    self
      .swapchain
      .rebuild(&self.device, &self.physical, &self.surface, &self.config.swapchain, size)
  }

  pub fn instance(&self) -> &ash::Instance {
    self.instance.handle()
  }

  pub fn physical_device(&self) -> &PhysicalDeviceDescriptor {
    &self.physical
  }

  pub fn device(&self) -> &ash::Device {
    self.device.handle()
  }

  pub fn queue_families(&self) -> ResolvedQueueFamilies {
    self.device.families()
  }

  pub fn graphics_queue(&self) -> vk::Queue {
    self.device.graphics_queue()
  }

  pub fn present_queue(&self) -> vk::Queue {
    self.device.present_queue()
  }

  pub fn surface(&self) -> vk::SurfaceKHR {
    self.surface.handle()
  }

  pub fn swapchain(&self) -> &Swapchain {
    &self.swapchain
  }

  pub fn debug_messenger_active(&self) -> bool {
    self.instance.has_debug_messenger()
  }
}

impl Drop for VkContext {
  fn drop(&mut self) {
    info!("tearing down Vulkan context");
    self.device.wait_idle().ok();
  }
}
