// SPDX-License-Identifier: CEPL-1.0
use ash::khr::surface;
use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::error::{BootstrapError, Stage};
use crate::instance::Instance;
use crate::swapchain::SwapchainSupport;

/// Presentation surface bound to a platform window.
pub struct Surface {
  loader: surface::Instance,
  handle: vk::SurfaceKHR,
}

impl Drop for Surface {
  fn drop(&mut self) {
    unsafe { self.loader.destroy_surface(self.handle, None) };
  }
}

impl Surface {
  pub fn new(
    instance: &Instance,
    display: RawDisplayHandle,
    window: RawWindowHandle,
  ) -> Result<Self, BootstrapError> {
    let handle = unsafe { ash_window::create_surface(instance.entry(), instance.handle(), display, window, None) }
      .map_err(BootstrapError::SurfaceCreation)?;
    let loader = surface::Instance::new(instance.entry(), instance.handle());
    Ok(Surface { loader, handle })
  }

  pub fn handle(&self) -> vk::SurfaceKHR {
    self.handle
  }

  pub fn supports_present(&self, physical: vk::PhysicalDevice, family: u32) -> VkResult<bool> {
    unsafe { self.loader.get_physical_device_surface_support(physical, family, self.handle) }
  }

  /// Capabilities, formats and present modes for `physical` on this surface.
  pub fn query_support(&self, physical: vk::PhysicalDevice) -> Result<SwapchainSupport, BootstrapError> {
    let err = |result: vk::Result| BootstrapError::SurfaceQuery { stage: Stage::Swapchain, result };
    unsafe {
      Ok(SwapchainSupport {
        capabilities: self
          .loader
          .get_physical_device_surface_capabilities(physical, self.handle)
          .map_err(err)?,
        formats: self
          .loader
          .get_physical_device_surface_formats(physical, self.handle)
          .map_err(err)?,
        present_modes: self
          .loader
          .get_physical_device_surface_present_modes(physical, self.handle)
          .map_err(err)?,
      })
    }
  }
}
