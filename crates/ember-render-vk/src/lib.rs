// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Vulkan device bootstrap: instance, device selection, queue families,
//! logical device and swapchain, in that order.

pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod instance;
pub mod physical_device;
pub mod queue;
pub mod surface;
pub mod swapchain;

pub use config::{BootstrapConfig, DeviceKind, DeviceRequirements, InstanceConfig, PresentModePreference, SwapchainConfig};
pub use context::VkContext;
pub use error::{BootstrapError, Stage};
pub use physical_device::{DeviceRequirement, PhysicalDeviceDescriptor};
pub use queue::{QueueFamilyIndices, ResolvedQueueFamilies};
pub use swapchain::Swapchain;

pub use ash;

/// Desired swapchain size, usually the window's inner size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
  pub width: u32,
  pub height: u32,
}

impl RenderSize {
  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }
}
