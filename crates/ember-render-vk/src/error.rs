// SPDX-License-Identifier: CEPL-1.0
use std::fmt;

use ash::vk;
use thiserror::Error;

/// Bootstrap stage an error originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
  Instance,
  Surface,
  DeviceSelection,
  QueueFamilies,
  LogicalDevice,
  Swapchain,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Stage::Instance => "instance",
      Stage::Surface => "surface",
      Stage::DeviceSelection => "device selection",
      Stage::QueueFamilies => "queue families",
      Stage::LogicalDevice => "logical device",
      Stage::Swapchain => "swapchain",
    })
  }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
  #[error("failed to load the Vulkan library: {0}")]
  Loading(#[from] ash::LoadingError),

  #[error("application name must be non-empty and contain no NUL bytes")]
  InvalidAppName,

  #[error("instance layer {0} is not available")]
  LayerUnavailable(String),

  #[error("vkCreateInstance failed: {0}")]
  InstanceCreation(vk::Result),

  #[error("window handle unavailable: {0}")]
  WindowHandle(#[from] raw_window_handle::HandleError),

  #[error("surface creation failed: {0}")]
  SurfaceCreation(vk::Result),

  #[error("{what} enumeration failed: {result}")]
  Enumeration {
    stage: Stage,
    what: &'static str,
    result: vk::Result,
  },

  #[error("no Vulkan physical devices found")]
  NoDeviceFound,

  #[error("none of the {candidates} physical device(s) satisfy the device requirements")]
  NoSuitableDevice { candidates: usize },

  #[error("surface query failed: {result}")]
  SurfaceQuery { stage: Stage, result: vk::Result },

  #[error("no queue family supports {}", missing_families(.missing_graphics, .missing_present))]
  UnresolvedQueueFamily {
    missing_graphics: bool,
    missing_present: bool,
  },

  #[error("vkCreateDevice failed: {0}")]
  DeviceCreation(vk::Result),

  #[error("surface reports no formats")]
  NoSurfaceFormat,

  #[error("vkCreateSwapchainKHR failed: {0}")]
  SwapchainCreation(vk::Result),

  #[error("image view {index} creation failed: {result}")]
  ImageViewCreation { index: usize, result: vk::Result },
}

fn missing_families(graphics: &bool, present: &bool) -> &'static str {
  match (*graphics, *present) {
    (true, true) => "graphics or presentation",
    (true, false) => "graphics",
    _ => "presentation",
  }
}

impl BootstrapError {
  pub fn stage(&self) -> Stage {
    match self {
      BootstrapError::Loading(_)
      | BootstrapError::InvalidAppName
      | BootstrapError::LayerUnavailable(_)
      | BootstrapError::InstanceCreation(_) => Stage::Instance,
      BootstrapError::WindowHandle(_) | BootstrapError::SurfaceCreation(_) => Stage::Surface,
      BootstrapError::Enumeration { stage, .. } | BootstrapError::SurfaceQuery { stage, .. } => *stage,
      BootstrapError::NoDeviceFound | BootstrapError::NoSuitableDevice { .. } => Stage::DeviceSelection,
      BootstrapError::UnresolvedQueueFamily { .. } => Stage::QueueFamilies,
      BootstrapError::DeviceCreation(_) => Stage::LogicalDevice,
      BootstrapError::NoSurfaceFormat
      | BootstrapError::SwapchainCreation(_)
      | BootstrapError::ImageViewCreation { .. } => Stage::Swapchain,
    }
  }
}
