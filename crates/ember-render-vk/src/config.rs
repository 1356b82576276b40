// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use serde::Deserialize;

/// Everything the bootstrap needs besides the window itself.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
  pub instance: InstanceConfig,
  pub device: DeviceRequirements,
  pub swapchain: SwapchainConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
  pub app_name: String,
  /// Enables `VK_LAYER_KHRONOS_validation` and the debug messenger.
  pub validation: bool,
}

impl Default for InstanceConfig {
  fn default() -> Self {
    InstanceConfig {
      app_name: "Ember".to_string(),
      validation: cfg!(debug_assertions),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
  Discrete,
  Integrated,
  Virtual,
  Cpu,
  Other,
}

impl DeviceKind {
  pub fn matches(self, ty: vk::PhysicalDeviceType) -> bool {
    let want = match self {
      DeviceKind::Discrete => vk::PhysicalDeviceType::DISCRETE_GPU,
      DeviceKind::Integrated => vk::PhysicalDeviceType::INTEGRATED_GPU,
      DeviceKind::Virtual => vk::PhysicalDeviceType::VIRTUAL_GPU,
      DeviceKind::Cpu => vk::PhysicalDeviceType::CPU,
      DeviceKind::Other => vk::PhysicalDeviceType::OTHER,
    };
    want == ty
  }
}

/// Capability predicate for physical device selection.
///
/// An empty `device_types` list accepts any device class.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceRequirements {
  pub device_types: Vec<DeviceKind>,
  pub geometry_shader: bool,
}

impl Default for DeviceRequirements {
  fn default() -> Self {
    DeviceRequirements {
      device_types: vec![DeviceKind::Discrete],
      geometry_shader: true,
    }
  }
}

impl DeviceRequirements {
  /// Accepts any device.
  pub fn relaxed() -> Self {
    DeviceRequirements {
      device_types: Vec::new(),
      geometry_shader: false,
    }
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePreference {
  #[default]
  Mailbox,
  Immediate,
  FifoRelaxed,
  Fifo,
}

impl PresentModePreference {
  pub fn to_vk(self) -> vk::PresentModeKHR {
    match self {
      PresentModePreference::Mailbox => vk::PresentModeKHR::MAILBOX,
      PresentModePreference::Immediate => vk::PresentModeKHR::IMMEDIATE,
      PresentModePreference::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
      PresentModePreference::Fifo => vk::PresentModeKHR::FIFO,
    }
  }
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SwapchainConfig {
  /// Tried first; FIFO is the fallback.
  pub present_mode: PresentModePreference,
}
