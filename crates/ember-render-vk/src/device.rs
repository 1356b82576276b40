// SPDX-License-Identifier: CEPL-1.0
use ash::khr::swapchain;
use ash::prelude::VkResult;
use ash::vk;
use tracing::info;

use crate::error::BootstrapError;
use crate::instance::Instance;
use crate::physical_device::PhysicalDeviceDescriptor;
use crate::queue::ResolvedQueueFamilies;

static QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// Logical device plus the graphics and present queues taken from it.
pub struct Device {
  handle: ash::Device,
  families: ResolvedQueueFamilies,
  graphics_queue: vk::Queue,
  present_queue: vk::Queue,
}

impl Drop for Device {
  fn drop(&mut self) {
    unsafe {
      self.handle.device_wait_idle().ok();
      self.handle.destroy_device(None);
    }
  }
}

/// One single-queue create entry per distinct family.
fn queue_create_infos(families: &ResolvedQueueFamilies) -> Vec<vk::DeviceQueueCreateInfo<'static>> {
  families
    .distinct()
    .into_iter()
    .map(|family| {
      vk::DeviceQueueCreateInfo::default()
        .queue_family_index(family)
        .queue_priorities(&QUEUE_PRIORITIES)
    })
    .collect()
}

impl Device {
  pub fn new(
    instance: &Instance,
    physical: &PhysicalDeviceDescriptor,
    families: ResolvedQueueFamilies,
  ) -> Result<Self, BootstrapError> {
    let queue_infos = queue_create_infos(&families);
    let extensions = [swapchain::NAME.as_ptr()];
    let features = vk::PhysicalDeviceFeatures::default();

    let create_info = vk::DeviceCreateInfo::default()
      .queue_create_infos(&queue_infos)
      .enabled_extension_names(&extensions)
      .enabled_features(&features);

    let handle = unsafe { instance.handle().create_device(physical.handle, &create_info, None) }
      .map_err(BootstrapError::DeviceCreation)?;
    let (graphics_queue, present_queue) = unsafe {
      (
        handle.get_device_queue(families.graphics, 0),
        handle.get_device_queue(families.present, 0),
      )
    };

    info!("logical device created with {} queue family(ies)", queue_infos.len());
    Ok(Device { handle, families, graphics_queue, present_queue })
  }

  pub fn handle(&self) -> &ash::Device {
    &self.handle
  }

  pub fn families(&self) -> ResolvedQueueFamilies {
    self.families
  }

  pub fn graphics_queue(&self) -> vk::Queue {
    self.graphics_queue
  }

  pub fn present_queue(&self) -> vk::Queue {
    self.present_queue
  }

  pub fn wait_idle(&self) -> VkResult<()> {
    unsafe { self.handle.device_wait_idle() }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shared_family_gets_one_entry() {
    let infos = queue_create_infos(&ResolvedQueueFamilies { graphics: 3, present: 3 });
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].queue_family_index, 3);
    assert_eq!(infos[0].queue_count, 1);
  }

  #[test]
  fn distinct_families_get_full_priority_queues() {
    let infos = queue_create_infos(&ResolvedQueueFamilies { graphics: 0, present: 2 });
    let indices: Vec<u32> = infos.iter().map(|i| i.queue_family_index).collect();
    assert_eq!(indices, vec![0, 2]);
    for info in &infos {
      assert_eq!(info.queue_count, 1);
      assert_eq!(unsafe { *info.p_queue_priorities }, 1.0);
    }
  }
}
