// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use tracing::{debug, info};

use crate::config::DeviceRequirements;
use crate::error::{BootstrapError, Stage};
use crate::instance::fixed_cstr;

/// Read-only snapshot of one physical device, taken at enumeration time.
#[derive(Clone, Debug)]
pub struct PhysicalDeviceDescriptor {
  pub handle: vk::PhysicalDevice,
  pub name: String,
  pub properties: vk::PhysicalDeviceProperties,
  pub features: vk::PhysicalDeviceFeatures,
  pub memory: vk::PhysicalDeviceMemoryProperties,
  pub queue_families: Vec<vk::QueueFamilyProperties>,
}

impl PhysicalDeviceDescriptor {
  fn describe(instance: &ash::Instance, handle: vk::PhysicalDevice) -> Self {
    let (properties, features, memory, queue_families) = unsafe {
      (
        instance.get_physical_device_properties(handle),
        instance.get_physical_device_features(handle),
        instance.get_physical_device_memory_properties(handle),
        instance.get_physical_device_queue_family_properties(handle),
      )
    };
    let name = fixed_cstr(&properties.device_name).to_string_lossy().into_owned();
    PhysicalDeviceDescriptor { handle, name, properties, features, memory, queue_families }
  }

  pub fn device_type(&self) -> vk::PhysicalDeviceType {
    self.properties.device_type
  }

  fn log_summary(&self) {
    let p = &self.properties;
    debug!(
      "device \"{}\": {:?}, API {}.{}.{}, driver 0x{:x}, vendor 0x{:04x}, id 0x{:04x}, {} memory heap(s)",
      self.name,
      p.device_type,
      vk::api_version_major(p.api_version),
      vk::api_version_minor(p.api_version),
      vk::api_version_patch(p.api_version),
      p.driver_version,
      p.vendor_id,
      p.device_id,
      self.memory.memory_heap_count,
    );
    for (i, q) in self.queue_families.iter().enumerate() {
      debug!(
        "  queue family #{i}: {:?} x{}, timestamp bits {}, granularity {}x{}x{}",
        q.queue_flags,
        q.queue_count,
        q.timestamp_valid_bits,
        q.min_image_transfer_granularity.width,
        q.min_image_transfer_granularity.height,
        q.min_image_transfer_granularity.depth,
      );
    }
  }
}

/// Capability predicate deciding whether a device is acceptable.
pub trait DeviceRequirement {
  fn is_satisfied_by(&self, device: &PhysicalDeviceDescriptor) -> bool;
}

impl<F> DeviceRequirement for F
where
  F: Fn(&PhysicalDeviceDescriptor) -> bool,
{
  fn is_satisfied_by(&self, device: &PhysicalDeviceDescriptor) -> bool {
    self(device)
  }
}

impl DeviceRequirement for DeviceRequirements {
  fn is_satisfied_by(&self, device: &PhysicalDeviceDescriptor) -> bool {
    let type_ok = self.device_types.is_empty()
      || self.device_types.iter().any(|kind| kind.matches(device.device_type()));
    let geometry_ok = !self.geometry_shader || device.features.geometry_shader == vk::TRUE;
    type_ok && geometry_ok
  }
}

/// Snapshots every physical device the instance exposes.
pub fn enumerate_physical_devices(instance: &ash::Instance) -> Result<Vec<PhysicalDeviceDescriptor>, BootstrapError> {
  let handles = unsafe { instance.enumerate_physical_devices() }.map_err(|result| BootstrapError::Enumeration {
    stage: Stage::DeviceSelection,
    what: "physical device",
    result,
  })?;
  debug!("{} physical device(s) enumerated", handles.len());
  Ok(
    handles
      .into_iter()
      .map(|h| PhysicalDeviceDescriptor::describe(instance, h))
      .inspect(PhysicalDeviceDescriptor::log_summary)
      .collect(),
  )
}

/// First candidate satisfying `requirement`, in enumeration order.
pub fn select_physical_device<'a>(
  candidates: &'a [PhysicalDeviceDescriptor],
  requirement: &dyn DeviceRequirement,
) -> Result<&'a PhysicalDeviceDescriptor, BootstrapError> {
  if candidates.is_empty() {
    return Err(BootstrapError::NoDeviceFound);
  }
  let chosen = candidates
    .iter()
    .find(|d| requirement.is_satisfied_by(d))
    .ok_or(BootstrapError::NoSuitableDevice { candidates: candidates.len() })?;
  info!("selected GPU: {} ({:?})", chosen.name, chosen.device_type());
  Ok(chosen)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::DeviceKind;
  use ash::vk::Handle;

  fn device(raw: u64, ty: vk::PhysicalDeviceType, geometry_shader: bool) -> PhysicalDeviceDescriptor {
    PhysicalDeviceDescriptor {
      handle: vk::PhysicalDevice::from_raw(raw),
      name: format!("gpu{raw}"),
      properties: vk::PhysicalDeviceProperties { device_type: ty, ..Default::default() },
      features: vk::PhysicalDeviceFeatures {
        geometry_shader: if geometry_shader { vk::TRUE } else { vk::FALSE },
        ..Default::default()
      },
      memory: vk::PhysicalDeviceMemoryProperties::default(),
      queue_families: Vec::new(),
    }
  }

  #[test]
  fn no_devices_is_no_device_found() {
    let err = select_physical_device(&[], &DeviceRequirements::default()).unwrap_err();
    assert!(matches!(err, BootstrapError::NoDeviceFound));
  }

  #[test]
  fn unsatisfying_devices_are_never_returned() {
    let devices = [
      device(1, vk::PhysicalDeviceType::INTEGRATED_GPU, true),
      device(2, vk::PhysicalDeviceType::DISCRETE_GPU, false),
      device(3, vk::PhysicalDeviceType::CPU, true),
    ];
    let err = select_physical_device(&devices, &DeviceRequirements::default()).unwrap_err();
    assert!(matches!(err, BootstrapError::NoSuitableDevice { candidates: 3 }));
  }

  #[test]
  fn first_satisfying_device_wins() {
    let devices = [
      device(1, vk::PhysicalDeviceType::INTEGRATED_GPU, true),
      device(2, vk::PhysicalDeviceType::DISCRETE_GPU, true),
      device(3, vk::PhysicalDeviceType::DISCRETE_GPU, true),
    ];
    let chosen = select_physical_device(&devices, &DeviceRequirements::default()).unwrap();
    assert_eq!(chosen.handle.as_raw(), 2);
  }

  #[test]
  fn relaxed_requirements_accept_anything() {
    let devices = [device(7, vk::PhysicalDeviceType::CPU, false)];
    let chosen = select_physical_device(&devices, &DeviceRequirements::relaxed()).unwrap();
    assert_eq!(chosen.handle.as_raw(), 7);
  }

  #[test]
  fn closures_are_requirements() {
    let devices = [
      device(1, vk::PhysicalDeviceType::DISCRETE_GPU, true),
      device(2, vk::PhysicalDeviceType::INTEGRATED_GPU, false),
    ];
    let integrated = |d: &PhysicalDeviceDescriptor| d.device_type() == vk::PhysicalDeviceType::INTEGRATED_GPU;
    assert_eq!(select_physical_device(&devices, &integrated).unwrap().handle.as_raw(), 2);
  }

  #[test]
  fn capturing_closure_works_as_dyn_requirement() {
    let devices = [
      device(1, vk::PhysicalDeviceType::DISCRETE_GPU, true),
      device(2, vk::PhysicalDeviceType::DISCRETE_GPU, true),
    ];
    let wanted = String::from("gpu2");
    let by_name = move |d: &PhysicalDeviceDescriptor| d.name == wanted;
    let requirement: &dyn DeviceRequirement = &by_name;
    assert_eq!(select_physical_device(&devices, requirement).unwrap().handle.as_raw(), 2);

    let nobody: &dyn DeviceRequirement = &|_: &PhysicalDeviceDescriptor| false;
    let err = select_physical_device(&devices, nobody).unwrap_err();
    assert!(matches!(err, BootstrapError::NoSuitableDevice { candidates: 2 }));
  }

  #[test]
  fn type_list_is_any_of() {
    let req = DeviceRequirements {
      device_types: vec![DeviceKind::Discrete, DeviceKind::Integrated],
      geometry_shader: false,
    };
    assert!(req.is_satisfied_by(&device(1, vk::PhysicalDeviceType::INTEGRATED_GPU, false)));
    assert!(!req.is_satisfied_by(&device(2, vk::PhysicalDeviceType::VIRTUAL_GPU, false)));
  }
}
