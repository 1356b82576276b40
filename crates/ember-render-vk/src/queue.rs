// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use tracing::info;

use crate::error::{BootstrapError, Stage};
use crate::physical_device::PhysicalDeviceDescriptor;
use crate::surface::Surface;

/// Queue family indices found by scanning a device; `None` means no family qualified.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
  pub graphics: Option<u32>,
  pub present: Option<u32>,
}

impl QueueFamilyIndices {
  pub fn resolved(self) -> Result<ResolvedQueueFamilies, BootstrapError> {
    match (self.graphics, self.present) {
      (Some(graphics), Some(present)) => Ok(ResolvedQueueFamilies { graphics, present }),
      (g, p) => Err(BootstrapError::UnresolvedQueueFamily {
        missing_graphics: g.is_none(),
        missing_present: p.is_none(),
      }),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedQueueFamilies {
  pub graphics: u32,
  pub present: u32,
}

impl ResolvedQueueFamilies {
  pub fn is_shared(&self) -> bool {
    self.graphics == self.present
  }

  /// Each family once, graphics first.
  pub fn distinct(&self) -> Vec<u32> {
    if self.is_shared() {
      vec![self.graphics]
    } else {
      vec![self.graphics, self.present]
    }
  }
}

/// Scans every family with at least one queue; for each category the last match wins.
pub fn find_queue_families<E>(
  families: &[vk::QueueFamilyProperties],
  mut supports_present: impl FnMut(u32) -> Result<bool, E>,
) -> Result<QueueFamilyIndices, E> {
  let mut found = QueueFamilyIndices::default();
  for (i, family) in families.iter().enumerate() {
    if family.queue_count == 0 {
      continue;
    }
    let index = i as u32;
    if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
      found.graphics = Some(index);
    }
    if supports_present(index)? {
      found.present = Some(index);
    }
  }
  Ok(found)
}

/// Resolves graphics and present families of `device` for `surface`.
pub fn resolve_queue_families(
  device: &PhysicalDeviceDescriptor,
  surface: &Surface,
) -> Result<ResolvedQueueFamilies, BootstrapError> {
  let indices = find_queue_families(&device.queue_families, |i| surface.supports_present(device.handle, i))
    .map_err(|result| BootstrapError::SurfaceQuery { stage: Stage::QueueFamilies, result })?;
  let resolved = indices.resolved()?;
  info!(
    "queue families: graphics #{}, present #{}{}",
    resolved.graphics,
    resolved.present,
    if resolved.is_shared() { " (shared)" } else { "" }
  );
  Ok(resolved)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::convert::Infallible;

  fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties { queue_flags: flags, queue_count: count, ..Default::default() }
  }

  fn present_on(set: &'static [u32]) -> impl FnMut(u32) -> Result<bool, Infallible> {
    move |i| Ok(set.contains(&i))
  }

  #[test]
  fn last_matching_family_wins_per_category() {
    let families = [
      family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1),
      family(vk::QueueFlags::TRANSFER, 2),
      family(vk::QueueFlags::GRAPHICS, 1),
    ];
    let found = find_queue_families(&families, present_on(&[0, 1])).unwrap();
    assert_eq!(found, QueueFamilyIndices { graphics: Some(2), present: Some(1) });
  }

  #[test]
  fn empty_families_are_skipped() {
    let families = [family(vk::QueueFlags::GRAPHICS, 1), family(vk::QueueFlags::GRAPHICS, 0)];
    let mut queried = Vec::new();
    let found = find_queue_families(&families, |i| {
      queried.push(i);
      Ok::<_, Infallible>(true)
    })
    .unwrap();
    assert_eq!(found, QueueFamilyIndices { graphics: Some(0), present: Some(0) });
    assert_eq!(queried, vec![0]);
  }

  #[test]
  fn graphics_and_present_sources_resolve() {
    let families = [family(vk::QueueFlags::COMPUTE, 1), family(vk::QueueFlags::GRAPHICS, 1)];
    let resolved = find_queue_families(&families, present_on(&[0])).unwrap().resolved().unwrap();
    assert_eq!(resolved, ResolvedQueueFamilies { graphics: 1, present: 0 });
    assert!(!resolved.is_shared());
    assert_eq!(resolved.distinct(), vec![1, 0]);
  }

  #[test]
  fn index_zero_is_a_valid_family() {
    let families = [family(vk::QueueFlags::GRAPHICS, 4)];
    let resolved = find_queue_families(&families, present_on(&[0])).unwrap().resolved().unwrap();
    assert_eq!(resolved, ResolvedQueueFamilies { graphics: 0, present: 0 });
    assert!(resolved.is_shared());
    assert_eq!(resolved.distinct(), vec![0]);
  }

  #[test]
  fn unresolved_category_is_an_error() {
    let families = [family(vk::QueueFlags::GRAPHICS, 1)];
    let found = find_queue_families(&families, present_on(&[])).unwrap();
    assert_eq!(found, QueueFamilyIndices { graphics: Some(0), present: None });
    assert!(matches!(
      found.resolved(),
      Err(BootstrapError::UnresolvedQueueFamily { missing_graphics: false, missing_present: true })
    ));

    let found = find_queue_families(&[], present_on(&[])).unwrap();
    assert!(matches!(
      found.resolved(),
      Err(BootstrapError::UnresolvedQueueFamily { missing_graphics: true, missing_present: true })
    ));
  }

  #[test]
  fn scan_is_idempotent() {
    let families = [
      family(vk::QueueFlags::GRAPHICS, 1),
      family(vk::QueueFlags::COMPUTE, 1),
      family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1),
    ];
    let first = find_queue_families(&families, present_on(&[1, 2])).unwrap();
    let second = find_queue_families(&families, present_on(&[1, 2])).unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn present_query_errors_propagate() {
    let families = [family(vk::QueueFlags::GRAPHICS, 1)];
    let err = find_queue_families(&families, |_| Err(vk::Result::ERROR_SURFACE_LOST_KHR)).unwrap_err();
    assert_eq!(err, vk::Result::ERROR_SURFACE_LOST_KHR);
  }
}
