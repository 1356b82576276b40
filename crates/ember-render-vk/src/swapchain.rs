// SPDX-License-Identifier: CEPL-1.0
use ash::khr::swapchain;
use ash::vk;
use tracing::{debug, info, warn};

use crate::config::SwapchainConfig;
use crate::device::Device;
use crate::error::BootstrapError;
use crate::instance::Instance;
use crate::physical_device::PhysicalDeviceDescriptor;
use crate::queue::ResolvedQueueFamilies;
use crate::surface::Surface;
use crate::RenderSize;

pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
  format: vk::Format::B8G8R8A8_UNORM,
  color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// What a (device, surface) pair supports. Only lives for one negotiation.
#[derive(Clone, Debug, Default)]
pub struct SwapchainSupport {
  pub capabilities: vk::SurfaceCapabilitiesKHR,
  pub formats: Vec<vk::SurfaceFormatKHR>,
  pub present_modes: Vec<vk::PresentModeKHR>,
}

pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
  formats
    .iter()
    .copied()
    .find(|f| f.format == PREFERRED_SURFACE_FORMAT.format && f.color_space == PREFERRED_SURFACE_FORMAT.color_space)
    .or_else(|| formats.first().copied())
}

/// `preferred` when reported, otherwise FIFO.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], preferred: vk::PresentModeKHR) -> vk::PresentModeKHR {
  if modes.contains(&preferred) {
    preferred
  } else {
    vk::PresentModeKHR::FIFO
  }
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
  if caps.current_extent.width != u32::MAX {
    caps.current_extent
  } else {
    vk::Extent2D {
      width: want.width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
      height: want.height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
  }
}

pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
  if caps.max_image_count == 0 {
    caps.min_image_count + 1
  } else {
    (caps.min_image_count + 1).min(caps.max_image_count)
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSharing {
  pub mode: vk::SharingMode,
  pub family_indices: Vec<u32>,
}

/// Concurrent across both families when they differ, exclusive otherwise.
pub fn image_sharing(families: &ResolvedQueueFamilies) -> ImageSharing {
  if families.is_shared() {
    ImageSharing { mode: vk::SharingMode::EXCLUSIVE, family_indices: Vec::new() }
  } else {
    ImageSharing {
      mode: vk::SharingMode::CONCURRENT,
      family_indices: vec![families.graphics, families.present],
    }
  }
}

/// Creates one `T` per item; on the first failure everything already created is destroyed.
fn create_all_or_release<I, T, E>(
  items: &[I],
  mut create: impl FnMut(&I) -> Result<T, E>,
  mut release: impl FnMut(T),
) -> Result<Vec<T>, (usize, E)> {
  let mut out = Vec::with_capacity(items.len());
  for (index, item) in items.iter().enumerate() {
    match create(item) {
      Ok(t) => out.push(t),
      Err(e) => {
        for t in out.drain(..).rev() {
          release(t);
        }
        return Err((index, e));
      }
    }
  }
  Ok(out)
}

/// Create info for one swapchain; `sharing` supplies the mode and the family list.
fn swapchain_create_info<'a>(
  surface: vk::SurfaceKHR,
  caps: &vk::SurfaceCapabilitiesKHR,
  format: vk::SurfaceFormatKHR,
  present_mode: vk::PresentModeKHR,
  extent: vk::Extent2D,
  sharing: &'a ImageSharing,
  old: vk::SwapchainKHR,
) -> vk::SwapchainCreateInfoKHR<'a> {
  vk::SwapchainCreateInfoKHR::default()
    .surface(surface)
    .min_image_count(choose_image_count(caps))
    .image_format(format.format)
    .image_color_space(format.color_space)
    .image_extent(extent)
    .image_array_layers(1)
    .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
    .image_sharing_mode(sharing.mode)
    .queue_family_indices(&sharing.family_indices)
    .pre_transform(caps.current_transform)
    .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
    .present_mode(present_mode)
    .clipped(true)
    .old_swapchain(old)
}

struct Negotiated {
  handle: vk::SwapchainKHR,
  format: vk::SurfaceFormatKHR,
  present_mode: vk::PresentModeKHR,
  extent: vk::Extent2D,
  sharing: ImageSharing,
  images: Vec<vk::Image>,
  image_views: Vec<vk::ImageView>,
}

/// Swapchain images with one color view each; `image_views[i]` views `images[i]`.
pub struct Swapchain {
  device: ash::Device,
  loader: swapchain::Device,
  handle: vk::SwapchainKHR,
  format: vk::SurfaceFormatKHR,
  present_mode: vk::PresentModeKHR,
  extent: vk::Extent2D,
  sharing: ImageSharing,
  images: Vec<vk::Image>,
  image_views: Vec<vk::ImageView>,
}

impl Drop for Swapchain {
  fn drop(&mut self) {
    unsafe { release(&self.device, &self.loader, self.handle, &self.image_views) };
  }
}

unsafe fn release(
  device: &ash::Device,
  loader: &swapchain::Device,
  handle: vk::SwapchainKHR,
  views: &[vk::ImageView],
) {
  unsafe {
    for &view in views {
      device.destroy_image_view(view, None);
    }
    if handle != vk::SwapchainKHR::null() {
      loader.destroy_swapchain(handle, None);
    }
  }
}

/// Moves the handle and views out, leaving a null handle and no images behind.
fn take_retired(
  handle: &mut vk::SwapchainKHR,
  images: &mut Vec<vk::Image>,
  views: &mut Vec<vk::ImageView>,
) -> (vk::SwapchainKHR, Vec<vk::ImageView>) {
  images.clear();
  (std::mem::replace(handle, vk::SwapchainKHR::null()), std::mem::take(views))
}

impl Swapchain {
  pub fn new(
    instance: &Instance,
    device: &Device,
    physical: &PhysicalDeviceDescriptor,
    surface: &Surface,
    cfg: &SwapchainConfig,
    want: RenderSize,
  ) -> Result<Self, BootstrapError> {
    let loader = swapchain::Device::new(instance.handle(), device.handle());
    let n = negotiate(device, &loader, physical, surface, cfg, want, vk::SwapchainKHR::null())?;
    Ok(Swapchain {
      device: device.handle().clone(),
      loader,
      handle: n.handle,
      format: n.format,
      present_mode: n.present_mode,
      extent: n.extent,
      sharing: n.sharing,
      images: n.images,
      image_views: n.image_views,
    })
  }

  /// Replaces the swapchain for a new window size. The device must be idle.
  ///
  /// The current swapchain is passed as `oldSwapchain`, which retires it even
  /// when creation fails. On failure its views and handle are released and the
  /// swapchain is left empty (`is_retired` returns true); it must be rebuilt
  /// again or dropped before presenting.
  pub fn rebuild(
    &mut self,
    device: &Device,
    physical: &PhysicalDeviceDescriptor,
    surface: &Surface,
    cfg: &SwapchainConfig,
    want: RenderSize,
  ) -> Result<(), BootstrapError> {
    let n = match negotiate(device, &self.loader, physical, surface, cfg, want, self.handle) {
      Ok(n) => n,
      Err(e) => {
        self.retire();
        return Err(e);
      }
    };
    unsafe { release(&self.device, &self.loader, self.handle, &self.image_views) };
    self.handle = n.handle;
    self.format = n.format;
    self.present_mode = n.present_mode;
    self.extent = n.extent;
    self.sharing = n.sharing;
    self.images = n.images;
    self.image_views = n.image_views;
    Ok(())
  }

  fn retire(&mut self) {
    let (handle, views) = take_retired(&mut self.handle, &mut self.images, &mut self.image_views);
    warn!("swapchain retired after a failed rebuild; {} view(s) released", views.len());
    unsafe { release(&self.device, &self.loader, handle, &views) };
  }

  /// True after a failed `rebuild`: no handle, no images, no views.
  pub fn is_retired(&self) -> bool {
    self.handle == vk::SwapchainKHR::null()
  }

  pub fn handle(&self) -> vk::SwapchainKHR {
    self.handle
  }

  pub fn loader(&self) -> &swapchain::Device {
    &self.loader
  }

  pub fn format(&self) -> vk::Format {
    self.format.format
  }

  pub fn color_space(&self) -> vk::ColorSpaceKHR {
    self.format.color_space
  }

  pub fn present_mode(&self) -> vk::PresentModeKHR {
    self.present_mode
  }

  pub fn extent(&self) -> vk::Extent2D {
    self.extent
  }

  pub fn sharing_mode(&self) -> vk::SharingMode {
    self.sharing.mode
  }

  pub fn images(&self) -> &[vk::Image] {
    &self.images
  }

  pub fn image_views(&self) -> &[vk::ImageView] {
    &self.image_views
  }
}

fn negotiate(
  device: &Device,
  loader: &swapchain::Device,
  physical: &PhysicalDeviceDescriptor,
  surface: &Surface,
  cfg: &SwapchainConfig,
  want: RenderSize,
  old: vk::SwapchainKHR,
) -> Result<Negotiated, BootstrapError> {
  let support = surface.query_support(physical.handle)?;
  debug!(
    "surface: {} format(s), present modes {:?}, current extent {}x{}",
    support.formats.len(),
    support.present_modes,
    support.capabilities.current_extent.width,
    support.capabilities.current_extent.height,
  );

  let caps = &support.capabilities;
  let format = choose_surface_format(&support.formats).ok_or(BootstrapError::NoSurfaceFormat)?;
  let present_mode = choose_present_mode(&support.present_modes, cfg.present_mode.to_vk());
  let extent = choose_extent(caps, want);
  let sharing = image_sharing(&device.families());

  let create_info = swapchain_create_info(surface.handle(), caps, format, present_mode, extent, &sharing, old);

  let handle = unsafe { loader.create_swapchain(&create_info, None) }.map_err(BootstrapError::SwapchainCreation)?;
  let images = match unsafe { loader.get_swapchain_images(handle) } {
    Ok(images) => images,
    Err(result) => {
      unsafe { loader.destroy_swapchain(handle, None) };
      return Err(BootstrapError::SwapchainCreation(result));
    }
  };

  let d = device.handle();
  let image_views = create_all_or_release(
    &images,
    |&image| {
      let info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format.format)
        .components(vk::ComponentMapping {
          r: vk::ComponentSwizzle::IDENTITY,
          g: vk::ComponentSwizzle::IDENTITY,
          b: vk::ComponentSwizzle::IDENTITY,
          a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
          aspect_mask: vk::ImageAspectFlags::COLOR,
          base_mip_level: 0,
          level_count: 1,
          base_array_layer: 0,
          layer_count: 1,
        });
      unsafe { d.create_image_view(&info, None) }
    },
    |view| unsafe { d.destroy_image_view(view, None) },
  )
  .map_err(|(index, result)| {
    unsafe { loader.destroy_swapchain(handle, None) };
    BootstrapError::ImageViewCreation { index, result }
  })?;

  info!(
    "swapchain ready: {}x{}, {:?}/{:?}, {:?}, {} image(s), {:?} sharing",
    extent.width,
    extent.height,
    format.format,
    format.color_space,
    present_mode,
    images.len(),
    sharing.mode,
  );

  Ok(Negotiated { handle, format, present_mode, extent, sharing, images, image_views })
}
