// SPDX-License-Identifier: CEPL-1.0
use std::borrow::Cow;
use std::ffi::{c_char, c_void, CStr, CString};

use ash::ext::debug_utils;
use ash::{vk, Entry};
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::InstanceConfig;
use crate::error::{BootstrapError, Stage};

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const ENGINE_NAME: &CStr = c"Ember";

/// Loaded Vulkan entry + instance, plus the debug messenger when validation is on.
pub struct Instance {
  debug: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
  instance: ash::Instance,
  entry: Entry,
}

impl Drop for Instance {
  fn drop(&mut self) {
    unsafe {
      if let Some((loader, messenger)) = self.debug.take() {
        loader.destroy_debug_utils_messenger(messenger, None);
      }
      self.instance.destroy_instance(None);
    }
  }
}

impl Instance {
  /// Creates the instance with the surface extensions `display` needs.
  pub fn new(cfg: &InstanceConfig, display: RawDisplayHandle) -> Result<Self, BootstrapError> {
    let app_name = app_name_cstr(&cfg.app_name)?;
    let entry = unsafe { Entry::load() }?;

    let mut extensions: Vec<*const c_char> = ash_window::enumerate_required_extensions(display)
      .map_err(|result| BootstrapError::Enumeration { stage: Stage::Instance, what: "surface extension", result })?
      .to_vec();
    log_instance_extensions(&entry);

    let mut layers: Vec<*const c_char> = Vec::new();
    if cfg.validation {
      let available = unsafe { entry.enumerate_instance_layer_properties() }
        .map_err(|result| BootstrapError::Enumeration { stage: Stage::Instance, what: "instance layer", result })?;
      for layer in &available {
        debug!("instance layer: {}", fixed_cstr(&layer.layer_name).to_string_lossy());
      }
      ensure_layer_available(VALIDATION_LAYER, &available)?;
      layers.push(VALIDATION_LAYER.as_ptr());
      extensions.push(debug_utils::NAME.as_ptr());
    }

    let app_info = vk::ApplicationInfo::default()
      .application_name(&app_name)
      .application_version(vk::make_api_version(0, 0, 1, 0))
      .engine_name(ENGINE_NAME)
      .engine_version(vk::make_api_version(0, 0, 1, 0))
      .api_version(vk::API_VERSION_1_0);

    let create_info = vk::InstanceCreateInfo::default()
      .application_info(&app_info)
      .enabled_extension_names(&extensions)
      .enabled_layer_names(&layers);

    let instance =
      unsafe { entry.create_instance(&create_info, None) }.map_err(BootstrapError::InstanceCreation)?;

    let debug = if cfg.validation {
      match create_debug_messenger(&entry, &instance) {
        Ok(pair) => Some(pair),
        Err(e) => {
          warn!("debug messenger unavailable: {e}");
          None
        }
      }
    } else {
      None
    };

    info!(
      "Vulkan instance created (app \"{}\", {} extension(s), validation {})",
      cfg.app_name,
      extensions.len(),
      if cfg.validation { "on" } else { "off" }
    );

    Ok(Instance { debug, instance, entry })
  }

  pub fn entry(&self) -> &Entry {
    &self.entry
  }

  pub fn handle(&self) -> &ash::Instance {
    &self.instance
  }

  pub fn has_debug_messenger(&self) -> bool {
    self.debug.is_some()
  }
}

fn app_name_cstr(name: &str) -> Result<CString, BootstrapError> {
  if name.is_empty() {
    return Err(BootstrapError::InvalidAppName);
  }
  CString::new(name).map_err(|_| BootstrapError::InvalidAppName)
}

fn ensure_layer_available(layer: &CStr, available: &[vk::LayerProperties]) -> Result<(), BootstrapError> {
  if available.iter().any(|p| fixed_cstr(&p.layer_name) == layer) {
    Ok(())
  } else {
    Err(BootstrapError::LayerUnavailable(layer.to_string_lossy().into_owned()))
  }
}

fn log_instance_extensions(entry: &Entry) {
  match unsafe { entry.enumerate_instance_extension_properties(None) } {
    Ok(exts) => {
      debug!("{} instance extension(s) supported", exts.len());
      for ext in &exts {
        debug!("  {} (rev {})", fixed_cstr(&ext.extension_name).to_string_lossy(), ext.spec_version);
      }
    }
    Err(e) => debug!("instance extension enumeration failed: {e}"),
  }
}

fn create_debug_messenger(
  entry: &Entry,
  instance: &ash::Instance,
) -> Result<(debug_utils::Instance, vk::DebugUtilsMessengerEXT), vk::Result> {
  let loader = debug_utils::Instance::new(entry, instance);
  let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
    .message_severity(
      vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
    )
    .message_type(
      vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
    )
    .pfn_user_callback(Some(vulkan_debug_callback));
  let messenger = unsafe { loader.create_debug_utils_messenger(&info, None) }?;
  Ok((loader, messenger))
}

unsafe extern "system" fn vulkan_debug_callback(
  severity: vk::DebugUtilsMessageSeverityFlagsEXT,
  kind: vk::DebugUtilsMessageTypeFlagsEXT,
  data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
  _user: *mut c_void,
) -> vk::Bool32 {
  let message = if data.is_null() || unsafe { (*data).p_message }.is_null() {
    Cow::Borrowed("")
  } else {
    unsafe { CStr::from_ptr((*data).p_message) }.to_string_lossy()
  };

  match severity {
    vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("[vulkan {kind:?}] {message}"),
    vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("[vulkan {kind:?}] {message}"),
    vk::DebugUtilsMessageSeverityFlagsEXT::INFO => debug!("[vulkan {kind:?}] {message}"),
    _ => trace!("[vulkan {kind:?}] {message}"),
  }
  vk::FALSE
}

/// Reads a NUL-terminated name out of a fixed-size Vulkan char array.
pub(crate) fn fixed_cstr(raw: &[c_char]) -> &CStr {
  let bytes = unsafe { std::slice::from_raw_parts(raw.as_ptr().cast::<u8>(), raw.len()) };
  CStr::from_bytes_until_nul(bytes).unwrap_or(c"")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn layer(name: &CStr) -> vk::LayerProperties {
    let mut props = vk::LayerProperties::default();
    for (dst, src) in props.layer_name.iter_mut().zip(name.to_bytes_with_nul()) {
      *dst = *src as c_char;
    }
    props
  }

  #[test]
  fn validation_layer_found_by_enumeration() {
    let available = [layer(c"VK_LAYER_MESA_device_select"), layer(VALIDATION_LAYER)];
    assert!(ensure_layer_available(VALIDATION_LAYER, &available).is_ok());
  }

  #[test]
  fn missing_layer_is_reported_by_name() {
    let available = [layer(c"VK_LAYER_MESA_device_select")];
    match ensure_layer_available(VALIDATION_LAYER, &available) {
      Err(BootstrapError::LayerUnavailable(name)) => assert_eq!(name, "VK_LAYER_KHRONOS_validation"),
      other => panic!("unexpected: {other:?}"),
    }
    assert!(matches!(
      ensure_layer_available(VALIDATION_LAYER, &[]),
      Err(BootstrapError::LayerUnavailable(_))
    ));
  }

  #[test]
  fn app_name_must_be_usable() {
    assert!(matches!(app_name_cstr(""), Err(BootstrapError::InvalidAppName)));
    assert!(matches!(app_name_cstr("bad\0name"), Err(BootstrapError::InvalidAppName)));
    assert_eq!(app_name_cstr("Ember").unwrap().as_c_str(), c"Ember");
  }

  #[test]
  fn fixed_cstr_stops_at_nul() {
    let props = layer(c"abc");
    assert_eq!(fixed_cstr(&props.layer_name), c"abc");
    let empty = vk::LayerProperties::default();
    assert_eq!(fixed_cstr(&empty.layer_name), c"");
  }
}
