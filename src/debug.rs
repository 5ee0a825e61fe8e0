//! Debug utilities: validation message routing and object naming.
//!
//! [`DebugUtilsMessenger`] forwards validation-layer messages into `tracing`
//! with `component = "validation"`, so they land wherever the application's
//! subscriber sends the rest of the crate's logs.
//!
//! [`DebugObject`] names Vulkan objects so those messages mention resources by name.

use crate::{HasDevice, Instance, utils::AsVkHandle};
use ash::{prelude::VkResult, vk};
use std::ffi::{CStr, c_void};

/// Attaches a human-readable name to a Vulkan object.
pub trait DebugObject: HasDevice + AsVkHandle {
    /// Sets the debug name. Ignored when debug utils are disabled.
    fn set_name(&self, name: &str) {
        self.device().set_debug_name(self.vk_handle(), name);
    }

    /// Builder-style variant of [`set_name`](Self::set_name).
    fn with_name(self, name: &str) -> Self
    where
        Self: Sized,
    {
        self.set_name(name);
        self
    }
}
impl<T: HasDevice + AsVkHandle> DebugObject for T {}

/// A `VK_EXT_debug_utils` messenger logging through `tracing`.
///
/// Destroyed on drop. Holds the instance alive, so it always goes away before it.
pub struct DebugUtilsMessenger {
    instance: Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl DebugUtilsMessenger {
    /// Severities reported by the messenger.
    pub const SEVERITY: vk::DebugUtilsMessageSeverityFlagsEXT =
        vk::DebugUtilsMessageSeverityFlagsEXT::from_raw(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR.as_raw()
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING.as_raw()
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO.as_raw(),
        );
    /// Message types reported by the messenger.
    pub const TYPES: vk::DebugUtilsMessageTypeFlagsEXT = vk::DebugUtilsMessageTypeFlagsEXT::from_raw(
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL.as_raw()
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION.as_raw()
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE.as_raw(),
    );

    /// Registers a messenger on the instance.
    ///
    /// Fails with `ERROR_EXTENSION_NOT_PRESENT` if `VK_EXT_debug_utils` was not enabled.
    pub fn new(instance: Instance) -> VkResult<Self> {
        let loader = instance
            .debug_utils_loader()
            .ok_or(vk::Result::ERROR_EXTENSION_NOT_PRESENT)?;
        let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(Self::SEVERITY)
            .message_type(Self::TYPES)
            .pfn_user_callback(Some(debug_utils_callback));
        let handle = unsafe { loader.create_debug_utils_messenger(&info, None)? };
        Ok(Self { instance, handle })
    }
}

impl Drop for DebugUtilsMessenger {
    fn drop(&mut self) {
        if let Some(loader) = self.instance.debug_utils_loader() {
            unsafe { loader.destroy_debug_utils_messenger(self.handle, None) };
        }
    }
}

fn message_type_name(ty: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if ty.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if ty.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    }
}

unsafe extern "system" fn debug_utils_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    ty: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let message = unsafe {
        callback_data
            .as_ref()
            .filter(|data| !data.p_message.is_null())
            .map(|data| CStr::from_ptr(data.p_message).to_string_lossy())
            .unwrap_or_default()
    };
    let kind = message_type_name(ty);
    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            tracing::error!(component = "validation", kind, "{message}")
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            tracing::warn!(component = "validation", kind, "{message}")
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            tracing::info!(component = "validation", kind, "{message}")
        }
        _ => tracing::debug!(component = "validation", kind, "{message}"),
    }
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messenger_filters() {
        assert!(
            !DebugUtilsMessenger::SEVERITY.contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE),
            "verbose messages are too noisy to route by default"
        );
        assert!(DebugUtilsMessenger::SEVERITY.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));
        assert_eq!(
            message_type_name(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
            ),
            "performance"
        );
    }

    #[test]
    fn test_callback_handles_null_message() {
        let _subscriber = tracing::subscriber::set_default(
            tracing_subscriber::fmt().with_test_writer().finish(),
        );
        let data = vk::DebugUtilsMessengerCallbackDataEXT::default();
        let result = unsafe {
            debug_utils_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
                vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
                &data,
                std::ptr::null_mut(),
            )
        };
        assert_eq!(result, vk::FALSE, "the callback must never abort the call");
    }
}
