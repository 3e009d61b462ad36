//! Vulkan device context
//!
//! The root of all GPU object lifetimes: instance, surface, physical-device
//! selection, logical device and its queues. Created once at startup;
//! everything else references it and never outlives it.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};
use thiserror::Error;

use super::window::Window;

/// Vulkan-specific error taxonomy.
///
/// Everything here is surfaced synchronously to the caller of the operation
/// that detected it. `DeviceLost` is kept distinct from ordinary API errors
/// because recovering from it requires full context reconstruction, not a
/// retry of the failing call.
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code.
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// The device was lost; the context must be rebuilt from scratch.
    #[error("Vulkan device lost")]
    DeviceLost,

    /// Context or resource initialization failed; fatal to startup.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// An operation was attempted in an illegal state.
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Why the operation is illegal right now.
        reason: String,
    },

    /// No memory type satisfies the requested property flags.
    #[error("no suitable memory type found")]
    NoSuitableMemoryType,
}

impl VulkanError {
    /// Classify a raw `vk::Result`, keeping device loss distinct.
    pub fn from_vk(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            other => Self::Api(other),
        }
    }
}

/// Result type for Vulkan operations.
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup.
pub struct VulkanInstance {
    /// Vulkan entry point.
    pub entry: Entry,
    /// Vulkan instance handle.
    pub instance: Instance,
    debug_utils: Option<DebugUtils>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    /// Create a Vulkan 1.2 instance, optionally with validation layers.
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            VulkanError::InitializationFailed(format!("failed to load Vulkan: {e:?}"))
        })?;

        let app_name_cstr = CString::new(app_name)
            .map_err(|_| VulkanError::InitializationFailed("app name contains NUL".into()))?;
        let engine_name = CStr::from_bytes_with_nul(b"mesh_engine\0").unwrap();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            // Timeline semaphores are core in 1.2.
            .api_version(vk::API_VERSION_1_2);

        let required_extensions = window.required_instance_extensions().map_err(|e| {
            VulkanError::InitializationFailed(format!("required extensions: {e}"))
        })?;
        let cstr_extensions: Vec<CString> = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()).unwrap())
            .collect();
        let mut extensions: Vec<*const i8> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let validation = enable_validation && cfg!(debug_assertions);
        if validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names: Vec<CString> = if validation {
            vec![CString::new("VK_LAYER_KHRONOS_validation").unwrap()]
        } else {
            Vec::new()
        };
        let layer_name_ptrs: Vec<*const i8> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_name_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::from_vk)?
        };

        let (debug_utils, debug_messenger) = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = Self::setup_debug_messenger(&debug_utils)?;
            (Some(debug_utils), Some(messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
        })
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::from_vk)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let (Some(debug_utils), Some(messenger)) =
                (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Validation-layer messages routed into the `log` crate.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[vulkan] {message_type:?} - {message}");
    } else {
        log::warn!("[vulkan] {message_type:?} - {message}");
    }

    vk::FALSE
}

/// Selected physical device and its queue family indices.
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties and limits.
    pub properties: vk::PhysicalDeviceProperties,
    /// Index of the graphics queue family.
    pub graphics_family: u32,
    /// Index of the presentation queue family.
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Select the first non-software adapter that can render and present.
    ///
    /// Software (CPU) devices are skipped, matching the contract that a pure
    /// software rasterizer is not an acceptable target. Fails if no hardware
    /// adapter remains.
    pub fn select_suitable_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::from_vk)?
        };

        for device in devices {
            let properties = unsafe { instance.get_physical_device_properties(device) };
            if properties.device_type == vk::PhysicalDeviceType::CPU {
                continue;
            }

            match Self::evaluate_device(instance, device, properties, surface, surface_loader) {
                Ok(info) => {
                    log::info!("selected GPU: {}", unsafe {
                        CStr::from_ptr(info.properties.device_name.as_ptr()).to_string_lossy()
                    });
                    return Ok(info);
                }
                Err(e) => log::debug!("skipping adapter: {e}"),
            }
        }

        Err(VulkanError::InitializationFailed(
            "no suitable hardware GPU found".to_string(),
        ))
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        properties: vk::PhysicalDeviceProperties,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut graphics_family = None;
        let mut present_family = None;

        for (index, family) in queue_families.iter().enumerate() {
            let index = index as u32;

            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics_family.is_none() {
                graphics_family = Some(index);
            }

            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .map_err(VulkanError::from_vk)?
            };
            if present_support && present_family.is_none() {
                present_family = Some(index);
            }

            if graphics_family.is_some() && present_family.is_some() {
                break;
            }
        }

        let graphics_family = graphics_family.ok_or_else(|| {
            VulkanError::InitializationFailed("no graphics queue family".to_string())
        })?;
        let present_family = present_family.ok_or_else(|| {
            VulkanError::InitializationFailed("no present queue family".to_string())
        })?;

        // Swapchain support is mandatory.
        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::from_vk)?
        };
        let has_swapchain = extensions.iter().any(|available| {
            let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Err(VulkanError::InitializationFailed(
                "swapchain extension not supported".to_string(),
            ));
        }

        Ok(Self {
            device,
            properties,
            graphics_family,
            present_family,
        })
    }

    /// Row-pitch alignment the hardware requires for buffer-image copies.
    pub fn copy_row_pitch_alignment(&self) -> u64 {
        // A value of 0/1 means no alignment constraint; normalize to 1.
        self.properties
            .limits
            .optimal_buffer_copy_row_pitch_alignment
            .max(1)
    }
}

/// Logical device wrapper owning the submission queues.
pub struct LogicalDevice {
    /// Vulkan logical device handle.
    pub device: Device,
    /// Graphics submission queue; all frame and upload work flows through it.
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue.
    pub present_queue: vk::Queue,
    /// Index of the graphics queue family.
    pub graphics_family: u32,
    /// Index of the presentation queue family.
    pub present_family: u32,
}

impl LogicalDevice {
    /// Create the logical device with graphics and present queues and the
    /// timeline-semaphore feature enabled.
    pub fn new(instance: &Instance, physical: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let unique_families: std::collections::HashSet<u32> =
            [physical.graphics_family, physical.present_family]
                .into_iter()
                .collect();

        let queue_priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        // The frame synchronizer is built on a timeline semaphore.
        let mut vulkan12_features =
            vk::PhysicalDeviceVulkan12Features::builder().timeline_semaphore(true);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .push_next(&mut vulkan12_features);

        let device = unsafe {
            instance
                .create_device(physical.device, &create_info, None)
                .map_err(VulkanError::from_vk)?
        };

        let graphics_queue = unsafe { device.get_device_queue(physical.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.present_family, 0) };

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            graphics_family: physical.graphics_family,
            present_family: physical.present_family,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            // All queue work must have drained before the device goes away.
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Root Vulkan context: instance, surface, physical and logical device.
///
/// Fields are declared children-first; the swapchain and all other GPU
/// resources live outside this struct and must be dropped before it.
pub struct VulkanContext {
    /// Logical device and queues.
    pub device: LogicalDevice,
    /// Selected physical device information.
    pub physical_device: PhysicalDeviceInfo,
    /// Vulkan surface for rendering.
    surface: vk::SurfaceKHR,
    /// Surface extension loader.
    surface_loader: Surface,
    /// Vulkan instance and debug utilities.
    pub instance: VulkanInstance,
}

impl VulkanContext {
    /// Build the full context against the given window.
    ///
    /// Any creation failure is fatal to startup and propagates as a single
    /// error; there is no partial retry.
    pub fn new(window: &mut Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, app_name, enable_validation)?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("surface creation: {e}")))?;

        let physical_device =
            PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface, &surface_loader)?;
        let device = LogicalDevice::new(&instance.instance, &physical_device)?;

        Ok(Self {
            device,
            physical_device,
            surface,
            surface_loader,
            instance,
        })
    }

    /// The ash device handle (cheap to clone; it is a function table).
    pub fn raw_device(&self) -> Device {
        self.device.device.clone()
    }

    /// The Vulkan instance handle.
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// The window surface.
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// The surface extension loader.
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// The graphics queue all command submission flows through.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// The presentation queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Block until the device is idle. Used during teardown and resize.
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .device
                .device_wait_idle()
                .map_err(VulkanError::from_vk)
        }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();
            self.surface_loader.destroy_surface(self.surface, None);
        }
        // Remaining fields drop in declaration order: device before instance.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_lost_is_classified_distinctly() {
        assert!(matches!(
            VulkanError::from_vk(vk::Result::ERROR_DEVICE_LOST),
            VulkanError::DeviceLost
        ));
        assert!(matches!(
            VulkanError::from_vk(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
            VulkanError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
        ));
    }
}
