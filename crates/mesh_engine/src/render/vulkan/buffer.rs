//! Vulkan buffer management
//!
//! One wrapper covers every buffer kind the renderer needs; usage flags and
//! memory properties distinguish staging, vertex, index and uniform buffers.
//! Host-visible memory is written through a scoped [`MappedWrite`] guard so
//! a mapping can never outlive a frame.

use ash::{vk, Device, Instance};
use std::ptr;

use super::context::{VulkanError, VulkanResult};

/// Find a memory type index satisfying the requirements and property flags.
pub fn find_memory_type(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let memory_properties =
        unsafe { instance.get_physical_device_memory_properties(physical_device) };

    for i in 0..memory_properties.memory_type_count {
        let type_matches = (type_filter & (1 << i)) != 0;
        let properties_match = memory_properties.memory_types[i as usize]
            .property_flags
            .contains(properties);
        if type_matches && properties_match {
            return Ok(i);
        }
    }

    Err(VulkanError::NoSuitableMemoryType)
}

/// GPU buffer with bound device memory and RAII cleanup.
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    host_visible: bool,
}

impl Buffer {
    /// Create a buffer and bind freshly allocated memory to it.
    pub fn new(
        device: &Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "cannot create a zero-sized buffer".to_string(),
            });
        }

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::from_vk)?
        };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type = match find_memory_type(
            instance,
            physical_device,
            requirements.memory_type_bits,
            properties,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::from_vk(e));
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.free_memory(memory, None);
                device.destroy_buffer(buffer, None);
            }
            return Err(VulkanError::from_vk(e));
        }

        Ok(Self {
            device: device.clone(),
            buffer,
            memory,
            size,
            host_visible: properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE),
        })
    }

    /// Create a host-visible, host-coherent staging buffer (transfer source).
    pub fn staging(
        device: &Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
    ) -> VulkanResult<Self> {
        Self::new(
            device,
            instance,
            physical_device,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
    }

    /// Create a device-local vertex buffer (transfer destination).
    pub fn vertex(
        device: &Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
    ) -> VulkanResult<Self> {
        Self::new(
            device,
            instance,
            physical_device,
            size,
            vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
    }

    /// Create a device-local index buffer (transfer destination).
    pub fn index(
        device: &Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
    ) -> VulkanResult<Self> {
        Self::new(
            device,
            instance,
            physical_device,
            size,
            vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::INDEX_BUFFER,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
    }

    /// The raw buffer handle.
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// The buffer size in bytes as requested at creation.
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Map the buffer and return a scoped write guard. The mapping is
    /// released when the guard drops, so it cannot persist across frames.
    ///
    /// Fails on device-local buffers; those are filled via staging copies.
    pub fn map_write(&mut self) -> VulkanResult<MappedWrite<'_>> {
        if !self.host_visible {
            return Err(VulkanError::InvalidOperation {
                reason: "cannot map a device-local buffer".to_string(),
            });
        }

        let ptr = unsafe {
            self.device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::from_vk)?
        };

        Ok(MappedWrite { buffer: self, ptr })
    }

    /// Map, copy `data` to offset 0, unmap. Fails if `data` does not fit.
    pub fn write_bytes(&mut self, data: &[u8]) -> VulkanResult<()> {
        let mut mapping = self.map_write()?;
        mapping.write_at(0, data)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Scoped write access to a mapped host-visible buffer.
///
/// Unmaps on drop. Coherent memory needs no explicit flush.
pub struct MappedWrite<'a> {
    buffer: &'a mut Buffer,
    ptr: *mut std::ffi::c_void,
}

impl MappedWrite<'_> {
    /// Copy `data` into the buffer at `offset` bytes.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> VulkanResult<()> {
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "mapped write range overflows".to_string(),
            })?;
        if end > self.buffer.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "mapped write of {} bytes at offset {offset} exceeds buffer size {}",
                    data.len(),
                    self.buffer.size
                ),
            });
        }

        unsafe {
            let dst = self.ptr.cast::<u8>().add(offset as usize);
            ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }
}

impl Drop for MappedWrite<'_> {
    fn drop(&mut self) {
        unsafe {
            self.buffer.device.unmap_memory(self.buffer.memory);
        }
    }
}

/// Host-visible uniform buffer rewritten by the CPU every frame.
///
/// Kept persistently unmapped between writes; the per-frame update maps,
/// copies and unmaps through [`MappedWrite`].
pub struct UniformBuffer {
    buffer: Buffer,
}

impl UniformBuffer {
    /// Create a host-visible uniform buffer of `size` bytes.
    pub fn new(
        device: &Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
    ) -> VulkanResult<Self> {
        let buffer = Buffer::new(
            device,
            instance,
            physical_device,
            size,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        Ok(Self { buffer })
    }

    /// Replace the buffer contents with `data`.
    pub fn update(&mut self, data: &[u8]) -> VulkanResult<()> {
        self.buffer.write_bytes(data)
    }

    /// The raw buffer handle.
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// The buffer size in bytes.
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}
