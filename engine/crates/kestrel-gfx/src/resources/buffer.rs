use std::ptr;
use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use ash::vk::Handle;
use vk_mem::Alloc;

use crate::foundation::{debug_messenger::DebugType, device::GfxDevice, mem_allocator::GfxMemAllocator};

/// 由 vma 分配的 buffer
///
/// 需要 host 访问的 buffer 在创建时就 map，直到销毁前都保持 map 状态
pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,
    allocator: Rc<GfxMemAllocator>,

    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,

    /// 在初始化阶段写死
    map_ptr: Option<*mut u8>,
}

impl DebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// 创建与销毁
impl GfxBuffer {
    /// alloc_ci 的 flags 包含 HOST_ACCESS_* 时会立即 map
    pub fn new(
        device: &GfxDevice,
        allocator: Rc<GfxMemAllocator>,
        buffer_size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        alloc_ci: &vk_mem::AllocationCreateInfo,
        name: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        if buffer_size == 0 {
            anyhow::bail!("buffer {} has zero size", name.as_ref());
        }

        let buffer_ci = vk::BufferCreateInfo::default()
            .size(buffer_size)
            .usage(buffer_usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let (buffer, mut allocation) = unsafe { allocator.create_buffer(&buffer_ci, alloc_ci) }
            .with_context(|| format!("failed to allocate buffer {}", name.as_ref()))?;

        let host_access = vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM
            | vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE;
        let map_ptr = if alloc_ci.flags.intersects(host_access) {
            match unsafe { allocator.map_memory(&mut allocation) } {
                Ok(ptr) => Some(ptr),
                Err(e) => {
                    unsafe { allocator.destroy_buffer(buffer, &mut allocation) };
                    return Err(e).with_context(|| format!("failed to map buffer {}", name.as_ref()));
                }
            }
        } else {
            None
        };

        device.set_object_debug_name(buffer, format!("GfxBuffer::{}", name.as_ref()));
        Ok(Self {
            handle: buffer,
            allocation,
            allocator,
            size: buffer_size,
            usage: buffer_usage,
            map_ptr,
        })
    }

    pub fn destroy(mut self) {
        unsafe {
            if self.map_ptr.take().is_some() {
                self.allocator.unmap_memory(&mut self.allocation);
            }
            self.allocator.destroy_buffer(self.handle, &mut self.allocation);
        }
        self.handle = vk::Buffer::null();
    }
}

// getters
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }
}

// tools
impl GfxBuffer {
    /// 通过 mem map 的方式将 data 写入 buffer 的 `offset` 处，写完后 flush
    pub fn write_by_mmap(&self, offset: vk::DeviceSize, data: &[u8]) -> anyhow::Result<()> {
        let map_ptr = self.map_ptr.context("buffer is not host visible")?;
        if !write_range_in_bounds(self.size, offset, data.len()) {
            anyhow::bail!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                self.size
            );
        }

        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), map_ptr.add(offset as usize), data.len());
        }
        self.allocator
            .flush_allocation(&self.allocation, offset, data.len() as vk::DeviceSize)
            .context("failed to flush buffer allocation")
    }
}

impl Drop for GfxBuffer {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null(), "GfxBuffer must be destroyed manually.");
    }
}

/// `[offset, offset + len)` 是否完全落在 buffer 内
pub fn write_range_in_bounds(buffer_size: vk::DeviceSize, offset: vk::DeviceSize, len: usize) -> bool {
    offset.checked_add(len as vk::DeviceSize).is_some_and(|end| end <= buffer_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_range_in_bounds() {
        assert!(write_range_in_bounds(64, 0, 64));
        assert!(write_range_in_bounds(64, 60, 4));
        assert!(!write_range_in_bounds(64, 60, 5));
        assert!(!write_range_in_bounds(64, 65, 0));
        assert!(!write_range_in_bounds(64, u64::MAX, 1));
    }
}
