use bitflags::bitflags;

/// index buffer 中元素的类型
pub type IndexBufferElement = u32;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BufferMemoryAccess {
    /// 只有 GPU 访问
    #[default]
    GpuOnly,
    /// CPU 每帧写入，GPU 读取；每个 frame in flight 都有一份独立的拷贝
    CpuToGpu,
    /// GPU 写入，CPU 回读
    GpuToCpu,
}

impl BufferMemoryAccess {
    pub const ALL: [Self; 3] = [Self::GpuOnly, Self::CpuToGpu, Self::GpuToCpu];

    /// 是否可以通过 `update_buffer` 从 CPU 写入
    #[inline]
    pub fn is_host_writable(self) -> bool {
        matches!(self, Self::CpuToGpu | Self::GpuToCpu)
    }

    /// 是否需要为每个 frame in flight 准备一份拷贝
    #[inline]
    pub fn is_per_frame(self) -> bool {
        self == Self::CpuToGpu
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u8 {
        const VERTEX_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const UNIFORM_BUFFER = 1 << 2;
        const STORAGE_BUFFER = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
        const INDIRECT = 1 << 6;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::VERTEX_BUFFER
    }
}

#[derive(Clone, Debug, Default)]
pub struct BufferDescriptor {
    pub size: u64,
    pub usage: BufferUsage,
    pub access: BufferMemoryAccess,
    pub debug_name: String,
}

impl BufferDescriptor {
    pub fn new(size: u64, usage: BufferUsage, access: BufferMemoryAccess) -> Self {
        Self {
            size,
            usage,
            access,
            debug_name: String::new(),
        }
    }

    /// builder
    pub fn debug_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_cpu_to_gpu_is_per_frame() {
        let per_frame: Vec<_> = BufferMemoryAccess::ALL.into_iter().filter(|a| a.is_per_frame()).collect();
        assert_eq!(per_frame, vec![BufferMemoryAccess::CpuToGpu]);
        assert!(!BufferMemoryAccess::GpuOnly.is_host_writable());
    }

    #[test]
    fn test_unknown_usage_bits_dropped() {
        let usage = BufferUsage::from_bits_truncate(0xFF);
        assert_eq!(usage, BufferUsage::all());
        assert_eq!(usage.bits() & 0x80, 0);
    }
}
