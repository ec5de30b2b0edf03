use std::rc::Rc;

use ash::vk;
use kestrel_gfx::foundation::device::GfxDevice;
use kestrel_gfx::foundation::mem_allocator::GfxMemAllocator;
use kestrel_gfx::resources::buffer::{GfxBuffer, write_range_in_bounds};
use kestrel_gfx::resources::image::{GfxImage, GfxImageCreateInfo};
use kestrel_gfx::resources::image_view::{GfxImageView, GfxImageViewDesc};

use crate::buffer::{BufferDescriptor, BufferUsage};
use crate::texture::TextureDescriptor;
use crate::vulkan::conversions;

/// texture 背后的 image 由谁持有
pub enum TextureBacking {
    /// swapchain image：image 与 view 都由设备持有，texture pool 只做登记
    Swapchain { image: vk::Image, view: vk::ImageView },
    Owned { image: GfxImage, view: GfxImageView },
}

pub struct TextureVulkan {
    backing: TextureBacking,
    extent: vk::Extent2D,
    aspect: vk::ImageAspectFlags,
}

// 创建与销毁
impl TextureVulkan {
    pub fn new(
        device: &Rc<GfxDevice>,
        allocator: Rc<GfxMemAllocator>,
        desc: &TextureDescriptor,
    ) -> anyhow::Result<Self> {
        if desc.width == 0 || desc.height == 0 {
            anyhow::bail!("texture {} has zero extent", desc.debug_name);
        }

        let format = conversions::texture_format(desc.format);
        let extent = vk::Extent2D {
            width: desc.width,
            height: desc.height,
        };
        let aspect = conversions::texture_format_aspect(desc.format);
        let image_info = GfxImageCreateInfo::new_image_2d_info(extent, format, conversions::texture_usage(desc.usage))
            .mip_levels(desc.mip_levels.max(1))
            .array_layers(desc.array_layers.max(1))
            .samples(conversions::sample_count(desc.samples));
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };

        let mut image = GfxImage::new(device, allocator, &image_info, &alloc_info, &desc.debug_name)?;
        let view_desc = GfxImageViewDesc::new_2d(format, aspect).layers(0, desc.array_layers.max(1));
        let view = match GfxImageView::new(device.clone(), image.handle(), view_desc, &desc.debug_name) {
            Ok(view) => view,
            Err(e) => {
                image.destroy_mut();
                return Err(e);
            }
        };

        log::debug!(
            "texture {} created: {}x{} {:?}",
            desc.debug_name,
            desc.width,
            desc.height,
            desc.format
        );
        Ok(Self {
            backing: TextureBacking::Owned { image, view },
            extent,
            aspect,
        })
    }

    /// 登记一张 swapchain image，不产生任何分配
    pub fn from_swapchain(image: vk::Image, view: vk::ImageView, extent: vk::Extent2D) -> Self {
        Self {
            backing: TextureBacking::Swapchain { image, view },
            extent,
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }

    /// swapchain image 在这里什么都不做
    pub fn destroy(self) {
        match self.backing {
            TextureBacking::Swapchain { .. } => (),
            TextureBacking::Owned { image, view } => {
                view.destroy();
                image.destroy();
            }
        }
    }
}

// getters
impl TextureVulkan {
    #[inline]
    pub fn image(&self) -> vk::Image {
        match &self.backing {
            TextureBacking::Swapchain { image, .. } => *image,
            TextureBacking::Owned { image, .. } => image.handle(),
        }
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        match &self.backing {
            TextureBacking::Swapchain { view, .. } => *view,
            TextureBacking::Owned { view, .. } => view.handle(),
        }
    }

    #[inline]
    pub fn is_swapchain_image(&self) -> bool {
        matches!(self.backing, TextureBacking::Swapchain { .. })
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        self.aspect
    }
}

/// 一个 RHI buffer 对应的一份或多份 `GfxBuffer`
///
/// CpuToGpu 的 buffer 每个 frame in flight 都有一份拷贝，避免写入 GPU 仍在读取的数据。
/// 多份拷贝时 host 端保留最新内容，过期的拷贝在所属 slot 的 fence 等待之后才补写
pub struct BufferVulkan {
    copies: Vec<GfxBuffer>,
    usage: BufferUsage,
    host_writable: bool,
    mirror: Option<HostMirror>,
}

// 创建与销毁
impl BufferVulkan {
    pub fn new(
        device: &GfxDevice,
        allocator: Rc<GfxMemAllocator>,
        desc: &BufferDescriptor,
        frames_in_flight: usize,
    ) -> anyhow::Result<Self> {
        let copy_count = copy_count(desc, frames_in_flight);
        let usage = conversions::buffer_usage(desc.usage);
        let alloc_info = conversions::memory_access(desc.access);

        let mut copies = Vec::with_capacity(copy_count);
        for copy in 0..copy_count {
            let name = if copy_count > 1 { format!("{}-{copy}", desc.debug_name) } else { desc.debug_name.clone() };
            match GfxBuffer::new(device, allocator.clone(), desc.size, usage, &alloc_info, name) {
                Ok(buffer) => copies.push(buffer),
                Err(e) => {
                    copies.into_iter().for_each(GfxBuffer::destroy);
                    return Err(e);
                }
            }
        }

        log::debug!(
            "buffer {} created: {} bytes, {:?}, {:?}, {} copies",
            desc.debug_name,
            desc.size,
            desc.usage,
            desc.access,
            copy_count
        );
        Ok(Self {
            copies,
            usage: desc.usage,
            host_writable: desc.access.is_host_writable(),
            mirror: (copy_count > 1).then(|| HostMirror::new(desc.size as usize, copy_count)),
        })
    }

    pub fn destroy(self) {
        self.copies.into_iter().for_each(GfxBuffer::destroy);
    }
}

// getters
impl BufferVulkan {
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// 当前 slot 录制时使用的拷贝
    #[inline]
    pub fn vk_buffer(&self, slot: usize) -> vk::Buffer {
        self.copies[copy_index(self.copies.len(), slot)].vk_buffer()
    }
}

// tools
impl BufferVulkan {
    /// # param
    /// * slot - 正在录制的帧所在的 slot，该 slot 的 fence 已经等待过；None 表示不在帧内
    pub fn write(&mut self, slot: Option<usize>, offset: u64, data: &[u8]) -> anyhow::Result<()> {
        if !self.host_writable {
            anyhow::bail!("buffer is not writable from the host");
        }
        match self.mirror.as_mut() {
            // 只有一份拷贝，直接写入
            None => self.copies[0].write_by_mmap(offset, data),
            Some(mirror) => match mirror.write(slot, offset, data)? {
                Some(upload) => self.copies[upload.copy].write_by_mmap(upload.offset, upload.data),
                None => Ok(()),
            },
        }
    }

    /// 在 `slot` 的 fence 等待之后调用，把过期的拷贝更新为最新内容
    pub fn sync_slot(&mut self, slot: usize) -> anyhow::Result<()> {
        let Some(mirror) = self.mirror.as_mut() else {
            return Ok(());
        };
        match mirror.sync(slot) {
            Some(upload) => self.copies[upload.copy].write_by_mmap(upload.offset, upload.data),
            None => Ok(()),
        }
    }
}

/// 需要写入某一份拷贝的数据
#[derive(Debug, PartialEq)]
pub struct CopyUpload<'a> {
    pub copy: usize,
    pub offset: u64,
    pub data: &'a [u8],
}

/// 多份拷贝的 buffer 在 host 端保存的最新内容，以及每份拷贝是否过期
///
/// 不在帧内的写入只更新这里，所有拷贝都标记为过期
pub struct HostMirror {
    contents: Vec<u8>,
    stale: Vec<bool>,
}

impl HostMirror {
    pub fn new(size: usize, copy_count: usize) -> Self {
        Self {
            contents: vec![0; size],
            stale: vec![false; copy_count],
        }
    }

    /// 返回需要立即写入的拷贝；帧内只写入当前 slot 的拷贝
    pub fn write(&mut self, slot: Option<usize>, offset: u64, data: &[u8]) -> anyhow::Result<Option<CopyUpload<'_>>> {
        if !write_range_in_bounds(self.contents.len() as u64, offset, data.len()) {
            anyhow::bail!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                self.contents.len()
            );
        }
        let start = offset as usize;
        self.contents[start..start + data.len()].copy_from_slice(data);

        let Some(slot) = slot else {
            self.stale.fill(true);
            return Ok(None);
        };
        let copy = copy_index(self.stale.len(), slot);
        let was_stale = self.stale[copy];
        self.stale.iter_mut().enumerate().for_each(|(index, stale)| *stale = index != copy);

        // 过期的拷贝需要整份写入，否则只写本次修改的范围
        let upload = if was_stale {
            CopyUpload {
                copy,
                offset: 0,
                data: &self.contents,
            }
        } else {
            CopyUpload {
                copy,
                offset,
                data: &self.contents[start..start + data.len()],
            }
        };
        Ok(Some(upload))
    }

    /// `slot` 对应的拷贝过期时返回整份内容
    pub fn sync(&mut self, slot: usize) -> Option<CopyUpload<'_>> {
        let copy = copy_index(self.stale.len(), slot);
        if !std::mem::replace(&mut self.stale[copy], false) {
            return None;
        }
        Some(CopyUpload {
            copy,
            offset: 0,
            data: &self.contents,
        })
    }
}

/// CpuToGpu 每帧一份，其余只有一份
pub fn copy_count(desc: &BufferDescriptor, frames_in_flight: usize) -> usize {
    if desc.access.is_per_frame() { frames_in_flight.max(1) } else { 1 }
}

#[inline]
fn copy_index(copy_count: usize, slot: usize) -> usize {
    if copy_count > 1 { slot % copy_count } else { 0 }
}

/// index buffer 与 vertex buffer 的判断依据
pub fn is_index_buffer(usage: BufferUsage) -> bool {
    usage.contains(BufferUsage::INDEX_BUFFER) && !usage.contains(BufferUsage::VERTEX_BUFFER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferMemoryAccess;

    #[test]
    fn test_copy_count_by_access() {
        let uniform = BufferDescriptor::new(256, BufferUsage::UNIFORM_BUFFER, BufferMemoryAccess::CpuToGpu);
        assert_eq!(copy_count(&uniform, 2), 2);
        assert_eq!(copy_count(&uniform, 1), 1);

        let vertex = BufferDescriptor::new(256, BufferUsage::VERTEX_BUFFER, BufferMemoryAccess::GpuOnly);
        assert_eq!(copy_count(&vertex, 2), 1);

        let readback = BufferDescriptor::new(256, BufferUsage::TRANSFER_DST, BufferMemoryAccess::GpuToCpu);
        assert_eq!(copy_count(&readback, 2), 1);
    }

    /// 用内存模拟每份拷贝，按返回的 upload 写入
    fn apply(copies: &mut [Vec<u8>], upload: Option<CopyUpload<'_>>) {
        if let Some(upload) = upload {
            let start = upload.offset as usize;
            copies[upload.copy][start..start + upload.data.len()].copy_from_slice(upload.data);
        }
    }

    #[test]
    fn test_write_in_frame_is_visible_to_next_slot() {
        let mut mirror = HostMirror::new(4, 2);
        let mut copies = vec![vec![0u8; 4]; 2];

        // frame k 在 slot 0 写入
        apply(&mut copies, mirror.write(Some(0), 0, &[7, 7, 7, 7]).unwrap());
        assert_eq!(copies[0], vec![7, 7, 7, 7]);
        assert_eq!(copies[1], vec![0, 0, 0, 0]);

        // frame k+1 在 slot 1 开始，fence 等待之后补写
        apply(&mut copies, mirror.sync(1));
        assert_eq!(copies[1], vec![7, 7, 7, 7]);
        assert!(mirror.sync(1).is_none());
        assert!(mirror.sync(0).is_none());
    }

    #[test]
    fn test_write_outside_frame_defers_every_copy() {
        let mut mirror = HostMirror::new(4, 2);
        let mut copies = vec![vec![0u8; 4]; 2];

        assert!(mirror.write(None, 1, &[5, 6]).unwrap().is_none());
        assert_eq!(copies, vec![vec![0u8; 4]; 2]);

        apply(&mut copies, mirror.sync(0));
        apply(&mut copies, mirror.sync(1));
        assert_eq!(copies, vec![vec![0, 5, 6, 0]; 2]);
    }

    #[test]
    fn test_partial_write_on_stale_copy_uploads_everything() {
        let mut mirror = HostMirror::new(4, 2);
        let mut copies = vec![vec![0u8; 4]; 2];

        apply(&mut copies, mirror.write(Some(0), 0, &[1, 2]).unwrap());
        // slot 1 的拷贝已过期，局部写入也要带上 slot 0 写过的内容
        let upload = mirror.write(Some(1), 2, &[3, 4]).unwrap();
        assert_eq!(upload.as_ref().map(|u| (u.copy, u.offset)), Some((1, 0)));
        apply(&mut copies, upload);
        assert_eq!(copies[1], vec![1, 2, 3, 4]);

        // slot 0 的拷贝缺少 slot 1 的写入
        apply(&mut copies, mirror.sync(0));
        assert_eq!(copies[0], vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_mirror_rejects_out_of_range_write() {
        let mut mirror = HostMirror::new(4, 2);
        assert!(mirror.write(Some(0), 2, &[0; 3]).is_err());
        assert!(mirror.write(None, u64::MAX, &[0]).is_err());
        assert!(mirror.sync(0).is_none());
    }

    #[test]
    fn test_index_buffer_detection() {
        assert!(is_index_buffer(BufferUsage::INDEX_BUFFER));
        assert!(is_index_buffer(BufferUsage::INDEX_BUFFER | BufferUsage::TRANSFER_DST));
        assert!(!is_index_buffer(BufferUsage::VERTEX_BUFFER));
        assert!(!is_index_buffer(BufferUsage::VERTEX_BUFFER | BufferUsage::INDEX_BUFFER));
    }

    #[test]
    fn test_swapchain_texture_is_not_owned() {
        let texture = TextureVulkan::from_swapchain(
            vk::Image::null(),
            vk::ImageView::null(),
            vk::Extent2D {
                width: 800,
                height: 600,
            },
        );
        assert!(texture.is_swapchain_image());
        assert_eq!(texture.aspect(), vk::ImageAspectFlags::COLOR);
        assert_eq!(texture.extent().width, 800);
        texture.destroy();
    }
}
