use bitflags::bitflags;

use crate::types::SampleCount;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    #[default]
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Unorm,
    Bgra8Srgb,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    D32Float,
    D24UnormS8Uint,
    D32FloatS8Uint,
}

impl TextureFormat {
    pub const ALL: [Self; 10] = [
        Self::Rgba8Unorm,
        Self::Rgba8Srgb,
        Self::Bgra8Unorm,
        Self::Bgra8Srgb,
        Self::Rgba16Float,
        Self::Rgba32Float,
        Self::R32Float,
        Self::D32Float,
        Self::D24UnormS8Uint,
        Self::D32FloatS8Uint,
    ];

    #[inline]
    pub fn has_depth(self) -> bool {
        matches!(self, Self::D32Float | Self::D24UnormS8Uint | Self::D32FloatS8Uint)
    }

    #[inline]
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::D24UnormS8Uint | Self::D32FloatS8Uint)
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u8 {
        const SAMPLED = 1 << 0;
        const STORAGE = 1 << 1;
        const COLOR_ATTACHMENT = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
    }
}

#[derive(Clone, Debug)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: SampleCount,
    pub debug_name: String,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            format: TextureFormat::default(),
            usage: TextureUsage::SAMPLED,
            mip_levels: 1,
            array_layers: 1,
            samples: SampleCount::Count1,
            debug_name: String::new(),
        }
    }
}

impl TextureDescriptor {
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            width,
            height,
            format,
            usage,
            ..Default::default()
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
    fn test_depth_stencil_formats() {
        let depth: Vec<_> = TextureFormat::ALL.into_iter().filter(|f| f.has_depth()).collect();
        assert_eq!(depth.len(), 3);
        assert!(TextureFormat::D32FloatS8Uint.has_stencil());
        assert!(!TextureFormat::D32Float.has_stencil());
        assert!(!TextureFormat::Bgra8Srgb.has_depth());
    }
}
