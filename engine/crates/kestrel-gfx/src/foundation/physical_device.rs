use anyhow::Context;
use ash::vk;
use itertools::Itertools;

use crate::swapchain::surface::GfxSurface;

/// 一个 queue family 的属性，以及它能否向 surface 呈现
#[derive(Clone, Debug)]
pub struct GfxQueueFamilyInfo {
    pub index: u32,
    pub props: vk::QueueFamilyProperties,
    pub supports_present: bool,
}

/// 表示一张物理显卡，以及它针对当前 surface 的能力
#[derive(Clone)]
pub struct GfxPhysicalDevice {
    pub vk_handle: vk::PhysicalDevice,

    /// 当前 gpu 的基础属性
    pub properties: vk::PhysicalDeviceProperties,
    /// 当前 gpu 支持的 features
    pub features: vk::PhysicalDeviceFeatures,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,

    pub queue_families: Vec<GfxQueueFamilyInfo>,

    pub surface_formats: Vec<vk::SurfaceFormatKHR>,
    pub surface_capabilities: vk::SurfaceCapabilitiesKHR,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl GfxPhysicalDevice {
    fn new(instance: &ash::Instance, surface: &GfxSurface, pdevice: vk::PhysicalDevice) -> anyhow::Result<Self> {
        unsafe {
            let mut props2 = vk::PhysicalDeviceProperties2::default();
            instance.get_physical_device_properties2(pdevice, &mut props2);
            let properties = props2.properties;
            log::info!(
                "found gpu: {:?} ({:?})",
                properties.device_name_as_c_str().unwrap_or(c"unknown"),
                properties.device_type
            );

            let queue_families = instance
                .get_physical_device_queue_family_properties(pdevice)
                .into_iter()
                .enumerate()
                .map(|(index, props)| {
                    let index = index as u32;
                    let supports_present = surface
                        .get_support(pdevice, index)
                        .with_context(|| format!("failed to query present support of queue family {index}"))?;
                    Ok(GfxQueueFamilyInfo {
                        index,
                        props,
                        supports_present,
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            log::debug!("queue families:\n{:#?}", queue_families);

            Ok(Self {
                vk_handle: pdevice,
                properties,
                features: instance.get_physical_device_features(pdevice),
                memory_properties: instance.get_physical_device_memory_properties(pdevice),
                queue_families,
                surface_formats: surface.get_formats(pdevice).context("failed to query surface formats")?,
                surface_capabilities: surface
                    .get_capabilities(pdevice)
                    .context("failed to query surface capabilities")?,
                present_modes: surface.get_present_modes(pdevice).context("failed to query present modes")?,
            })
        }
    }

    #[inline]
    /// 当前 gpu 是否是独立显卡
    pub fn is_descrete_gpu(&self) -> bool {
        self.properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }

    #[inline]
    pub fn supports_geometry_shader(&self) -> bool {
        self.features.geometry_shader == vk::TRUE
    }
}

/// 选中的 (显卡, queue family)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GfxDeviceSelection {
    pub device_index: usize,
    pub queue_family_index: u32,
}

/// 系统中所有的物理显卡，以及最终的选择结果
#[derive(Default)]
pub struct GfxPhysicalDevices {
    devices: Vec<GfxPhysicalDevice>,
    selection: Option<GfxDeviceSelection>,
}

// 创建
impl GfxPhysicalDevices {
    /// 枚举所有物理显卡，并查询它们针对 surface 的能力
    pub fn init(instance: &ash::Instance, surface: &GfxSurface) -> anyhow::Result<Self> {
        let pdevices =
            unsafe { instance.enumerate_physical_devices() }.context("failed to enumerate physical devices")?;
        if pdevices.is_empty() {
            anyhow::bail!("no vulkan capable physical device found");
        }

        let devices = pdevices
            .into_iter()
            .map(|pdevice| GfxPhysicalDevice::new(instance, surface, pdevice))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::from_devices(devices))
    }

    pub fn from_devices(devices: Vec<GfxPhysicalDevice>) -> Self {
        Self {
            devices,
            selection: None,
        }
    }
}

// 选择
impl GfxPhysicalDevices {
    /// 选择一个满足条件的 (显卡, queue family)
    ///
    /// 找到独立显卡时直接返回；否则使用第一个满足条件的其他显卡。
    pub fn select_device(&mut self, required_queue_flags: vk::QueueFlags, requires_present: bool) -> bool {
        self.selection = find_device(&self.devices, required_queue_flags, requires_present);
        match self.selection {
            Some(selection) => {
                let device = &self.devices[selection.device_index];
                log::info!(
                    "selected gpu: {:?}, queue family: {}",
                    device.properties.device_name_as_c_str().unwrap_or(c"unknown"),
                    selection.queue_family_index
                );
                true
            }
            None => {
                log::error!(
                    "no physical device supports queue flags {:?} with present = {}",
                    required_queue_flags,
                    requires_present
                );
                false
            }
        }
    }
}

// getters
impl GfxPhysicalDevices {
    #[inline]
    pub fn selected_device(&self) -> Option<&GfxPhysicalDevice> {
        self.selection.map(|selection| &self.devices[selection.device_index])
    }

    #[inline]
    pub fn selected_queue_family(&self) -> Option<u32> {
        self.selection.map(|selection| selection.queue_family_index)
    }
}

/// queue family 需要包含全部的 required flags，且 present 支持与要求一致
pub fn find_device(
    devices: &[GfxPhysicalDevice],
    required_queue_flags: vk::QueueFlags,
    requires_present: bool,
) -> Option<GfxDeviceSelection> {
    let candidates = devices
        .iter()
        .enumerate()
        .filter_map(|(device_index, device)| {
            device
                .queue_families
                .iter()
                .find(|family| {
                    family.props.queue_flags.contains(required_queue_flags) && family.supports_present == requires_present
                })
                .map(|family| (device, GfxDeviceSelection {
                    device_index,
                    queue_family_index: family.index,
                }))
        })
        .collect_vec();

    // 优先使用独立显卡
    candidates
        .iter()
        .find(|(device, _)| device.is_descrete_gpu())
        .or_else(|| candidates.first())
        .map(|(_, selection)| *selection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(index: u32, flags: vk::QueueFlags, supports_present: bool) -> GfxQueueFamilyInfo {
        GfxQueueFamilyInfo {
            index,
            props: vk::QueueFamilyProperties {
                queue_flags: flags,
                queue_count: 1,
                ..Default::default()
            },
            supports_present,
        }
    }

    fn device(device_type: vk::PhysicalDeviceType, families: Vec<GfxQueueFamilyInfo>) -> GfxPhysicalDevice {
        GfxPhysicalDevice {
            vk_handle: vk::PhysicalDevice::null(),
            properties: vk::PhysicalDeviceProperties {
                device_type,
                ..Default::default()
            },
            features: vk::PhysicalDeviceFeatures::default(),
            memory_properties: vk::PhysicalDeviceMemoryProperties::default(),
            queue_families: families,
            surface_formats: vec![],
            surface_capabilities: vk::SurfaceCapabilitiesKHR::default(),
            present_modes: vec![],
        }
    }

    fn gfx_present() -> Vec<GfxQueueFamilyInfo> {
        vec![family(0, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, true)]
    }

    #[test]
    fn test_discrete_preferred_regardless_of_order() {
        let integrated = device(vk::PhysicalDeviceType::INTEGRATED_GPU, gfx_present());
        let discrete = device(vk::PhysicalDeviceType::DISCRETE_GPU, gfx_present());

        let devices = vec![integrated.clone(), discrete.clone()];
        let selection = find_device(&devices, vk::QueueFlags::GRAPHICS, true).unwrap();
        assert_eq!(selection.device_index, 1);

        let devices = vec![discrete, integrated];
        let selection = find_device(&devices, vk::QueueFlags::GRAPHICS, true).unwrap();
        assert_eq!(selection.device_index, 0);
    }

    #[test]
    fn test_fallback_to_first_integrated() {
        let devices = vec![
            device(vk::PhysicalDeviceType::CPU, vec![family(0, vk::QueueFlags::TRANSFER, true)]),
            device(vk::PhysicalDeviceType::INTEGRATED_GPU, gfx_present()),
            device(vk::PhysicalDeviceType::INTEGRATED_GPU, gfx_present()),
        ];
        let selection = find_device(&devices, vk::QueueFlags::GRAPHICS, true).unwrap();
        assert_eq!(selection, GfxDeviceSelection {
            device_index: 1,
            queue_family_index: 0
        });
    }

    #[test]
    fn test_present_support_must_match() {
        let devices = vec![device(vk::PhysicalDeviceType::DISCRETE_GPU, vec![
            family(0, vk::QueueFlags::GRAPHICS, false),
            family(1, vk::QueueFlags::GRAPHICS, true),
        ])];
        assert_eq!(find_device(&devices, vk::QueueFlags::GRAPHICS, true).unwrap().queue_family_index, 1);
        assert_eq!(find_device(&devices, vk::QueueFlags::GRAPHICS, false).unwrap().queue_family_index, 0);
    }

    #[test]
    fn test_required_flags_are_a_superset_check() {
        let devices = vec![device(vk::PhysicalDeviceType::DISCRETE_GPU, vec![
            family(0, vk::QueueFlags::COMPUTE, true),
            family(1, vk::QueueFlags::GRAPHICS, true),
        ])];
        assert!(find_device(&devices, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, true).is_none());
        assert_eq!(find_device(&devices, vk::QueueFlags::GRAPHICS, true).unwrap().queue_family_index, 1);
    }

    #[test]
    fn test_select_device_without_candidates() {
        let mut devices = GfxPhysicalDevices::from_devices(vec![device(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            vec![family(0, vk::QueueFlags::TRANSFER, true)],
        )]);
        assert!(!devices.select_device(vk::QueueFlags::GRAPHICS, true));
        assert!(devices.selected_device().is_none());
        assert!(devices.selected_queue_family().is_none());
    }

    #[test]
    fn test_select_device_records_selection() {
        let mut devices = GfxPhysicalDevices::from_devices(vec![
            device(vk::PhysicalDeviceType::INTEGRATED_GPU, gfx_present()),
            device(vk::PhysicalDeviceType::DISCRETE_GPU, vec![
                family(0, vk::QueueFlags::TRANSFER, false),
                family(1, vk::QueueFlags::GRAPHICS, true),
            ]),
        ]);
        assert!(devices.select_device(vk::QueueFlags::GRAPHICS, true));
        assert_eq!(devices.selected_queue_family(), Some(1));
        assert!(devices.selected_device().unwrap().is_descrete_gpu());
    }
}
