use std::ffi::{CStr, CString, c_char};

use anyhow::Context;
use ash::vk;
use itertools::Itertools;

use crate::foundation::debug_messenger::GfxDebugMsger;

/// 创建 instance 需要的应用信息
pub struct GfxAppInfo<'a> {
    pub app_name: &'a str,
    pub app_version: u32,
    pub engine_name: &'a str,
    pub engine_version: u32,
}

pub struct GfxInstance {
    /// 仅仅是函数指针以及一个裸的 handle，可以随意 clone
    ///
    /// 生命周期由手动控制
    pub(crate) ash_instance: ash::Instance,
}

// 创建与销毁
impl GfxInstance {
    /// 设置所需的 layers 和 extensions，创建 vk instance
    ///
    /// `extra_instance_exts` 通常来自窗口系统（surface 相关的 extension）
    pub fn new(
        vk_entry: &ash::Entry,
        app_info: &GfxAppInfo,
        extra_instance_exts: &[String],
        enable_validation: bool,
    ) -> anyhow::Result<Self> {
        let app_name = CString::new(app_info.app_name).context("app name contains a nul byte")?;
        let engine_name = CString::new(app_info.engine_name).context("engine name contains a nul byte")?;
        let vk_app_info = vk::ApplicationInfo::default()
            .api_version(vk::API_VERSION_1_3) // 版本过低时，有些函数无法正确加载
            .application_name(app_name.as_c_str())
            .application_version(app_info.app_version)
            .engine_name(engine_name.as_c_str())
            .engine_version(app_info.engine_version);

        let required_exts = Self::required_extensions(extra_instance_exts)?;
        Self::check_extensions(vk_entry, &required_exts)?;
        let enabled_exts = required_exts.iter().map(|ext| ext.as_ptr()).collect_vec();
        log::info!("instance extensions: {}", required_exts.iter().map(|ext| format!("\n\t{:?}", ext)).join(""));

        let enabled_layers = Self::get_layers(vk_entry, enable_validation)?;
        log::info!(
            "instance layers: {}",
            enabled_layers.iter().map(|layer| format!("\n\t{:?}", unsafe { CStr::from_ptr(*layer) })).join("")
        );

        // instance 创建和销毁期间的消息也需要输出
        let mut debug_utils_messenger_ci = GfxDebugMsger::debug_utils_messenger_ci();
        let instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&vk_app_info)
            .enabled_extension_names(&enabled_exts)
            .enabled_layer_names(&enabled_layers)
            .push_next(&mut debug_utils_messenger_ci);

        let ash_instance =
            unsafe { vk_entry.create_instance(&instance_ci, None) }.context("failed to create vulkan instance")?;
        log::trace!("vulkan instance created");

        Ok(Self { ash_instance })
    }

    pub fn destroy(self) {
        log::info!("destroying GfxInstance");
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}

// getters
impl GfxInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }

    #[inline]
    pub fn vk_instance(&self) -> vk::Instance {
        self.ash_instance.handle()
    }
}

// 构造过程的辅助函数
impl GfxInstance {
    /// 外部要求的 extension 加上 debug utils，去重
    fn required_extensions(extra_instance_exts: &[String]) -> anyhow::Result<Vec<CString>> {
        let mut exts = extra_instance_exts
            .iter()
            .map(|ext| CString::new(ext.as_str()).with_context(|| format!("invalid extension name: {ext}")))
            .collect::<anyhow::Result<Vec<_>>>()?;

        // 这个 extension 可以单独使用，提供以下功能：
        // 1. debug messenger
        // 2. 为 vulkan object 设置 debug name
        // 3. 使用 label 标记 queue 或者 command buffer 中的一个一个 section
        exts.push(vk::EXT_DEBUG_UTILS_NAME.to_owned());

        Ok(exts.into_iter().unique().collect_vec())
    }

    fn check_extensions(vk_entry: &ash::Entry, required_exts: &[CString]) -> anyhow::Result<()> {
        let all_ext_props = unsafe { vk_entry.enumerate_instance_extension_properties(None) }
            .context("failed to enumerate instance extensions")?;

        let missing = required_exts
            .iter()
            .filter(|ext| {
                !all_ext_props.iter().any(|props| props.extension_name_as_c_str().is_ok_and(|name| name == ext.as_c_str()))
            })
            .collect_vec();
        if !missing.is_empty() {
            anyhow::bail!("required instance extensions are missing: {:?}", missing);
        }
        Ok(())
    }

    /// validation layer 不可用时只给出警告，仍然可以继续运行
    fn get_layers(vk_entry: &ash::Entry, enable_validation: bool) -> anyhow::Result<Vec<*const c_char>> {
        if !enable_validation {
            return Ok(Vec::new());
        }

        const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
        let all_layer_props = unsafe { vk_entry.enumerate_instance_layer_properties() }
            .context("failed to enumerate instance layers")?;
        let supported = all_layer_props
            .iter()
            .any(|props| props.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER));

        if supported {
            Ok(vec![VALIDATION_LAYER.as_ptr()])
        } else {
            log::warn!("{:?} is not available, continuing without validation", VALIDATION_LAYER);
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_extensions_dedup_debug_utils() {
        let exts = GfxInstance::required_extensions(&[
            "VK_KHR_surface".to_string(),
            "VK_EXT_debug_utils".to_string(),
            "VK_KHR_surface".to_string(),
        ])
        .unwrap();

        assert_eq!(exts.len(), 2);
        assert!(exts.iter().any(|ext| ext.as_c_str() == vk::EXT_DEBUG_UTILS_NAME));
        assert_eq!(exts[0].as_c_str(), c"VK_KHR_surface");
    }

    #[test]
    fn test_required_extensions_rejects_nul() {
        assert!(GfxInstance::required_extensions(&["VK_KHR\0surface".to_string()]).is_err());
    }
}
