use std::ffi::CStr;

use anyhow::Context;
use ash::vk;

pub struct GfxDebugMsger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

// 创建与销毁
impl GfxDebugMsger {
    pub fn new(vk_entry: &ash::Entry, instance: &ash::Instance) -> anyhow::Result<Self> {
        let loader = ash::ext::debug_utils::Instance::new(vk_entry, instance);

        let create_info = Self::debug_utils_messenger_ci();
        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .context("failed to create debug messenger")?;
        log::trace!("debug messenger created");

        Ok(Self { loader, messenger })
    }

    pub fn destroy(self) {
        log::info!("destroying GfxDebugMsger");
        unsafe {
            self.loader.destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

// 构造过程辅助函数
impl GfxDebugMsger {
    /// 接收全部等级的消息，具体输出哪些由 logger 的等级过滤
    pub fn debug_msg_severity() -> vk::DebugUtilsMessageSeverityFlagsEXT {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
    }

    pub fn debug_msg_type() -> vk::DebugUtilsMessageTypeFlagsEXT {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
    }

    /// 用于创建 debug messenger 的结构体，也会挂到 instance 的 create info 上
    pub fn debug_utils_messenger_ci() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(Self::debug_msg_severity())
            .message_type(Self::debug_msg_type())
            .pfn_user_callback(Some(vk_debug_callback))
    }
}

/// debug messenger 的回调函数
///
/// # Safety
/// 只会被 validation layer 调用，`p_callback_data` 在回调期间有效
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let msg = if p_callback_data.is_null() || unsafe { (*p_callback_data).p_message.is_null() } {
        std::borrow::Cow::from("")
    } else {
        unsafe { CStr::from_ptr((*p_callback_data).p_message).to_string_lossy() }
    };

    let (detail, main_msg) = split_main_message(msg.as_ref());
    let format_msg = format!("[{:?}]\n{}\n{}\n", message_type, detail, main_msg);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::debug!("{}", format_msg),
        _ => log::trace!("{}", format_msg),
    };

    // 只有 layer developer 才需要返回 True
    vk::FALSE
}

/// 部分 layer 输出 json 格式的消息，其中 `MainMessage` 字段带有换行符，需要单独输出
///
/// 返回 (其余内容, MainMessage)；不是 json 时原样返回
fn split_main_message(msg: &str) -> (String, String) {
    let Ok(serde_json::Value::Object(mut obj)) = serde_json::from_str::<serde_json::Value>(msg) else {
        return (msg.to_string(), String::new());
    };

    let main_msg = obj.remove("MainMessage").and_then(|value| value.as_str().map(str::to_string)).unwrap_or_default();
    let detail = serde_json::to_string_pretty(&obj).unwrap_or_else(|_| msg.to_string());
    (detail, main_msg)
}

/// 可以设置 debug name 的 vulkan 对象
pub trait DebugType {
    fn debug_type_name() -> &'static str;
    fn vk_handle(&self) -> impl vk::Handle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_message() {
        let (detail, main) = split_main_message("vkCreateDevice: something happened");
        assert_eq!(detail, "vkCreateDevice: something happened");
        assert!(main.is_empty());
    }

    #[test]
    fn test_split_json_message() {
        let (detail, main) = split_main_message(r#"{"MainMessage": "line1\nline2", "MessageID": 42}"#);
        assert_eq!(main, "line1\nline2");
        assert!(detail.contains("MessageID"));
        assert!(!detail.contains("MainMessage"));
    }

    #[test]
    fn test_severity_covers_all_levels() {
        let severity = GfxDebugMsger::debug_msg_severity();
        assert!(severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
        assert!(severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR));
    }
}
