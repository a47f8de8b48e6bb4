//! 站点设置（键值对）

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::common::validate::char_len;
use crate::error::{ApiError, ApiResult};

/// 邮件模板覆盖项的键前缀
pub const EMAIL_TEMPLATE_PREFIX: &str = "email_template:";

/// 已知设置项及默认值（也是公开接口可返回的全部键）
pub const KNOWN_SETTINGS: &[(&str, &str)] = &[
    ("site_name", "AiQiji 工具箱"),
    ("site_description", "精选实用在线工具导航"),
    ("site_keywords", "工具,导航,开发,设计,效率,AI"),
    ("site_notice", ""),
    ("icp_number", ""),
    ("footer_text", "© AiQiji Toolbox"),
    ("contact_email", ""),
    ("friend_link_enabled", "true"),
];

/// 是否可公开的设置键
pub fn is_public_key(key: &str) -> bool {
    KNOWN_SETTINGS.iter().any(|(k, _)| *k == key)
}

/// 校验设置键：1-64 个字符，仅 `[a-z0-9_:.]`
pub fn validate_key(key: &str) -> ApiResult<()> {
    let valid = (1..=64).contains(&key.len())
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | ':' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ApiError::invalid(format!("无效的设置键: {}", key)))
    }
}

/// 批量保存设置请求
#[derive(Debug, Deserialize)]
pub struct SaveSettingsRequest {
    pub settings: BTreeMap<String, String>,
}

impl SaveSettingsRequest {
    pub fn validate(&self) -> ApiResult<()> {
        if self.settings.is_empty() {
            return Err(ApiError::invalid("设置项不能为空"));
        }
        for (key, value) in &self.settings {
            validate_key(key)?;
            if char_len(value) > 2000 {
                return Err(ApiError::invalid(format!("设置项 {} 的值过长", key)));
            }
        }
        Ok(())
    }
}
