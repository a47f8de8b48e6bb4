//! Admin API 请求和响应类型

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::validate::looks_like_email;
use crate::db::tools::ToolStats;
use crate::error::{ApiError, ApiResult};
use crate::model::Pagination;
use crate::model::config::{EmailConfig, default_smtp_port, default_smtp_tls};

// ============ 列表查询 ============

/// 工具列表查询
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolListQuery {
    pub category: Option<String>,
    pub status: Option<String>,
    pub featured: Option<bool>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// 用户列表查询
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// 友链列表查询
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendLinkListQuery {
    pub status: Option<String>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// 反馈列表查询
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackListQuery {
    pub status: Option<String>,
    pub kind: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

macro_rules! impl_pagination {
    ($($ty:ty),+) => {
        $(impl $ty {
            pub fn pagination(&self) -> Pagination {
                Pagination {
                    page: self.page,
                    page_size: self.page_size,
                }
            }
        })+
    };
}

impl_pagination!(ToolListQuery, UserListQuery, FriendLinkListQuery, FeedbackListQuery);

/// 空字符串视为未指定
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ============ 工具与用户 ============

/// 抓取图标请求
#[derive(Debug, Deserialize)]
pub struct FetchIconRequest {
    pub url: String,
}

/// 管理员重置用户密码
#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub password: String,
}

// ============ 友链检测 ============

/// 单个友链的互链检测结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCheckResult {
    pub id: i64,
    pub site_name: String,
    pub site_url: String,
    /// 页面无法访问时为 None
    pub reciprocal: Option<bool>,
    pub error: Option<String>,
}

/// 互链检测汇总
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCheckSummary {
    pub checked: usize,
    pub reciprocal: usize,
    pub missing: usize,
    pub failed: usize,
    pub results: Vec<LinkCheckResult>,
}

impl LinkCheckSummary {
    pub fn from_results(results: Vec<LinkCheckResult>) -> Self {
        let count = |want: Option<bool>| results.iter().filter(|r| r.reciprocal == want).count();
        Self {
            checked: results.len(),
            reciprocal: count(Some(true)),
            missing: count(Some(false)),
            failed: count(None),
            results,
        }
    }
}

// ============ 邮件配置 ============

/// 邮件配置响应（密码脱敏）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfigResponse {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    /// 密码是否已配置（不返回明文）
    pub smtp_password_set: bool,
    pub smtp_tls: bool,
    pub from_address: String,
    pub to_addresses: Vec<String>,
}

impl From<Option<&EmailConfig>> for EmailConfigResponse {
    fn from(config: Option<&EmailConfig>) -> Self {
        match config {
            Some(c) => Self {
                enabled: c.enabled,
                smtp_host: c.smtp_host.clone(),
                smtp_port: c.smtp_port,
                smtp_username: c.smtp_username.clone(),
                smtp_password_set: !c.smtp_password.is_empty(),
                smtp_tls: c.smtp_tls,
                from_address: c.from_address.clone(),
                to_addresses: c.to_addresses.clone(),
            },
            None => Self {
                enabled: false,
                smtp_host: String::new(),
                smtp_port: default_smtp_port(),
                smtp_username: String::new(),
                smtp_password_set: false,
                smtp_tls: default_smtp_tls(),
                from_address: String::new(),
                to_addresses: Vec::new(),
            },
        }
    }
}

/// 保存邮件配置请求（密码空字符串 = 保留原密码）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEmailConfigRequest {
    pub enabled: bool,
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    /// 空字符串表示保留原密码
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: bool,
    pub from_address: String,
    #[serde(default)]
    pub to_addresses: Vec<String>,
}

impl SaveEmailConfigRequest {
    /// 校验并与旧配置合并
    pub fn into_config(self, previous: Option<&EmailConfig>) -> ApiResult<EmailConfig> {
        let smtp_host = self.smtp_host.trim().to_string();
        let from_address = self.from_address.trim().to_string();
        let to_addresses: Vec<String> = self
            .to_addresses
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        if self.enabled && smtp_host.is_empty() {
            return Err(ApiError::invalid("启用邮件通知时必须填写 SMTP 服务器"));
        }
        if self.smtp_port == 0 {
            return Err(ApiError::invalid("SMTP 端口无效"));
        }
        if !from_address.is_empty() && !looks_like_email(&from_address) {
            return Err(ApiError::invalid("发件人地址格式无效"));
        }
        if self.enabled && from_address.is_empty() {
            return Err(ApiError::invalid("启用邮件通知时必须填写发件人地址"));
        }
        if let Some(bad) = to_addresses.iter().find(|a| !looks_like_email(a)) {
            return Err(ApiError::invalid(format!("收件人地址格式无效: {}", bad)));
        }

        let smtp_password = if self.smtp_password.is_empty() {
            previous.map(|p| p.smtp_password.clone()).unwrap_or_default()
        } else {
            self.smtp_password
        };

        Ok(EmailConfig {
            enabled: self.enabled,
            smtp_host,
            smtp_port: self.smtp_port,
            smtp_username: self.smtp_username.trim().to_string(),
            smtp_password,
            smtp_tls: self.smtp_tls,
            from_address,
            to_addresses,
        })
    }
}

/// 测试邮件请求
///
/// 未提供 `config` 时使用已保存的配置；提供时密码留空表示沿用已保存的密码
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEmailRequest {
    /// 收件人（默认发给管理员收件人列表）
    pub to: Option<String>,
    pub config: Option<SaveEmailConfigRequest>,
}

// ============ 邮件模板 ============

/// 模板预览请求（可预览未保存的标题/正文）
#[derive(Debug, Default, Deserialize)]
pub struct TemplatePreviewRequest {
    pub subject: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

// ============ 统计与种子数据 ============

/// 后台统计
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub tools: ToolStats,
    pub users: u64,
    /// 状态 -> 数量（所有状态均出现）
    pub friend_links: BTreeMap<&'static str, u64>,
    pub feedback: BTreeMap<&'static str, u64>,
}

/// 生成种子数据请求
#[derive(Debug, Default, Deserialize)]
pub struct SeedRequest {
    /// 先清空工具、友链和反馈
    #[serde(default)]
    pub reset: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SaveEmailConfigRequest {
        SaveEmailConfigRequest {
            enabled: true,
            smtp_host: " smtp.example.com ".into(),
            smtp_port: 465,
            smtp_username: "bot".into(),
            smtp_password: String::new(),
            smtp_tls: true,
            from_address: "bot@example.com".into(),
            to_addresses: vec!["admin@example.com".into(), " ".into()],
        }
    }

    #[test]
    fn test_empty_password_keeps_previous() {
        let previous = request().into_config(None).unwrap();
        assert_eq!(previous.smtp_password, "");

        let mut with_password = request();
        with_password.smtp_password = "secret".into();
        let saved = with_password.into_config(Some(&previous)).unwrap();
        assert_eq!(saved.smtp_password, "secret");
        assert_eq!(saved.smtp_host, "smtp.example.com");
        assert_eq!(saved.to_addresses, vec!["admin@example.com".to_string()]);

        let kept = request().into_config(Some(&saved)).unwrap();
        assert_eq!(kept.smtp_password, "secret");
    }

    #[test]
    fn test_enabled_requires_host_and_sender() {
        let mut req = request();
        req.smtp_host = "".into();
        assert!(req.into_config(None).is_err());

        let mut req = request();
        req.from_address = "not-an-email".into();
        assert!(req.into_config(None).is_err());

        let mut req = request();
        req.enabled = false;
        req.smtp_host = "".into();
        req.from_address = "".into();
        assert!(req.into_config(None).is_ok());
    }

    #[test]
    fn test_response_hides_password() {
        let config = request().into_config(None).unwrap();
        let response = EmailConfigResponse::from(Some(&EmailConfig {
            smtp_password: "secret".into(),
            ..config
        }));
        assert!(response.smtp_password_set);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_check_summary_counts() {
        let result = |id, reciprocal| LinkCheckResult {
            id,
            site_name: "x".into(),
            site_url: "https://x.example.com".into(),
            reciprocal,
            error: None,
        };
        let summary = LinkCheckSummary::from_results(vec![
            result(1, Some(true)),
            result(2, Some(false)),
            result(3, None),
            result(4, Some(true)),
        ]);
        assert_eq!(summary.checked, 4);
        assert_eq!(summary.reciprocal, 2);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.failed, 1);
    }
}
