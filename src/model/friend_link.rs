//! 友情链接及审核状态机

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::validate::{char_len, is_http_url, looks_like_email, normalize_site_url};
use crate::error::{ApiError, ApiResult};

/// 友链状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendLinkStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl FriendLinkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FriendLinkStatus::Pending => "pending",
            FriendLinkStatus::Approved => "approved",
            FriendLinkStatus::Rejected => "rejected",
            FriendLinkStatus::Expired => "expired",
        }
    }

    /// 状态流转是否合法
    pub fn can_transition_to(self, next: FriendLinkStatus) -> bool {
        use FriendLinkStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Expired)
                | (Approved, Rejected)
                | (Rejected, Pending)
                | (Rejected, Approved)
                | (Expired, Approved)
                | (Expired, Pending)
        )
    }

    /// 是否占用站点地址（重复申请检测）
    pub fn is_live(self) -> bool {
        matches!(self, FriendLinkStatus::Pending | FriendLinkStatus::Approved)
    }
}

impl FromStr for FriendLinkStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(FriendLinkStatus::Pending),
            "approved" => Ok(FriendLinkStatus::Approved),
            "rejected" => Ok(FriendLinkStatus::Rejected),
            "expired" => Ok(FriendLinkStatus::Expired),
            other => Err(ApiError::invalid(format!("未知友链状态: {}", other))),
        }
    }
}

/// 友情链接
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendLink {
    pub id: i64,
    pub site_name: String,
    pub site_url: String,
    /// 归一化后的地址，用于去重
    #[serde(skip)]
    pub normalized_url: String,
    pub description: String,
    pub logo: Option<String>,
    pub contact_email: Option<String>,
    pub status: FriendLinkStatus,
    pub reject_reason: Option<String>,
    pub sort_order: i64,
    pub expires_at: Option<String>,
    pub last_checked_at: Option<String>,
    /// 最近一次互链检测结果（对方站点是否包含本站链接）
    pub reciprocal: Option<bool>,
    pub created_at: String,
    pub updated_at: String,
}

/// 公开展示的友链（不含联系邮箱等信息）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicFriendLink {
    pub id: i64,
    pub site_name: String,
    pub site_url: String,
    pub description: String,
    pub logo: Option<String>,
}

impl From<FriendLink> for PublicFriendLink {
    fn from(link: FriendLink) -> Self {
        Self {
            id: link.id,
            site_name: link.site_name,
            site_url: link.site_url,
            description: link.description,
            logo: link.logo,
        }
    }
}

/// 写入数据库的友链字段（已校验）
#[derive(Debug, Clone)]
pub struct FriendLinkDraft {
    pub site_name: String,
    pub site_url: String,
    pub normalized_url: String,
    pub description: String,
    pub logo: Option<String>,
    pub contact_email: Option<String>,
    pub sort_order: i64,
    pub expires_at: Option<String>,
}

/// 友链申请 / 管理员新建请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendLinkRequest {
    pub site_name: String,
    pub site_url: String,
    #[serde(default)]
    pub description: String,
    pub logo: Option<String>,
    pub contact_email: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    pub expires_at: Option<String>,
}

/// 审核动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
    Expire,
    Reopen,
}

impl ReviewAction {
    pub fn target_status(self) -> FriendLinkStatus {
        match self {
            ReviewAction::Approve => FriendLinkStatus::Approved,
            ReviewAction::Reject => FriendLinkStatus::Rejected,
            ReviewAction::Expire => FriendLinkStatus::Expired,
            ReviewAction::Reopen => FriendLinkStatus::Pending,
        }
    }
}

/// 审核请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub action: ReviewAction,
    /// 拒绝原因（reject 时必填）
    pub reason: Option<String>,
    /// 通过时可设置过期时间（RFC3339）
    pub expires_at: Option<String>,
}

impl FriendLinkRequest {
    /// 校验申请内容。`require_email` 为 true 时联系邮箱必填（公开申请）
    pub fn into_draft(self, require_email: bool) -> ApiResult<FriendLinkDraft> {
        let site_name = self.site_name.trim().to_string();
        if !(1..=50).contains(&char_len(&site_name)) {
            return Err(ApiError::invalid("站点名称长度需在 1-50 个字符之间"));
        }
        let site_url = self.site_url.trim().to_string();
        let normalized_url = normalize_site_url(&site_url)
            .ok_or_else(|| ApiError::invalid("站点地址必须是 http(s) 绝对地址"))?;
        let description = self.description.trim().to_string();
        if char_len(&description) > 200 {
            return Err(ApiError::invalid("站点描述不能超过 200 个字符"));
        }
        let logo = self
            .logo
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        if let Some(logo) = &logo {
            if !is_http_url(logo) {
                return Err(ApiError::invalid("Logo 地址必须是 http(s) 绝对地址"));
            }
        }
        let contact_email = self
            .contact_email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        match &contact_email {
            Some(email) if !looks_like_email(email) => {
                return Err(ApiError::invalid("联系邮箱格式无效"));
            }
            None if require_email => return Err(ApiError::invalid("请填写联系邮箱")),
            _ => {}
        }
        let expires_at = self
            .expires_at
            .map(|t| parse_rfc3339_utc(&t))
            .transpose()?;

        Ok(FriendLinkDraft {
            site_name,
            site_url,
            normalized_url,
            description,
            logo,
            contact_email,
            sort_order: self.sort_order,
            expires_at,
        })
    }
}

/// 解析 RFC3339 时间并统一为 UTC 字符串
pub fn parse_rfc3339_utc(raw: &str) -> ApiResult<String> {
    chrono::DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| {
            dt.with_timezone(&chrono::Utc)
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        })
        .map_err(|_| ApiError::invalid(format!("无效的时间格式，需要 RFC3339: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use FriendLinkStatus::*;

    fn request() -> FriendLinkRequest {
        FriendLinkRequest {
            site_name: "Example".into(),
            site_url: "https://Example.com/".into(),
            description: "示例站点".into(),
            logo: None,
            contact_email: Some("owner@example.com".into()),
            sort_order: 0,
            expires_at: None,
        }
    }

    #[test]
    fn test_transitions() {
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Expired));
        assert!(Expired.can_transition_to(Approved));
        assert!(Rejected.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Expired));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Approved));
    }

    #[test]
    fn test_into_draft_normalizes_url() {
        let draft = request().into_draft(true).unwrap();
        assert_eq!(draft.normalized_url, "https://example.com");
        assert_eq!(draft.site_url, "https://Example.com/");
    }

    #[test]
    fn test_public_application_requires_email() {
        let mut req = request();
        req.contact_email = None;
        assert!(req.into_draft(true).is_err());

        let mut req = request();
        req.contact_email = None;
        assert!(req.into_draft(false).is_ok());
    }

    #[test]
    fn test_expires_at_normalized_to_utc() {
        let mut req = request();
        req.expires_at = Some("2030-01-01T08:00:00+08:00".into());
        let draft = req.into_draft(false).unwrap();
        assert_eq!(draft.expires_at.as_deref(), Some("2030-01-01T00:00:00Z"));
    }

    #[test]
    fn test_invalid_expires_at_rejected() {
        let mut req = request();
        req.expires_at = Some("next week".into());
        assert!(req.into_draft(false).is_err());
    }
}
