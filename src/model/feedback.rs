//! 用户反馈

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::validate::{char_len, looks_like_email};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    #[default]
    Suggestion,
    Bug,
    ToolRequest,
    Other,
}

impl FeedbackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackKind::Suggestion => "suggestion",
            FeedbackKind::Bug => "bug",
            FeedbackKind::ToolRequest => "tool_request",
            FeedbackKind::Other => "other",
        }
    }

    /// 中文名称（用于邮件）
    pub fn label(self) -> &'static str {
        match self {
            FeedbackKind::Suggestion => "功能建议",
            FeedbackKind::Bug => "问题反馈",
            FeedbackKind::ToolRequest => "工具推荐",
            FeedbackKind::Other => "其它",
        }
    }
}

impl FromStr for FeedbackKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "suggestion" => Ok(FeedbackKind::Suggestion),
            "bug" => Ok(FeedbackKind::Bug),
            "tool_request" => Ok(FeedbackKind::ToolRequest),
            "other" => Ok(FeedbackKind::Other),
            other => Err(ApiError::invalid(format!("未知反馈类型: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    New,
    Read,
    Resolved,
}

impl FeedbackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackStatus::New => "new",
            FeedbackStatus::Read => "read",
            FeedbackStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for FeedbackStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "new" => Ok(FeedbackStatus::New),
            "read" => Ok(FeedbackStatus::Read),
            "resolved" => Ok(FeedbackStatus::Resolved),
            other => Err(ApiError::invalid(format!("未知反馈状态: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub kind: FeedbackKind,
    pub content: String,
    pub status: FeedbackStatus,
    pub ip: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// 提交反馈请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub kind: FeedbackKind,
    pub content: String,
}

/// 已校验的反馈
#[derive(Debug, Clone)]
pub struct FeedbackDraft {
    pub name: String,
    pub email: String,
    pub kind: FeedbackKind,
    pub content: String,
}

impl FeedbackRequest {
    pub fn into_draft(self) -> ApiResult<FeedbackDraft> {
        let name = self.name.trim();
        let name = if name.is_empty() { "匿名用户" } else { name };
        if char_len(name) > 50 {
            return Err(ApiError::invalid("称呼不能超过 50 个字符"));
        }
        let email = self.email.trim().to_string();
        if !looks_like_email(&email) {
            return Err(ApiError::invalid("邮箱格式无效"));
        }
        let content = self.content.trim().to_string();
        if !(5..=2000).contains(&char_len(&content)) {
            return Err(ApiError::invalid("反馈内容长度需在 5-2000 个字符之间"));
        }
        Ok(FeedbackDraft {
            name: name.to_string(),
            email,
            kind: self.kind,
            content,
        })
    }
}

/// 更新反馈状态请求
#[derive(Debug, Deserialize)]
pub struct FeedbackStatusRequest {
    pub status: FeedbackStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_name_default() {
        let draft = FeedbackRequest {
            name: "  ".into(),
            email: "u@example.com".into(),
            kind: FeedbackKind::Bug,
            content: "搜索结果不准确".into(),
        }
        .into_draft()
        .unwrap();
        assert_eq!(draft.name, "匿名用户");
    }

    #[test]
    fn test_content_length_limits() {
        let short = FeedbackRequest {
            name: "a".into(),
            email: "u@example.com".into(),
            kind: FeedbackKind::Other,
            content: "hi".into(),
        };
        assert!(short.into_draft().is_err());
    }

    #[test]
    fn test_kind_deserializes_snake_case() {
        let req: FeedbackRequest = serde_json::from_str(
            r#"{"email":"u@example.com","kind":"tool_request","content":"推荐一个工具"}"#,
        )
        .unwrap();
        assert_eq!(req.kind, FeedbackKind::ToolRequest);
    }
}
