//! 工具条目与分类

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::validate::{char_len, is_http_url};
use crate::error::{ApiError, ApiResult};

/// 工具分类（固定集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "开发")]
    Development,
    #[serde(rename = "设计")]
    Design,
    #[serde(rename = "效率")]
    Productivity,
    #[serde(rename = "AI")]
    Ai,
    #[serde(rename = "其它")]
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Development,
        Category::Design,
        Category::Productivity,
        Category::Ai,
        Category::Other,
    ];

    /// 展示名称
    pub fn label(self) -> &'static str {
        match self {
            Category::Development => "开发",
            Category::Design => "设计",
            Category::Productivity => "效率",
            Category::Ai => "AI",
            Category::Other => "其它",
        }
    }

    /// 数据库存储值
    pub fn slug(self) -> &'static str {
        match self {
            Category::Development => "dev",
            Category::Design => "design",
            Category::Productivity => "productivity",
            Category::Ai => "ai",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s) || c.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| ApiError::invalid(format!("未知分类: {}", s)))
    }
}

/// 分类过滤条件，`全部` 只用于过滤，从不入库
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub const ALL_LABEL: &'static str = "全部";

    pub fn matches(self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => c == category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == Self::ALL_LABEL || s.eq_ignore_ascii_case("all") {
            return Ok(CategoryFilter::All);
        }
        s.parse().map(CategoryFilter::Only)
    }
}

/// 工具上下架状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    #[default]
    Active,
    Inactive,
}

impl ToolStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolStatus::Active => "active",
            ToolStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for ToolStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "active" => Ok(ToolStatus::Active),
            "inactive" => Ok(ToolStatus::Inactive),
            other => Err(ApiError::invalid(format!("未知工具状态: {}", other))),
        }
    }
}

/// 工具条目
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
    pub category: Category,
    pub tags: Vec<String>,
    pub url: String,
    pub featured: bool,
    pub status: ToolStatus,
    pub sort_order: i64,
    pub view_count: i64,
    pub click_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// 新建/更新工具时写入数据库的字段（已校验）
#[derive(Debug, Clone)]
pub struct ToolDraft {
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
    pub category: Category,
    pub tags: Vec<String>,
    pub url: String,
    pub featured: bool,
    pub status: ToolStatus,
    pub sort_order: i64,
}

/// 创建工具请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateToolRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub icon: Option<String>,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub url: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub status: ToolStatus,
    #[serde(default)]
    pub sort_order: i64,
}

/// 更新工具请求（未提供的字段保持不变）
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateToolRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    /// 空字符串表示清除图标
    pub icon: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub url: Option<String>,
    pub featured: Option<bool>,
    pub status: Option<ToolStatus>,
    pub sort_order: Option<i64>,
}

const MAX_NAME_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 500;
const MAX_TAGS: usize = 10;
const MAX_TAG_CHARS: usize = 20;

impl CreateToolRequest {
    pub fn into_draft(self) -> ApiResult<ToolDraft> {
        let draft = ToolDraft {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            icon: normalize_icon(self.icon),
            category: self.category.parse()?,
            tags: normalize_tags(self.tags)?,
            url: self.url.trim().to_string(),
            featured: self.featured,
            status: self.status,
            sort_order: self.sort_order,
        };
        draft.validate()?;
        Ok(draft)
    }
}

impl UpdateToolRequest {
    /// 将更新合并到现有工具上
    pub fn apply_to(self, tool: &Tool) -> ApiResult<ToolDraft> {
        let draft = ToolDraft {
            name: self
                .name
                .map(|n| n.trim().to_string())
                .unwrap_or_else(|| tool.name.clone()),
            description: self
                .description
                .map(|d| d.trim().to_string())
                .unwrap_or_else(|| tool.description.clone()),
            icon: match self.icon {
                Some(icon) => normalize_icon(Some(icon)),
                None => tool.icon.clone(),
            },
            category: match self.category {
                Some(c) => c.parse()?,
                None => tool.category,
            },
            tags: match self.tags {
                Some(tags) => normalize_tags(tags)?,
                None => tool.tags.clone(),
            },
            url: self
                .url
                .map(|u| u.trim().to_string())
                .unwrap_or_else(|| tool.url.clone()),
            featured: self.featured.unwrap_or(tool.featured),
            status: self.status.unwrap_or(tool.status),
            sort_order: self.sort_order.unwrap_or(tool.sort_order),
        };
        draft.validate()?;
        Ok(draft)
    }
}

impl ToolDraft {
    fn validate(&self) -> ApiResult<()> {
        let name_len = char_len(&self.name);
        if name_len == 0 || name_len > MAX_NAME_CHARS {
            return Err(ApiError::invalid(format!(
                "工具名称长度需在 1-{} 个字符之间",
                MAX_NAME_CHARS
            )));
        }
        if char_len(&self.description) > MAX_DESCRIPTION_CHARS {
            return Err(ApiError::invalid(format!(
                "工具描述不能超过 {} 个字符",
                MAX_DESCRIPTION_CHARS
            )));
        }
        if !is_http_url(&self.url) {
            return Err(ApiError::invalid("工具地址必须是 http(s) 绝对地址"));
        }
        if let Some(icon) = &self.icon {
            if !is_http_url(icon) && !icon.starts_with("data:image/") && !icon.starts_with('/') {
                return Err(ApiError::invalid("图标地址格式无效"));
            }
        }
        Ok(())
    }
}

fn normalize_icon(icon: Option<String>) -> Option<String> {
    icon.map(|i| i.trim().to_string()).filter(|i| !i.is_empty())
}

/// 规范化标签：去空白、丢弃空标签、按不区分大小写去重
pub fn normalize_tags(tags: Vec<String>) -> ApiResult<Vec<String>> {
    let mut result: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if char_len(tag) > MAX_TAG_CHARS {
            return Err(ApiError::invalid(format!(
                "标签 \"{}\" 超过 {} 个字符",
                tag, MAX_TAG_CHARS
            )));
        }
        if result.iter().any(|t| t.to_lowercase() == tag.to_lowercase()) {
            continue;
        }
        result.push(tag.to_string());
    }
    if result.len() > MAX_TAGS {
        return Err(ApiError::invalid(format!("标签最多 {} 个", MAX_TAGS)));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateToolRequest {
        CreateToolRequest {
            name: "  GitHub ".into(),
            description: "代码托管".into(),
            icon: Some("".into()),
            category: "开发".into(),
            tags: vec!["git".into(), " Git ".into(), "".into(), "代码".into()],
            url: "https://github.com".into(),
            featured: true,
            status: ToolStatus::Active,
            sort_order: 0,
        }
    }

    #[test]
    fn test_category_parse_label_and_slug() {
        assert_eq!("开发".parse::<Category>().unwrap(), Category::Development);
        assert_eq!("ai".parse::<Category>().unwrap(), Category::Ai);
        assert_eq!("AI".parse::<Category>().unwrap(), Category::Ai);
        assert_eq!("Design".parse::<Category>().unwrap(), Category::Design);
        assert!("游戏".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serializes_as_label() {
        let json = serde_json::to_string(&Category::Productivity).unwrap();
        assert_eq!(json, "\"效率\"");
    }

    #[test]
    fn test_category_filter_parse() {
        assert_eq!("全部".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!("".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!(
            "其它".parse::<CategoryFilter>().unwrap(),
            CategoryFilter::Only(Category::Other)
        );
        assert!(CategoryFilter::All.matches(Category::Design));
        assert!(!CategoryFilter::Only(Category::Ai).matches(Category::Design));
    }

    #[test]
    fn test_create_request_normalizes() {
        let draft = request().into_draft().unwrap();
        assert_eq!(draft.name, "GitHub");
        assert_eq!(draft.icon, None);
        assert_eq!(draft.tags, vec!["git".to_string(), "代码".to_string()]);
    }

    #[test]
    fn test_create_request_rejects_bad_url() {
        let mut req = request();
        req.url = "github.com".into();
        assert!(matches!(req.into_draft(), Err(ApiError::InvalidRequest(_))));
    }

    #[test]
    fn test_too_many_tags_rejected() {
        let tags = (0..11).map(|i| format!("tag{}", i)).collect();
        assert!(normalize_tags(tags).is_err());
    }

    #[test]
    fn test_update_keeps_unset_fields() {
        let tool = Tool {
            id: 1,
            name: "Figma".into(),
            description: "设计协作".into(),
            icon: Some("https://figma.com/favicon.ico".into()),
            category: Category::Design,
            tags: vec!["ui".into()],
            url: "https://figma.com".into(),
            featured: false,
            status: ToolStatus::Active,
            sort_order: 3,
            view_count: 0,
            click_count: 0,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let patch = UpdateToolRequest {
            featured: Some(true),
            icon: Some(String::new()),
            ..Default::default()
        };
        let draft = patch.apply_to(&tool).unwrap();
        assert!(draft.featured);
        assert_eq!(draft.icon, None);
        assert_eq!(draft.name, "Figma");
        assert_eq!(draft.sort_order, 3);
        assert_eq!(draft.category, Category::Design);
    }
}
