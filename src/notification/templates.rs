//! 邮件模板
//!
//! 纯文本模板，使用 `{{变量}}` 占位。默认模板内置，管理员可在设置表中以
//! `email_template:<name>` 为键保存 JSON `{subject, body}` 覆盖。

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::common::validate::char_len;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::model::setting::EMAIL_TEMPLATE_PREFIX;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder regex")
});

pub const FEEDBACK_ADMIN: &str = "feedback_admin";
pub const FEEDBACK_CONFIRMATION: &str = "feedback_confirmation";
pub const FRIEND_LINK_ADMIN: &str = "friend_link_admin";
pub const FRIEND_LINK_APPROVED: &str = "friend_link_approved";
pub const FRIEND_LINK_REJECTED: &str = "friend_link_rejected";

/// 内置模板定义
#[derive(Debug)]
pub struct TemplateDef {
    pub name: &'static str,
    pub description: &'static str,
    /// 可用变量（`site_name`、`site_url` 对所有模板可用）
    pub variables: &'static [&'static str],
    pub subject: &'static str,
    pub body: &'static str,
}

pub static TEMPLATES: &[TemplateDef] = &[
    TemplateDef {
        name: FEEDBACK_ADMIN,
        description: "收到新反馈时通知管理员",
        variables: &["name", "email", "kind", "content", "created_at", "site_name", "site_url"],
        subject: "[{{site_name}}] 新的{{kind}}反馈来自 {{name}}",
        body: "收到一条新的用户反馈：\n\n\
               称呼：{{name}}\n\
               邮箱：{{email}}\n\
               类型：{{kind}}\n\
               时间：{{created_at}}\n\n\
               内容：\n{{content}}\n\n\
               请登录管理后台处理：{{site_url}}/admin",
    },
    TemplateDef {
        name: FEEDBACK_CONFIRMATION,
        description: "反馈提交后发送给用户的确认邮件",
        variables: &["name", "kind", "content", "site_name", "site_url"],
        subject: "[{{site_name}}] 我们已收到您的反馈",
        body: "{{name}}，您好：\n\n\
               感谢您的{{kind}}反馈，我们已经收到，会尽快处理。\n\n\
               您提交的内容：\n{{content}}\n\n\
               {{site_name}}\n{{site_url}}",
    },
    TemplateDef {
        name: FRIEND_LINK_ADMIN,
        description: "收到友链申请时通知管理员",
        variables: &[
            "link_name",
            "link_url",
            "link_description",
            "contact_email",
            "site_name",
            "site_url",
        ],
        subject: "[{{site_name}}] 新的友链申请：{{link_name}}",
        body: "收到新的友链申请：\n\n\
               网站名称：{{link_name}}\n\
               网站地址：{{link_url}}\n\
               网站描述：{{link_description}}\n\
               联系邮箱：{{contact_email}}\n\n\
               请登录管理后台审核：{{site_url}}/admin",
    },
    TemplateDef {
        name: FRIEND_LINK_APPROVED,
        description: "友链申请通过后通知申请人",
        variables: &["link_name", "link_url", "expires_at", "site_name", "site_url"],
        subject: "[{{site_name}}] 您的友链申请已通过",
        body: "您好：\n\n\
               您为 {{link_name}}（{{link_url}}）提交的友链申请已通过审核，\n\
               现已展示在 {{site_url}}/friends。\n\
               有效期至：{{expires_at}}\n\n\
               也欢迎在贵站添加本站链接：{{site_url}}\n\n\
               {{site_name}}",
    },
    TemplateDef {
        name: FRIEND_LINK_REJECTED,
        description: "友链申请被拒绝后通知申请人",
        variables: &["link_name", "link_url", "reason", "site_name", "site_url"],
        subject: "[{{site_name}}] 您的友链申请未通过",
        body: "您好：\n\n\
               很抱歉，您为 {{link_name}}（{{link_url}}）提交的友链申请未通过审核。\n\
               原因：{{reason}}\n\n\
               如有疑问，欢迎通过 {{site_url}}/feedback 联系我们。\n\n\
               {{site_name}}",
    },
];

pub fn find(name: &str) -> Option<&'static TemplateDef> {
    TEMPLATES.iter().find(|t| t.name == name)
}

/// 按名称查找，不存在时返回 404
pub fn require(name: &str) -> ApiResult<&'static TemplateDef> {
    find(name).ok_or_else(|| ApiError::not_found(format!("邮件模板 {}", name)))
}

pub fn setting_key(name: &str) -> String {
    format!("{}{}", EMAIL_TEMPLATE_PREFIX, name)
}

/// 模板标题与正文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateContent {
    pub subject: String,
    pub body: String,
}

impl TemplateContent {
    pub fn validate(&self) -> ApiResult<()> {
        let subject_len = char_len(self.subject.trim());
        if !(1..=200).contains(&subject_len) {
            return Err(ApiError::invalid("邮件标题长度需在 1-200 个字符之间"));
        }
        let body_len = char_len(self.body.trim());
        if !(1..=10000).contains(&body_len) {
            return Err(ApiError::invalid("邮件正文长度需在 1-10000 个字符之间"));
        }
        Ok(())
    }

    /// 替换占位符
    pub fn render(&self, vars: &BTreeMap<String, String>) -> TemplateContent {
        TemplateContent {
            subject: render(&self.subject, vars),
            body: render(&self.body, vars),
        }
    }
}

impl TemplateDef {
    pub fn default_content(&self) -> TemplateContent {
        TemplateContent {
            subject: self.subject.to_string(),
            body: self.body.to_string(),
        }
    }

    /// 合并覆盖项；覆盖项无法解析时回退到默认模板
    pub fn resolve(&self, override_json: Option<&str>) -> TemplateContent {
        match override_json.map(serde_json::from_str::<TemplateContent>) {
            Some(Ok(content)) => content,
            Some(Err(e)) => {
                tracing::warn!("邮件模板 {} 的自定义内容无法解析，使用默认模板: {}", self.name, e);
                self.default_content()
            }
            None => self.default_content(),
        }
    }

    /// 预览用的示例变量
    pub fn sample_variables(&self) -> BTreeMap<String, String> {
        self.variables
            .iter()
            .map(|v| (v.to_string(), format!("<{}>", v)))
            .collect()
    }
}

/// 替换 `{{变量}}`，未知变量原样保留（单次替换，变量值中的占位符不会再次展开）
pub fn render(text: &str, vars: &BTreeMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// 模板列表项
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateView {
    pub name: &'static str,
    pub description: &'static str,
    pub variables: &'static [&'static str],
    pub subject: String,
    pub body: String,
    /// 是否已被管理员自定义
    pub customized: bool,
}

/// 读取模板（含覆盖项）
pub fn load(conn: &Connection, def: &TemplateDef) -> rusqlite::Result<TemplateContent> {
    let stored = db::settings::get(conn, &setting_key(def.name))?;
    Ok(def.resolve(stored.as_deref()))
}

/// 全部模板的当前内容
pub fn list(conn: &Connection) -> rusqlite::Result<Vec<TemplateView>> {
    let overrides = db::settings::with_prefix(conn, EMAIL_TEMPLATE_PREFIX)?;
    Ok(TEMPLATES
        .iter()
        .map(|def| {
            let stored = overrides.get(&setting_key(def.name));
            let content = def.resolve(stored.map(String::as_str));
            TemplateView {
                name: def.name,
                description: def.description,
                variables: def.variables,
                subject: content.subject,
                body: content.body,
                customized: stored.is_some(),
            }
        })
        .collect())
}

/// 保存覆盖项
pub fn save(
    conn: &Connection,
    def: &TemplateDef,
    content: &TemplateContent,
    now: &str,
) -> ApiResult<()> {
    content.validate()?;
    let json = serde_json::to_string(content).map_err(ApiError::internal)?;
    db::settings::upsert(conn, &setting_key(def.name), &json, now)?;
    Ok(())
}

/// 删除覆盖项（恢复默认），返回是否存在覆盖项
pub fn reset(conn: &Connection, def: &TemplateDef) -> rusqlite::Result<bool> {
    db::settings::delete(conn, &setting_key(def.name))
}
