//! 邮件通知
//!
//! 反馈与友链事件在这里转换为模板变量，渲染后交给 `EmailNotifier` 异步发送。
//! 通知失败只记录日志，不影响请求结果。

pub mod email;
pub mod templates;

use std::collections::BTreeMap;

pub use email::{EmailNotifier, OutgoingEmail};

use crate::db::{self, Database};
use crate::model::feedback::Feedback;
use crate::model::friend_link::{FriendLink, FriendLinkStatus};
use templates::TemplateContent;

/// 模板变量
pub type Vars = BTreeMap<String, String>;

fn vars<const N: usize>(pairs: [(&str, &str); N]) -> Vars {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// 渲染为待发送邮件
pub fn compose(content: &TemplateContent, vars: &Vars, to: Vec<String>) -> OutgoingEmail {
    let rendered = content.render(vars);
    OutgoingEmail {
        to,
        subject: rendered.subject,
        body: rendered.body,
    }
}

/// 读取模板与站点名称，渲染后入队
///
/// `site_name` 取设置项，未设置时使用 `site.name`
pub async fn dispatch(
    db: &Database,
    notifier: &EmailNotifier,
    site: SiteInfo,
    template: &'static str,
    to: Vec<String>,
    mut vars: Vars,
) {
    if !notifier.is_enabled() || to.is_empty() {
        return;
    }
    let Some(def) = templates::find(template) else {
        tracing::error!("未知的邮件模板: {}", template);
        return;
    };
    let loaded = db
        .call(move |conn| {
            let content = templates::load(conn, def)?;
            let site_name = db::settings::get(conn, "site_name")?;
            Ok((content, site_name))
        })
        .await;
    let (content, site_name) = match loaded {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("读取邮件模板 {} 失败: {}", template, e);
            return;
        }
    };
    vars.insert(
        "site_name".to_string(),
        site_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(site.name),
    );
    vars.insert("site_url".to_string(), site.url);
    notifier.enqueue(compose(&content, &vars, to));
}

/// 邮件中使用的站点信息
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub name: String,
    /// 不含结尾 `/`
    pub url: String,
}

/// 新反馈：通知管理员并向提交者发送确认
pub async fn feedback_submitted(
    db: &Database,
    notifier: &EmailNotifier,
    site: SiteInfo,
    feedback: &Feedback,
) {
    let values = vars([
        ("name", feedback.name.as_str()),
        ("email", feedback.email.as_str()),
        ("kind", feedback.kind.label()),
        ("content", feedback.content.as_str()),
        ("created_at", feedback.created_at.as_str()),
    ]);
    dispatch(
        db,
        notifier,
        site.clone(),
        templates::FEEDBACK_ADMIN,
        notifier.admin_recipients(),
        values.clone(),
    )
    .await;
    dispatch(
        db,
        notifier,
        site,
        templates::FEEDBACK_CONFIRMATION,
        vec![feedback.email.clone()],
        values,
    )
    .await;
}

/// 新友链申请：通知管理员
pub async fn friend_link_applied(
    db: &Database,
    notifier: &EmailNotifier,
    site: SiteInfo,
    link: &FriendLink,
) {
    let values = vars([
        ("link_name", link.site_name.as_str()),
        ("link_url", link.site_url.as_str()),
        ("link_description", link.description.as_str()),
        ("contact_email", link.contact_email.as_deref().unwrap_or("")),
    ]);
    dispatch(
        db,
        notifier,
        site,
        templates::FRIEND_LINK_ADMIN,
        notifier.admin_recipients(),
        values,
    )
    .await;
}

/// 审核结果通知申请人（仅通过/拒绝，且有联系邮箱时）
pub async fn friend_link_reviewed(
    db: &Database,
    notifier: &EmailNotifier,
    site: SiteInfo,
    link: &FriendLink,
) {
    let Some(contact) = link.contact_email.clone() else {
        return;
    };
    let (template, values) = match link.status {
        FriendLinkStatus::Approved => (
            templates::FRIEND_LINK_APPROVED,
            vars([
                ("link_name", link.site_name.as_str()),
                ("link_url", link.site_url.as_str()),
                ("expires_at", link.expires_at.as_deref().unwrap_or("长期有效")),
            ]),
        ),
        FriendLinkStatus::Rejected => (
            templates::FRIEND_LINK_REJECTED,
            vars([
                ("link_name", link.site_name.as_str()),
                ("link_url", link.site_url.as_str()),
                ("reason", link.reject_reason.as_deref().unwrap_or("未说明")),
            ]),
        ),
        _ => return,
    };
    dispatch(db, notifier, site, template, vec![contact], values).await;
}
