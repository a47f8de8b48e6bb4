//! Admin API 业务逻辑
//!
//! 处理器只负责提取参数，校验规则和多步数据库操作集中在这里。

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};

use super::types::{
    EmailConfigResponse, LinkCheckResult, LinkCheckSummary, SaveEmailConfigRequest, StatsResponse,
    TemplatePreviewRequest, TestEmailRequest,
};
use crate::auth::hash_password;
use crate::common::now_rfc3339;
use crate::common::validate::char_len;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::http_client::fetch_text;
use crate::model::config::{Config, EmailConfig};
use crate::model::feedback::FeedbackStatus;
use crate::model::friend_link::{
    FriendLink, FriendLinkRequest, FriendLinkStatus, ReviewAction, ReviewRequest, parse_rfc3339_utc,
};
use crate::model::user::{
    CreateUserRequest, UpdateUserRequest, User, UserProfile, UserRole, UserStatus, UserView,
    validate_password,
};
use crate::notification::{self, EmailNotifier, templates};
use crate::state::AppState;

/// 互链检测并发数
const CHECK_CONCURRENCY: usize = 4;

/// 互链检测单个页面的请求次数
const CHECK_ATTEMPTS: u32 = 2;

// ============ 用户 ============

/// 修改用户前的保护规则
///
/// - 不能禁用自己或取消自己的管理员角色
/// - 最后一个启用状态的管理员不能被禁用或降级
pub fn guard_user_update(
    operator_id: i64,
    target: &User,
    next: &UserProfile,
    active_admins: u64,
) -> ApiResult<()> {
    let stays_active_admin = next.role == UserRole::Admin && next.status == UserStatus::Active;
    if target.id == operator_id && !stays_active_admin {
        return Err(ApiError::Forbidden("不能禁用自己或取消自己的管理员权限".to_string()));
    }
    if target.is_active_admin() && !stays_active_admin && active_admins <= 1 {
        return Err(ApiError::Forbidden("至少需要保留一个启用的管理员".to_string()));
    }
    Ok(())
}

/// 删除用户前的保护规则
pub fn guard_user_delete(operator_id: i64, target: &User, active_admins: u64) -> ApiResult<()> {
    if target.id == operator_id {
        return Err(ApiError::Forbidden("不能删除自己的账号".to_string()));
    }
    if target.is_active_admin() && active_admins <= 1 {
        return Err(ApiError::Forbidden("至少需要保留一个启用的管理员".to_string()));
    }
    Ok(())
}

pub async fn create_user(state: &AppState, request: CreateUserRequest) -> ApiResult<UserView> {
    let (profile, password) = request.into_profile()?;
    let hash = hash_password(password).await?;
    let user = state
        .db
        .call(move |conn| {
            if db::users::find_by_username(conn, &profile.username)?.is_some() {
                return Err(ApiError::Conflict(format!("用户名 {} 已存在", profile.username)));
            }
            let id = db::users::insert(conn, &profile, &hash, &now_rfc3339())?;
            db::users::get(conn, id)?.ok_or_else(|| ApiError::not_found("用户"))
        })
        .await?;
    tracing::info!("已创建用户 #{} {}", user.id, user.username);
    Ok(user.to_view())
}

pub async fn update_user(
    state: &AppState,
    operator_id: i64,
    id: i64,
    request: UpdateUserRequest,
) -> ApiResult<UserView> {
    let user = state
        .db
        .call(move |conn| {
            let target = db::users::get(conn, id)?
                .ok_or_else(|| ApiError::not_found(format!("用户 #{}", id)))?;
            let profile = request.apply_to(&target)?;
            if profile.username != target.username {
                if let Some(other) = db::users::find_by_username(conn, &profile.username)? {
                    if other.id != id {
                        return Err(ApiError::Conflict(format!(
                            "用户名 {} 已存在",
                            profile.username
                        )));
                    }
                }
            }
            let active_admins = db::users::count_active_admins(conn)?;
            guard_user_update(operator_id, &target, &profile, active_admins)?;
            db::users::update_profile(conn, id, &profile, &now_rfc3339())?;
            db::users::get(conn, id)?.ok_or_else(|| ApiError::not_found(format!("用户 #{}", id)))
        })
        .await?;
    tracing::info!("已更新用户 #{} {}", user.id, user.username);
    Ok(user.to_view())
}

pub async fn delete_user(state: &AppState, operator_id: i64, id: i64) -> ApiResult<()> {
    let username = state
        .db
        .call(move |conn| {
            let target = db::users::get(conn, id)?
                .ok_or_else(|| ApiError::not_found(format!("用户 #{}", id)))?;
            let active_admins = db::users::count_active_admins(conn)?;
            guard_user_delete(operator_id, &target, active_admins)?;
            db::users::delete(conn, id)?;
            Ok(target.username)
        })
        .await?;
    tracing::info!("已删除用户 #{} {}", id, username);
    Ok(())
}

pub async fn set_user_password(state: &AppState, id: i64, password: String) -> ApiResult<()> {
    validate_password(&password)?;
    let hash = hash_password(password).await?;
    let updated = state
        .db
        .call(move |conn| Ok(db::users::update_password(conn, id, &hash, &now_rfc3339())?))
        .await?;
    if !updated {
        return Err(ApiError::not_found(format!("用户 #{}", id)));
    }
    tracing::info!("已重置用户 #{} 的密码", id);
    Ok(())
}

// ============ 友链 ============

/// 审核后要写入的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewPlan {
    pub status: FriendLinkStatus,
    pub reject_reason: Option<String>,
    /// `Some` 时覆盖过期时间
    pub expires_at: Option<Option<String>>,
}

/// 根据当前状态与审核请求计算目标状态
///
/// 通过时未指定过期时间：保留未来的过期时间，清除已过去的过期时间
pub fn plan_review(link: &FriendLink, request: &ReviewRequest, now: &str) -> ApiResult<ReviewPlan> {
    let target = request.action.target_status();
    if !link.status.can_transition_to(target) {
        return Err(ApiError::invalid(format!(
            "友链状态不能从 {} 变更为 {}",
            link.status.as_str(),
            target.as_str()
        )));
    }

    let plan = match request.action {
        ReviewAction::Reject => {
            let reason = request
                .reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| ApiError::invalid("拒绝时必须填写原因"))?;
            if char_len(reason) > 200 {
                return Err(ApiError::invalid("拒绝原因不能超过 200 个字符"));
            }
            ReviewPlan {
                status: target,
                reject_reason: Some(reason.to_string()),
                expires_at: None,
            }
        }
        ReviewAction::Approve => {
            let expires_at = match request.expires_at.as_deref().map(str::trim) {
                Some(raw) if !raw.is_empty() => {
                    let parsed = parse_rfc3339_utc(raw)?;
                    if parsed.as_str() <= now {
                        return Err(ApiError::invalid("过期时间必须晚于当前时间"));
                    }
                    Some(Some(parsed))
                }
                _ => match link.expires_at.as_deref() {
                    Some(existing) if existing <= now => Some(None),
                    _ => None,
                },
            };
            ReviewPlan {
                status: target,
                reject_reason: None,
                expires_at,
            }
        }
        ReviewAction::Expire | ReviewAction::Reopen => ReviewPlan {
            status: target,
            reject_reason: None,
            expires_at: None,
        },
    };
    Ok(plan)
}

pub async fn create_friend_link(state: &AppState, request: FriendLinkRequest) -> ApiResult<FriendLink> {
    let draft = request.into_draft(false)?;
    let link = state
        .db
        .call(move |conn| {
            if db::friend_links::live_url_exists(conn, &draft.normalized_url, None)? {
                return Err(ApiError::Conflict("该站点已存在友链或待审核申请".to_string()));
            }
            let id = db::friend_links::insert(
                conn,
                &draft,
                FriendLinkStatus::Approved,
                &now_rfc3339(),
            )?;
            db::friend_links::get(conn, id)?.ok_or_else(|| ApiError::not_found("友链"))
        })
        .await?;
    tracing::info!("管理员添加友链 #{} {}", link.id, link.site_url);
    Ok(link)
}

pub async fn update_friend_link(
    state: &AppState,
    id: i64,
    request: FriendLinkRequest,
) -> ApiResult<FriendLink> {
    let draft = request.into_draft(false)?;
    state
        .db
        .call(move |conn| {
            let current = db::friend_links::get(conn, id)?
                .ok_or_else(|| ApiError::not_found(format!("友链 #{}", id)))?;
            if current.status.is_live()
                && db::friend_links::live_url_exists(conn, &draft.normalized_url, Some(id))?
            {
                return Err(ApiError::Conflict("该站点已存在友链或待审核申请".to_string()));
            }
            db::friend_links::update(conn, id, &draft, &now_rfc3339())?;
            db::friend_links::get(conn, id)?
                .ok_or_else(|| ApiError::not_found(format!("友链 #{}", id)))
        })
        .await
}

/// 审核友链并通知申请人
pub async fn review_friend_link(
    state: &AppState,
    id: i64,
    request: ReviewRequest,
) -> ApiResult<FriendLink> {
    let link = state
        .db
        .call(move |conn| {
            let now = now_rfc3339();
            let link = db::friend_links::get(conn, id)?
                .ok_or_else(|| ApiError::not_found(format!("友链 #{}", id)))?;
            let plan = plan_review(&link, &request, &now)?;
            if plan.status.is_live()
                && db::friend_links::live_url_exists(conn, &link.normalized_url, Some(id))?
            {
                return Err(ApiError::Conflict("该站点已存在其他有效的友链记录".to_string()));
            }
            db::friend_links::set_status(
                conn,
                id,
                plan.status,
                plan.reject_reason.as_deref(),
                plan.expires_at.as_ref().map(|e| e.as_deref()),
                &now,
            )?;
            db::friend_links::get(conn, id)?
                .ok_or_else(|| ApiError::not_found(format!("友链 #{}", id)))
        })
        .await?;
    tracing::info!("友链 #{} 审核为 {}", link.id, link.status.as_str());

    notification::friend_link_reviewed(&state.db, &state.notifier, state.site_info(), &link).await;
    Ok(link)
}

/// 对方页面是否包含指向本站的链接（忽略协议与大小写）
pub fn contains_backlink(html: &str, base_url: &str) -> bool {
    let target = base_url
        .split_once("://")
        .map_or(base_url, |(_, rest)| rest)
        .trim_end_matches('/')
        .to_lowercase();
    !target.is_empty() && html.to_lowercase().contains(&format!("//{}", target))
}

/// 检测全部已通过友链是否互链
pub async fn check_friend_links(state: &AppState) -> ApiResult<LinkCheckSummary> {
    let links = state
        .db
        .call(|conn| Ok(db::friend_links::list_by_status(conn, FriendLinkStatus::Approved)?))
        .await?;
    let base_url = state.base_url();
    let client = state.http.clone();

    let results: Vec<LinkCheckResult> = stream::iter(links)
        .map(|link| {
            let client = client.clone();
            let base_url = base_url.clone();
            async move {
                let (reciprocal, error) =
                    match fetch_text(&client, &link.site_url, CHECK_ATTEMPTS).await {
                        Ok(html) => (Some(contains_backlink(&html, &base_url)), None),
                        Err(e) => {
                            tracing::warn!("互链检测失败 {}: {:#}", link.site_url, e);
                            (None, Some(format!("{:#}", e)))
                        }
                    };
                LinkCheckResult {
                    id: link.id,
                    site_name: link.site_name,
                    site_url: link.site_url,
                    reciprocal,
                    error,
                }
            }
        })
        .buffer_unordered(CHECK_CONCURRENCY)
        .collect()
        .await;

    let records: Vec<(i64, Option<bool>)> = results.iter().map(|r| (r.id, r.reciprocal)).collect();
    state
        .db
        .call(move |conn| {
            let now = now_rfc3339();
            for (id, reciprocal) in records {
                db::friend_links::record_check(conn, id, reciprocal, &now)?;
            }
            Ok(())
        })
        .await?;

    let mut results = results;
    results.sort_by_key(|r| r.id);
    let summary = LinkCheckSummary::from_results(results);
    tracing::info!(
        "互链检测完成: {} 个友链，{} 个互链，{} 个未互链，{} 个无法访问",
        summary.checked,
        summary.reciprocal,
        summary.missing,
        summary.failed
    );
    Ok(summary)
}

// ============ 邮件配置 ============

pub fn get_email_config(state: &AppState) -> EmailConfigResponse {
    EmailConfigResponse::from(state.config.read().email.as_ref())
}

/// 保存邮件配置：写回配置文件并热更新通知器
///
/// 重新读取配置文件后只替换 `email` 段，环境变量覆盖项不会被写入文件
pub async fn save_email_config(state: &AppState, request: SaveEmailConfigRequest) -> ApiResult<()> {
    let previous = state.config.read().email.clone();
    let email = request.into_config(previous.as_ref())?;

    let path = state
        .config
        .read()
        .config_path()
        .map(|p| p.to_path_buf())
        .ok_or_else(|| ApiError::internal("配置文件路径未知，无法保存配置"))?;
    let to_save = email.clone();
    tokio::task::spawn_blocking(move || {
        let mut on_disk = Config::load(&path)?;
        on_disk.email = Some(to_save);
        on_disk.save()
    })
    .await??;

    state.config.write().email = Some(email.clone());
    let enabled = email.enabled;
    state.notifier.update_config(Some(email));
    tracing::info!("邮件配置已更新（{}）", if enabled { "启用" } else { "停用" });
    Ok(())
}

/// 发送测试邮件
pub async fn test_email(state: &AppState, request: TestEmailRequest) -> ApiResult<()> {
    let saved = state.config.read().email.clone();
    let config: EmailConfig = match request.config {
        Some(draft) => draft.into_config(saved.as_ref())?,
        None => saved.ok_or_else(|| ApiError::invalid("尚未配置邮件"))?,
    };
    if config.smtp_host.is_empty() || config.from_address.is_empty() {
        return Err(ApiError::invalid("请先填写 SMTP 服务器和发件人地址"));
    }
    EmailNotifier::send_test(&config, request.to.as_deref())
        .await
        .map_err(|e| ApiError::Upstream(format!("{:#}", e)))
}

// ============ 邮件模板 ============

/// 渲染模板预览：示例变量 < 站点变量 < 请求中的变量
pub async fn preview_template(
    state: &AppState,
    name: &str,
    request: TemplatePreviewRequest,
) -> ApiResult<templates::TemplateContent> {
    let def = templates::require(name)?;
    let (stored, site_name) = state
        .db
        .call(move |conn| {
            Ok((
                templates::load(conn, def)?,
                db::settings::get_or_default(conn, "site_name")?,
            ))
        })
        .await?;
    let content = templates::TemplateContent {
        subject: request.subject.unwrap_or(stored.subject),
        body: request.body.unwrap_or(stored.body),
    };
    content.validate()?;

    let site = state.site_info();
    let mut vars = def.sample_variables();
    vars.insert("site_name".to_string(), site_name);
    vars.insert("site_url".to_string(), site.url);
    vars.extend(request.variables);
    Ok(content.render(&vars))
}

// ============ 统计 ============

pub async fn stats(state: &AppState) -> ApiResult<StatsResponse> {
    state
        .db
        .call(|conn| {
            let tools = db::tools::stats(conn)?;
            let users = db::users::count(conn)?;

            let mut friend_links: BTreeMap<&'static str, u64> = [
                FriendLinkStatus::Pending,
                FriendLinkStatus::Approved,
                FriendLinkStatus::Rejected,
                FriendLinkStatus::Expired,
            ]
            .into_iter()
            .map(|s| (s.as_str(), 0))
            .collect();
            for (status, count) in db::friend_links::count_by_status(conn)? {
                friend_links.insert(status.as_str(), count);
            }

            let mut feedback: BTreeMap<&'static str, u64> =
                [FeedbackStatus::New, FeedbackStatus::Read, FeedbackStatus::Resolved]
                    .into_iter()
                    .map(|s| (s.as_str(), 0))
                    .collect();
            for (status, count) in db::feedback::count_by_status(conn)? {
                feedback.insert(status.as_str(), count);
            }

            Ok(StatsResponse {
                tools,
                users,
                friend_links,
                feedback,
            })
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: UserRole, status: UserStatus) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: None,
            role,
            status,
            avatar: None,
            qq: None,
            password_hash: String::new(),
            last_login_at: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn profile(role: UserRole, status: UserStatus) -> UserProfile {
        UserProfile {
            username: "someone".into(),
            email: None,
            role,
            status,
            avatar: None,
            qq: None,
        }
    }

    fn link(status: FriendLinkStatus, expires_at: Option<&str>) -> FriendLink {
        FriendLink {
            id: 1,
            site_name: "Blog".into(),
            site_url: "https://blog.example.com".into(),
            normalized_url: "https://blog.example.com".into(),
            description: String::new(),
            logo: None,
            contact_email: Some("owner@example.com".into()),
            status,
            reject_reason: None,
            sort_order: 0,
            expires_at: expires_at.map(str::to_string),
            last_checked_at: None,
            reciprocal: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn review(action: ReviewAction, reason: Option<&str>, expires_at: Option<&str>) -> ReviewRequest {
        ReviewRequest {
            action,
            reason: reason.map(str::to_string),
            expires_at: expires_at.map(str::to_string),
        }
    }

    const NOW: &str = "2026-06-01T00:00:00Z";

    #[test]
    fn test_cannot_demote_or_disable_self() {
        let me = user(1, UserRole::Admin, UserStatus::Active);
        let demote = profile(UserRole::User, UserStatus::Active);
        assert!(guard_user_update(1, &me, &demote, 3).is_err());
        let disable = profile(UserRole::Admin, UserStatus::Disabled);
        assert!(guard_user_update(1, &me, &disable, 3).is_err());
        let rename = profile(UserRole::Admin, UserStatus::Active);
        assert!(guard_user_update(1, &me, &rename, 1).is_ok());
    }

    #[test]
    fn test_last_active_admin_protected() {
        let other = user(2, UserRole::Admin, UserStatus::Active);
        let demote = profile(UserRole::User, UserStatus::Active);
        assert!(guard_user_update(1, &other, &demote, 1).is_err());
        assert!(guard_user_update(1, &other, &demote, 2).is_ok());

        assert!(guard_user_delete(1, &other, 1).is_err());
        assert!(guard_user_delete(1, &other, 2).is_ok());
        assert!(guard_user_delete(2, &other, 5).is_err());

        let regular = user(3, UserRole::User, UserStatus::Active);
        assert!(guard_user_delete(1, &regular, 1).is_ok());
    }

    #[test]
    fn test_review_rejects_invalid_transition() {
        let approved = link(FriendLinkStatus::Approved, None);
        let err = plan_review(&approved, &review(ReviewAction::Reopen, None, None), NOW);
        assert!(matches!(err, Err(ApiError::InvalidRequest(_))));
    }

    #[test]
    fn test_reject_requires_reason() {
        let pending = link(FriendLinkStatus::Pending, None);
        assert!(plan_review(&pending, &review(ReviewAction::Reject, Some("  "), None), NOW).is_err());
        let plan =
            plan_review(&pending, &review(ReviewAction::Reject, Some("内容不符"), None), NOW).unwrap();
        assert_eq!(plan.status, FriendLinkStatus::Rejected);
        assert_eq!(plan.reject_reason.as_deref(), Some("内容不符"));
    }

    #[test]
    fn test_approve_expiry_handling() {
        let pending = link(FriendLinkStatus::Pending, None);
        let plan = plan_review(
            &pending,
            &review(ReviewAction::Approve, None, Some("2027-01-01T08:00:00+08:00")),
            NOW,
        )
        .unwrap();
        assert_eq!(plan.expires_at, Some(Some("2027-01-01T00:00:00Z".to_string())));

        assert!(
            plan_review(
                &pending,
                &review(ReviewAction::Approve, None, Some("2020-01-01T00:00:00Z")),
                NOW
            )
            .is_err()
        );

        // 重新通过已过期友链时清除旧的过期时间
        let expired = link(FriendLinkStatus::Expired, Some("2026-01-01T00:00:00Z"));
        let plan = plan_review(&expired, &review(ReviewAction::Approve, None, None), NOW).unwrap();
        assert_eq!(plan.expires_at, Some(None));

        let future = link(FriendLinkStatus::Pending, Some("2030-01-01T00:00:00Z"));
        let plan = plan_review(&future, &review(ReviewAction::Approve, None, None), NOW).unwrap();
        assert_eq!(plan.expires_at, None);
    }

    #[test]
    fn test_contains_backlink() {
        let html = r#"<a href="HTTPS://Tools.Example.com/">工具箱</a>"#;
        assert!(contains_backlink(html, "https://tools.example.com"));
        assert!(contains_backlink(html, "http://tools.example.com/"));
        assert!(!contains_backlink(html, "https://other.example.com"));
        assert!(!contains_backlink("<p>tools.example.com</p>", "https://tools.example.com"));
    }
}
