//! Admin API HTTP 处理器

use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use super::service;
use super::types::{
    EmailConfigResponse, FeedbackListQuery, FetchIconRequest, FriendLinkListQuery,
    LinkCheckSummary, SaveEmailConfigRequest, SeedRequest, SetPasswordRequest, StatsResponse,
    TemplatePreviewRequest, TestEmailRequest, ToolListQuery, UserListQuery, non_blank,
};
use crate::auth::middleware::CurrentUser;
use crate::common::now_rfc3339;
use crate::db;
use crate::error::{ApiError, ApiResult, SuccessResponse};
use crate::icon::{self, IconResult};
use crate::model::Page;
use crate::model::feedback::{Feedback, FeedbackKind, FeedbackStatus, FeedbackStatusRequest};
use crate::model::friend_link::{FriendLink, FriendLinkRequest, FriendLinkStatus, ReviewRequest};
use crate::model::setting::{EMAIL_TEMPLATE_PREFIX, KNOWN_SETTINGS, SaveSettingsRequest};
use crate::model::tool::{CreateToolRequest, Tool, UpdateToolRequest};
use crate::model::user::{CreateUserRequest, UpdateUserRequest, UserView};
use crate::notification::templates::{self, TemplateContent, TemplateView};
use crate::seed::{self, SeedReport};
use crate::state::AppState;

// ============ 工具 ============

/// GET /api/admin/tools
pub async fn list_tools(
    State(state): State<AppState>,
    Query(query): Query<ToolListQuery>,
) -> ApiResult<Json<Page<Tool>>> {
    let filter = db::tools::AdminToolFilter {
        category: non_blank(query.category.as_deref())
            .map(str::parse)
            .transpose()?,
        status: non_blank(query.status.as_deref())
            .map(str::parse)
            .transpose()?,
        featured: query.featured,
        query: query.q.clone(),
    };
    let pagination = query.pagination();
    let (page, page_size) = pagination.resolve();
    let (total, items) = state
        .db
        .call(move |conn| {
            Ok(db::tools::list_filtered(
                conn,
                &filter,
                page_size,
                pagination.offset(),
            )?)
        })
        .await?;
    Ok(Json(Page {
        total,
        page,
        page_size,
        items,
    }))
}

/// POST /api/admin/tools
pub async fn create_tool(
    State(state): State<AppState>,
    Json(payload): Json<CreateToolRequest>,
) -> ApiResult<(StatusCode, Json<Tool>)> {
    let draft = payload.into_draft()?;
    let tool = state
        .db
        .call(move |conn| {
            if db::tools::exists_url(conn, &draft.url)? {
                return Err(ApiError::Conflict(format!("地址为 {} 的工具已存在", draft.url)));
            }
            let id = db::tools::insert(conn, &draft, &now_rfc3339())?;
            db::tools::get(conn, id)?.ok_or_else(|| ApiError::not_found("工具"))
        })
        .await?;
    state.catalog.invalidate();
    tracing::info!("已创建工具 #{} {}", tool.id, tool.name);
    Ok((StatusCode::CREATED, Json(tool)))
}

/// GET /api/admin/tools/{id}（含下架工具）
pub async fn get_tool(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Tool>> {
    state
        .db
        .call(move |conn| Ok(db::tools::get(conn, id)?))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("工具 #{}", id)))
}

/// PUT /api/admin/tools/{id}
pub async fn update_tool(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateToolRequest>,
) -> ApiResult<Json<Tool>> {
    let tool = state
        .db
        .call(move |conn| {
            let current = db::tools::get(conn, id)?
                .ok_or_else(|| ApiError::not_found(format!("工具 #{}", id)))?;
            let draft = payload.apply_to(&current)?;
            if draft.url != current.url && db::tools::exists_url(conn, &draft.url)? {
                return Err(ApiError::Conflict(format!("地址为 {} 的工具已存在", draft.url)));
            }
            db::tools::update(conn, id, &draft, &now_rfc3339())?;
            db::tools::get(conn, id)?.ok_or_else(|| ApiError::not_found(format!("工具 #{}", id)))
        })
        .await?;
    state.catalog.invalidate();
    Ok(Json(tool))
}

/// DELETE /api/admin/tools/{id}
pub async fn delete_tool(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SuccessResponse>> {
    let deleted = state
        .db
        .call(move |conn| Ok(db::tools::delete(conn, id)?))
        .await?;
    if !deleted {
        return Err(ApiError::not_found(format!("工具 #{}", id)));
    }
    state.catalog.invalidate();
    tracing::info!("已删除工具 #{}", id);
    Ok(Json(SuccessResponse::new(format!("工具 #{} 已删除", id))))
}

/// POST /api/admin/tools/fetch-icon
pub async fn fetch_icon(
    State(state): State<AppState>,
    Json(payload): Json<FetchIconRequest>,
) -> ApiResult<Json<IconResult>> {
    Ok(Json(icon::extract_icons(&state.http, &payload.url).await?))
}

// ============ 用户 ============

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Json<Page<UserView>>> {
    let pagination = query.pagination();
    let (page, page_size) = pagination.resolve();
    let (total, users) = state
        .db
        .call(move |conn| {
            Ok(db::users::list(
                conn,
                query.q.as_deref(),
                page_size,
                pagination.offset(),
            )?)
        })
        .await?;
    Ok(Json(Page {
        total,
        page,
        page_size,
        items: users.iter().map(|u| u.to_view()).collect(),
    }))
}

/// POST /api/admin/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    let user = service::create_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /api/admin/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserView>> {
    Ok(Json(
        service::update_user(&state, current.user.id, id, payload).await?,
    ))
}

/// DELETE /api/admin/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SuccessResponse>> {
    service::delete_user(&state, current.user.id, id).await?;
    Ok(Json(SuccessResponse::new(format!("用户 #{} 已删除", id))))
}

/// POST /api/admin/users/{id}/password
pub async fn set_user_password(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<SetPasswordRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    service::set_user_password(&state, id, payload.password).await?;
    Ok(Json(SuccessResponse::new("密码已重置")))
}

// ============ 设置 ============

/// GET /api/admin/settings
///
/// 已知设置项（含默认值）加上其它自定义键，不含邮件模板覆盖项
pub async fn get_settings(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    let stored = state.db.call(|conn| Ok(db::settings::all(conn)?)).await?;
    let mut settings: BTreeMap<String, String> = KNOWN_SETTINGS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    settings.extend(
        stored
            .into_iter()
            .filter(|(k, _)| !k.starts_with(EMAIL_TEMPLATE_PREFIX)),
    );
    Ok(Json(settings))
}

/// PUT /api/admin/settings
pub async fn save_settings(
    State(state): State<AppState>,
    Json(payload): Json<SaveSettingsRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    payload.validate()?;
    if let Some(key) = payload
        .settings
        .keys()
        .find(|k| k.starts_with(EMAIL_TEMPLATE_PREFIX))
    {
        return Err(ApiError::invalid(format!(
            "邮件模板请通过模板接口修改: {}",
            key
        )));
    }
    let count = payload.settings.len();
    state
        .db
        .call(move |conn| {
            Ok(db::settings::upsert_many(
                conn,
                &payload.settings,
                &now_rfc3339(),
            )?)
        })
        .await?;
    tracing::info!("已保存 {} 项设置", count);
    Ok(Json(SuccessResponse::new(format!("已保存 {} 项设置", count))))
}

// ============ 友链 ============

/// GET /api/admin/friend-links
pub async fn list_friend_links(
    State(state): State<AppState>,
    Query(query): Query<FriendLinkListQuery>,
) -> ApiResult<Json<Page<FriendLink>>> {
    let status: Option<FriendLinkStatus> = non_blank(query.status.as_deref())
        .map(str::parse)
        .transpose()?;
    let pagination = query.pagination();
    let (page, page_size) = pagination.resolve();
    let (total, items) = state
        .db
        .call(move |conn| {
            Ok(db::friend_links::list(
                conn,
                status,
                query.q.as_deref(),
                page_size,
                pagination.offset(),
            )?)
        })
        .await?;
    Ok(Json(Page {
        total,
        page,
        page_size,
        items,
    }))
}

/// POST /api/admin/friend-links（直接创建为已通过）
pub async fn create_friend_link(
    State(state): State<AppState>,
    Json(payload): Json<FriendLinkRequest>,
) -> ApiResult<(StatusCode, Json<FriendLink>)> {
    let link = service::create_friend_link(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// PUT /api/admin/friend-links/{id}
pub async fn update_friend_link(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<FriendLinkRequest>,
) -> ApiResult<Json<FriendLink>> {
    Ok(Json(service::update_friend_link(&state, id, payload).await?))
}

/// DELETE /api/admin/friend-links/{id}
pub async fn delete_friend_link(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SuccessResponse>> {
    let deleted = state
        .db
        .call(move |conn| Ok(db::friend_links::delete(conn, id)?))
        .await?;
    if !deleted {
        return Err(ApiError::not_found(format!("友链 #{}", id)));
    }
    Ok(Json(SuccessResponse::new(format!("友链 #{} 已删除", id))))
}

/// POST /api/admin/friend-links/{id}/review
pub async fn review_friend_link(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ReviewRequest>,
) -> ApiResult<Json<FriendLink>> {
    Ok(Json(service::review_friend_link(&state, id, payload).await?))
}

/// POST /api/admin/friend-links/check
pub async fn check_friend_links(
    State(state): State<AppState>,
) -> ApiResult<Json<LinkCheckSummary>> {
    Ok(Json(service::check_friend_links(&state).await?))
}

// ============ 反馈 ============

/// GET /api/admin/feedback
pub async fn list_feedback(
    State(state): State<AppState>,
    Query(query): Query<FeedbackListQuery>,
) -> ApiResult<Json<Page<Feedback>>> {
    let status: Option<FeedbackStatus> = non_blank(query.status.as_deref())
        .map(str::parse)
        .transpose()?;
    let kind: Option<FeedbackKind> = non_blank(query.kind.as_deref())
        .map(str::parse)
        .transpose()?;
    let pagination = query.pagination();
    let (page, page_size) = pagination.resolve();
    let (total, items) = state
        .db
        .call(move |conn| {
            Ok(db::feedback::list(
                conn,
                status,
                kind,
                page_size,
                pagination.offset(),
            )?)
        })
        .await?;
    Ok(Json(Page {
        total,
        page,
        page_size,
        items,
    }))
}

/// PUT /api/admin/feedback/{id}/status
pub async fn set_feedback_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<FeedbackStatusRequest>,
) -> ApiResult<Json<Feedback>> {
    let feedback = state
        .db
        .call(move |conn| {
            if !db::feedback::set_status(conn, id, payload.status, &now_rfc3339())? {
                return Err(ApiError::not_found(format!("反馈 #{}", id)));
            }
            db::feedback::get(conn, id)?.ok_or_else(|| ApiError::not_found(format!("反馈 #{}", id)))
        })
        .await?;
    Ok(Json(feedback))
}

/// DELETE /api/admin/feedback/{id}
pub async fn delete_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SuccessResponse>> {
    let deleted = state
        .db
        .call(move |conn| Ok(db::feedback::delete(conn, id)?))
        .await?;
    if !deleted {
        return Err(ApiError::not_found(format!("反馈 #{}", id)));
    }
    Ok(Json(SuccessResponse::new(format!("反馈 #{} 已删除", id))))
}

// ============ 邮件配置 ============

/// GET /api/admin/config/email
pub async fn get_email_config(State(state): State<AppState>) -> Json<EmailConfigResponse> {
    Json(service::get_email_config(&state))
}

/// PUT /api/admin/config/email
pub async fn save_email_config(
    State(state): State<AppState>,
    Json(payload): Json<SaveEmailConfigRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    service::save_email_config(&state, payload).await?;
    Ok(Json(SuccessResponse::new("邮件配置已保存")))
}

/// POST /api/admin/config/email/test
pub async fn test_email(
    State(state): State<AppState>,
    Json(payload): Json<TestEmailRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    service::test_email(&state, payload).await?;
    Ok(Json(SuccessResponse::new("测试邮件发送成功")))
}

// ============ 邮件模板 ============

/// GET /api/admin/email-templates
pub async fn list_templates(State(state): State<AppState>) -> ApiResult<Json<Vec<TemplateView>>> {
    let list = state.db.call(|conn| Ok(templates::list(conn)?)).await?;
    Ok(Json(list))
}

/// PUT /api/admin/email-templates/{name}
pub async fn save_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<TemplateContent>,
) -> ApiResult<Json<SuccessResponse>> {
    let def = templates::require(&name)?;
    state
        .db
        .call(move |conn| templates::save(conn, def, &payload, &now_rfc3339()))
        .await?;
    tracing::info!("邮件模板 {} 已更新", def.name);
    Ok(Json(SuccessResponse::new(format!("邮件模板 {} 已保存", def.name))))
}

/// DELETE /api/admin/email-templates/{name}（恢复默认）
pub async fn reset_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    let def = templates::require(&name)?;
    let existed = state
        .db
        .call(move |conn| Ok(templates::reset(conn, def)?))
        .await?;
    let message = if existed {
        format!("邮件模板 {} 已恢复默认", def.name)
    } else {
        format!("邮件模板 {} 未自定义，无需恢复", def.name)
    };
    Ok(Json(SuccessResponse::new(message)))
}

/// POST /api/admin/email-templates/{name}/preview
pub async fn preview_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<TemplatePreviewRequest>,
) -> ApiResult<Json<TemplateContent>> {
    Ok(Json(service::preview_template(&state, &name, payload).await?))
}

// ============ 统计与种子数据 ============

/// GET /api/admin/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    Ok(Json(service::stats(&state).await?))
}

/// POST /api/admin/seed
pub async fn seed(
    State(state): State<AppState>,
    Json(payload): Json<SeedRequest>,
) -> ApiResult<Json<SeedReport>> {
    let reset = payload.reset;
    let report = state
        .db
        .call(move |conn| Ok(seed::run(conn, reset)?))
        .await?;
    state.catalog.invalidate();
    Ok(Json(report))
}
