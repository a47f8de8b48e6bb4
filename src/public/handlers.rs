//! 公开接口处理器

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use crate::avatar::{self, AvatarInput, ResolvedAvatar};
use crate::common::now_rfc3339;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::model::feedback::FeedbackRequest;
use crate::model::friend_link::{FriendLinkRequest, FriendLinkStatus, PublicFriendLink};
use crate::model::tool::{CategoryFilter, Tool};
use crate::model::{Page, Pagination};
use crate::notification;
use crate::search::{self, CategoryCount, ToolFilter};
use crate::seo;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub time: String,
}

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        time: now_rfc3339(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    #[serde(default)]
    pub featured: bool,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// GET /api/tools
pub async fn list_tools(
    State(state): State<AppState>,
    Query(query): Query<ToolQuery>,
) -> ApiResult<Json<Page<Tool>>> {
    let category = match query.category.as_deref() {
        Some(raw) => raw.parse::<CategoryFilter>()?,
        None => CategoryFilter::All,
    };
    let filter = ToolFilter {
        category,
        query: query.q,
        featured_only: query.featured,
    };
    let tools = state.catalog.search(&filter).await?;
    let pagination = Pagination {
        page: query.page,
        page_size: query.page_size,
    };
    Ok(Json(Page::slice(tools, pagination)))
}

/// GET /api/tools/categories
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<CategoryCount>>> {
    let tools = state.catalog.get().await?;
    Ok(Json(search::category_counts(&tools)))
}

/// GET /api/tools/{id}（仅上架工具）
pub async fn get_tool(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Tool>> {
    let tools = state.catalog.get().await?;
    tools
        .iter()
        .find(|t| t.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("工具 #{}", id)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterResponse {
    pub id: i64,
    pub count: i64,
}

async fn bump(state: &AppState, id: i64, counter: db::tools::Counter) -> ApiResult<Json<CounterResponse>> {
    let count = state
        .db
        .call(move |conn| Ok(db::tools::increment(conn, id, counter)?))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("工具 #{}", id)))?;
    Ok(Json(CounterResponse { id, count }))
}

/// POST /api/tools/{id}/view
pub async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CounterResponse>> {
    bump(&state, id, db::tools::Counter::View).await
}

/// POST /api/tools/{id}/click
pub async fn record_click(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CounterResponse>> {
    bump(&state, id, db::tools::Counter::Click).await
}

/// GET /api/friend-links
pub async fn list_friend_links(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PublicFriendLink>>> {
    let now = now_rfc3339();
    let links = state
        .db
        .call(move |conn| Ok(db::friend_links::list_public(conn, &now)?))
        .await?;
    Ok(Json(links.into_iter().map(PublicFriendLink::from).collect()))
}

/// 公开提交的响应
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub id: i64,
}

/// POST /api/friend-links/apply
pub async fn apply_friend_link(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<FriendLinkRequest>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let enabled = state
        .db
        .call(|conn| Ok(db::settings::get_or_default(conn, "friend_link_enabled")?))
        .await?;
    if enabled.trim() != "true" {
        return Err(ApiError::Forbidden("友链申请暂未开放".to_string()));
    }

    state.submit_limiter.check(&addr.ip().to_string())?;

    let mut draft = payload.into_draft(true)?;
    // 排序与有效期由管理员审核时决定
    draft.sort_order = 0;
    draft.expires_at = None;

    let link = state
        .db
        .call(move |conn| {
            if db::friend_links::live_url_exists(conn, &draft.normalized_url, None)? {
                return Err(ApiError::Conflict("该站点已提交过申请或已是友链".to_string()));
            }
            let id =
                db::friend_links::insert(conn, &draft, FriendLinkStatus::Pending, &now_rfc3339())?;
            db::friend_links::get(conn, id)?.ok_or_else(|| ApiError::not_found("友链"))
        })
        .await?;
    tracing::info!("收到友链申请 #{}: {} ({})", link.id, link.site_name, link.site_url);

    notification::friend_link_applied(&state.db, &state.notifier, state.site_info(), &link).await;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            success: true,
            message: "申请已提交，审核通过后将展示在友链页面".to_string(),
            id: link.id,
        }),
    ))
}

/// POST /api/feedback
pub async fn submit_feedback(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<FeedbackRequest>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let ip = addr.ip().to_string();
    state.submit_limiter.check(&ip)?;
    let draft = payload.into_draft()?;

    let feedback = state
        .db
        .call(move |conn| {
            let id = db::feedback::insert(conn, &draft, Some(&ip), &now_rfc3339())?;
            db::feedback::get(conn, id)?.ok_or_else(|| ApiError::not_found("反馈"))
        })
        .await?;
    tracing::info!("收到反馈 #{} ({})", feedback.id, feedback.kind.as_str());

    notification::feedback_submitted(&state.db, &state.notifier, state.site_info(), &feedback)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            success: true,
            message: "感谢您的反馈，我们会尽快处理".to_string(),
            id: feedback.id,
        }),
    ))
}

/// GET /api/settings
pub async fn public_settings(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    let settings = state
        .db
        .call(|conn| Ok(db::settings::public(conn)?))
        .await?;
    Ok(Json(settings))
}

#[derive(Debug, Deserialize)]
pub struct AvatarQuery {
    #[serde(flatten)]
    pub input: AvatarInput,
    /// 是否在线校验 Gravatar
    #[serde(default)]
    pub verify: Option<String>,
}

/// GET /api/avatar
pub async fn resolve_avatar(
    State(state): State<AppState>,
    Query(query): Query<AvatarQuery>,
) -> Json<ResolvedAvatar> {
    let verify = matches!(query.verify.as_deref(), Some("true" | "1"));
    Json(avatar::resolve(&state.http, &query.input, verify).await)
}

/// GET /sitemap.xml
pub async fn sitemap(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let tools = state.catalog.get().await?;
    let xml = seo::sitemap_xml(&state.base_url(), &tools);
    Ok(([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], xml))
}

/// GET /robots.txt
pub async fn robots(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        seo::robots_txt(&state.base_url()),
    )
}
