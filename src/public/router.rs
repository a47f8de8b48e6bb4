//! 公开 API 路由配置

use axum::{
    Router,
    routing::{get, post},
};

use super::handlers::{
    apply_friend_link, get_tool, health, list_categories, list_friend_links, list_tools,
    public_settings, record_click, record_view, resolve_avatar, submit_feedback,
};
use crate::state::AppState;

/// 创建公开 API 路由（挂载于 `/api`）
///
/// # 端点
/// - `GET /health` - 健康检查
/// - `GET /tools` - 工具列表（分类、关键字、精选过滤，分页）
/// - `GET /tools/categories` - 分类计数
/// - `GET /tools/{id}` - 工具详情（仅上架）
/// - `POST /tools/{id}/view` / `POST /tools/{id}/click` - 计数
/// - `GET /friend-links` - 已通过的友链
/// - `POST /friend-links/apply` - 提交友链申请
/// - `POST /feedback` - 提交反馈
/// - `GET /settings` - 公开站点设置
/// - `GET /avatar` - 头像解析
pub fn create_public_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/tools/categories", get(list_categories))
        .route("/tools/{id}", get(get_tool))
        .route("/tools/{id}/view", post(record_view))
        .route("/tools/{id}/click", post(record_click))
        .route("/friend-links", get(list_friend_links))
        .route("/friend-links/apply", post(apply_friend_link))
        .route("/feedback", post(submit_feedback))
        .route("/settings", get(public_settings))
        .route("/avatar", get(resolve_avatar))
}
