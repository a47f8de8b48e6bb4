//! Admin API 路由配置

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use super::handlers::{
    check_friend_links, create_friend_link, create_tool, create_user, delete_feedback,
    delete_friend_link, delete_tool, delete_user, fetch_icon, get_email_config, get_settings,
    get_tool, list_feedback, list_friend_links, list_templates, list_tools, list_users,
    preview_template, reset_template, review_friend_link, save_email_config, save_settings,
    save_template, seed, set_feedback_status, set_user_password, stats, test_email,
    update_friend_link, update_tool, update_user,
};
use crate::auth::middleware::require_admin;
use crate::state::AppState;

/// 创建 Admin API 路由（挂载于 `/api/admin`）
///
/// # 端点
/// - `GET|POST /tools`，`GET|PUT|DELETE /tools/{id}`，`POST /tools/fetch-icon`
/// - `GET|POST /users`，`PUT|DELETE /users/{id}`，`POST /users/{id}/password`
/// - `GET|PUT /settings`
/// - `GET|POST /friend-links`，`PUT|DELETE /friend-links/{id}`
/// - `POST /friend-links/{id}/review`，`POST /friend-links/check`
/// - `GET /feedback`，`PUT /feedback/{id}/status`，`DELETE /feedback/{id}`
/// - `GET|PUT /config/email`，`POST /config/email/test`
/// - `GET /email-templates`，`PUT|DELETE /email-templates/{name}`，
///   `POST /email-templates/{name}/preview`
/// - `GET /stats`，`POST /seed`
///
/// # 认证
/// 需要管理员登录，Token 来自 `toolbox_auth` Cookie 或 `Authorization: Bearer`
pub fn create_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/tools", get(list_tools).post(create_tool))
        .route("/tools/fetch-icon", post(fetch_icon))
        .route(
            "/tools/{id}",
            get(get_tool).put(update_tool).delete(delete_tool),
        )
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", put(update_user).delete(delete_user))
        .route("/users/{id}/password", post(set_user_password))
        .route("/settings", get(get_settings).put(save_settings))
        .route(
            "/friend-links",
            get(list_friend_links).post(create_friend_link),
        )
        .route("/friend-links/check", post(check_friend_links))
        .route(
            "/friend-links/{id}",
            put(update_friend_link).delete(delete_friend_link),
        )
        .route("/friend-links/{id}/review", post(review_friend_link))
        .route("/feedback", get(list_feedback))
        .route("/feedback/{id}", delete(delete_feedback))
        .route("/feedback/{id}/status", put(set_feedback_status))
        .route(
            "/config/email",
            get(get_email_config).put(save_email_config),
        )
        .route("/config/email/test", post(test_email))
        .route("/email-templates", get(list_templates))
        .route(
            "/email-templates/{name}",
            put(save_template).delete(reset_template),
        )
        .route("/email-templates/{name}/preview", post(preview_template))
        .route("/stats", get(stats))
        .route("/seed", post(seed))
        .route_layer(middleware::from_fn_with_state(state, require_admin))
}
