//! 认证中间件

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use super::AUTH_COOKIE;
use super::jwt::Claims;
use crate::common::auth::extract_bearer_token;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::model::user::{User, UserRole, UserStatus};
use crate::state::AppState;

/// 当前登录用户（由中间件写入请求扩展）
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub claims: Claims,
}

/// 从 Cookie 或 `Authorization: Bearer` 中读取 Token
fn extract_token(request: &Request<Body>) -> Option<String> {
    CookieJar::from_headers(request.headers())
        .get(AUTH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| extract_bearer_token(request))
}

/// 校验 Token 并加载仍处于启用状态的用户
async fn authenticate(state: &AppState, token: Option<String>) -> ApiResult<CurrentUser> {
    let token = token.ok_or(ApiError::Unauthorized)?;
    let claims = state.jwt.verify(&token).map_err(|e| {
        tracing::debug!("Token 校验失败: {}", e);
        ApiError::Unauthorized
    })?;

    let id = claims.sub;
    let user = state
        .db
        .call(move |conn| Ok(db::users::get(conn, id)?))
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if user.status != UserStatus::Active {
        return Err(ApiError::Unauthorized);
    }
    Ok(CurrentUser { user, claims })
}

/// 需要登录
pub async fn require_login(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&request);
    let current = authenticate(&state, token).await?;
    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}

/// 需要管理员角色
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&request);
    let current = authenticate(&state, token).await?;
    // 以数据库中的当前角色为准，降级后旧 Token 立即失效
    if current.user.role != UserRole::Admin {
        return Err(ApiError::Forbidden("需要管理员权限".to_string()));
    }
    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    use crate::db::Database;
    use crate::model::config::Config;

    fn assert_send<T: Send>(value: T) -> T {
        value
    }

    #[tokio::test]
    async fn test_authenticate_future_is_send() {
        let state = AppState::new(Config::default(), Database::open_in_memory().unwrap()).unwrap();
        let result = assert_send(authenticate(&state, None)).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));

        let result = assert_send(authenticate(&state, Some("not.a.jwt".into()))).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[test]
    fn test_extract_token_prefers_cookie() {
        let request = Request::builder()
            .header(header::COOKIE, format!("theme=dark; {}=from-cookie", AUTH_COOKIE))
            .header(header::AUTHORIZATION, "Bearer from-header")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&request).as_deref(), Some("from-cookie"));

        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer from-header")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&request).as_deref(), Some("from-header"));
    }
}
