//! 认证相关处理器
//!
//! 提供验证码、登录、登出、当前用户与修改密码端点

use std::net::SocketAddr;

use axum::{
    Extension,
    extract::{ConnectInfo, State},
    response::Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use super::middleware::CurrentUser;
use super::{AUTH_COOKIE, hash_password, verify_password};
use crate::common::now_rfc3339;
use crate::db;
use crate::error::{ApiError, ApiResult, SuccessResponse};
use crate::model::user::{UserStatus, UserView, validate_password};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CaptchaResponse {
    pub token: String,
    /// PNG data URL
    pub image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub captcha_token: Option<String>,
    pub captcha_answer: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: u64,
    pub user: UserView,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// GET /api/auth/captcha
pub async fn get_captcha(State(state): State<AppState>) -> ApiResult<Json<CaptchaResponse>> {
    let (token, image) = state.captcha.generate()?;
    Ok(Json(CaptchaResponse { token, image }))
}

/// 认证 Cookie（`max_age` 与 Token 有效期一致）
fn auth_cookie(state: &AppState, token: String, max_age_secs: u64) -> Cookie<'static> {
    let secure = state.base_url().starts_with("https://");
    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(max_age_secs as i64))
        .build()
}

/// POST /api/auth/login
///
/// 校验限流与验证码后验证用户名密码，签发 JWT
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<LoginResponse>)> {
    let ip = addr.ip().to_string();

    // 1. 速率限制
    state.login_limiter.check(&ip)?;

    // 2. 验证码
    if state.login_captcha_enabled() {
        let (Some(token), Some(answer)) = (
            payload.captcha_token.as_deref(),
            payload.captcha_answer.as_deref(),
        ) else {
            return Err(ApiError::invalid("请输入验证码"));
        };
        state.captcha.verify(token, answer)?;
    }

    // 3. 用户名密码（未知用户与密码错误返回相同提示）
    let invalid = || ApiError::InvalidCredentials("用户名或密码错误".to_string());
    let username = payload.username.trim().to_string();
    let user = state
        .db
        .call(move |conn| Ok(db::users::find_by_username(conn, &username)?))
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::info!("登录失败: {} ({})", user.username, ip);
        return Err(invalid());
    }
    if user.status != UserStatus::Active {
        return Err(ApiError::Forbidden("账号已被禁用".to_string()));
    }

    // 4. 记录登录时间并签发 Token
    let id = user.id;
    let now = now_rfc3339();
    let login_at = now.clone();
    state
        .db
        .call(move |conn| Ok(db::users::touch_last_login(conn, id, &login_at)?))
        .await?;
    let (token, expires_in) = state.jwt.issue(&user)?;

    let mut user = user;
    user.last_login_at = Some(now);
    tracing::info!("用户 {} 登录成功 ({})", user.username, ip);

    let jar = jar.add(auth_cookie(&state, token.clone(), expires_in));
    Ok((
        jar,
        Json(LoginResponse {
            token,
            expires_in,
            user: user.to_view(),
        }),
    ))
}

/// POST /api/auth/logout
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<SuccessResponse>) {
    let jar = jar.remove(Cookie::build(AUTH_COOKIE).path("/"));
    (jar, Json(SuccessResponse::new("已退出登录")))
}

/// GET /api/auth/me
pub async fn me(Extension(current): Extension<CurrentUser>) -> Json<UserView> {
    Json(current.user.to_view())
}

/// PUT /api/auth/password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    if !verify_password(payload.old_password, current.user.password_hash.clone()).await? {
        return Err(ApiError::invalid("原密码错误"));
    }
    validate_password(&payload.new_password)?;

    let hash = hash_password(payload.new_password).await?;
    let id = current.user.id;
    state
        .db
        .call(move |conn| Ok(db::users::update_password(conn, id, &hash, &now_rfc3339())?))
        .await?;
    tracing::info!("用户 {} 已修改密码", current.user.username);
    Ok(Json(SuccessResponse::new("密码已修改")))
}
