//! 登录认证
//!
//! 密码使用 bcrypt 存储，登录成功后签发 JWT，
//! 同时写入 `toolbox_auth` Cookie 并在响应体中返回。

pub mod captcha;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod rate_limit;

use crate::common::now_rfc3339;
use crate::db::{self, Database};
use crate::error::{ApiError, ApiResult};
use crate::model::user::{UserProfile, UserRole, UserStatus, validate_password};

/// 认证 Cookie 名称
pub const AUTH_COOKIE: &str = "toolbox_auth";

/// bcrypt 计算成本
const BCRYPT_COST: u32 = 10;

/// 计算密码哈希（CPU 密集，在阻塞线程池执行）
pub async fn hash_password(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || {
        bcrypt::hash(password, BCRYPT_COST).map_err(|e| ApiError::internal(format!("密码哈希失败: {}", e)))
    })
    .await?
}

/// 校验密码（哈希无法解析时视为不匹配）
pub async fn verify_password(password: String, hash: String) -> ApiResult<bool> {
    let matched = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await?;
    Ok(matched.unwrap_or_else(|e| {
        tracing::warn!("密码哈希格式无效: {}", e);
        false
    }))
}

/// 生成随机初始密码
fn random_password() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..16].to_string()
}

/// 用户表为空时创建初始管理员
///
/// 返回是否创建了管理员
pub async fn bootstrap_admin(
    db: &Database,
    username: &str,
    password: Option<&str>,
) -> ApiResult<bool> {
    let count = db.call(|conn| Ok(db::users::count(conn)?)).await?;
    if count > 0 {
        return Ok(false);
    }

    let (password, generated) = match password.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => (p.to_string(), false),
        None => (random_password(), true),
    };
    validate_password(&password)?;

    let profile = UserProfile {
        username: username.trim().to_string(),
        email: None,
        role: UserRole::Admin,
        status: UserStatus::Active,
        avatar: None,
        qq: None,
    };
    if profile.username.is_empty() {
        return Err(ApiError::invalid("初始管理员用户名不能为空"));
    }
    let hash = hash_password(password.clone()).await?;
    let name = profile.username.clone();
    db.call(move |conn| Ok(db::users::insert(conn, &profile, &hash, &now_rfc3339())?))
        .await?;

    if generated {
        tracing::warn!(
            "已创建初始管理员 {}，随机密码: {}（请登录后立即修改）",
            name,
            password
        );
    } else {
        tracing::info!("已创建初始管理员 {}", name);
    }
    Ok(true)
}
