//! 用户

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::avatar::{self, AvatarInput};
use crate::common::validate::{char_len, is_http_url, looks_like_email};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }
}

impl FromStr for UserRole {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            other => Err(ApiError::invalid(format!("未知角色: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Disabled,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Disabled => "disabled",
        }
    }
}

impl FromStr for UserStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "disabled" => Ok(UserStatus::Disabled),
            other => Err(ApiError::invalid(format!("未知用户状态: {}", other))),
        }
    }
}

/// 数据库中的用户记录
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub qq: Option<String>,
    pub password_hash: String,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn is_active_admin(&self) -> bool {
        self.role == UserRole::Admin && self.status == UserStatus::Active
    }

    /// 对外展示视图（不含密码哈希，头像离线解析）
    pub fn to_view(&self) -> UserView {
        let resolved = avatar::resolve_offline(&AvatarInput {
            url: self.avatar.clone(),
            qq: self.qq.clone(),
            email: self.email.clone(),
            name: Some(self.username.clone()),
        });
        UserView {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            status: self.status,
            avatar: self.avatar.clone(),
            qq: self.qq.clone(),
            avatar_url: resolved.url,
            last_login_at: self.last_login_at.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

/// 用户展示视图
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub qq: Option<String>,
    /// 按 URL → QQ → Gravatar → 字母头像 解析出的头像地址
    pub avatar_url: String,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// 写入数据库的用户资料（不含密码）
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub username: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub qq: Option<String>,
}

/// 创建用户请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub qq: Option<String>,
}

/// 更新用户请求（未提供的字段保持不变，空字符串表示清除）
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub avatar: Option<String>,
    pub qq: Option<String>,
}

pub const MIN_PASSWORD_CHARS: usize = 8;

impl CreateUserRequest {
    pub fn into_profile(self) -> ApiResult<(UserProfile, String)> {
        validate_password(&self.password)?;
        let profile = UserProfile {
            username: self.username.trim().to_string(),
            email: non_empty(self.email),
            role: self.role,
            status: self.status,
            avatar: non_empty(self.avatar),
            qq: non_empty(self.qq),
        };
        profile.validate()?;
        Ok((profile, self.password))
    }
}

impl UpdateUserRequest {
    pub fn apply_to(self, user: &User) -> ApiResult<UserProfile> {
        let profile = UserProfile {
            username: self
                .username
                .map(|u| u.trim().to_string())
                .unwrap_or_else(|| user.username.clone()),
            email: self.email.map_or_else(|| user.email.clone(), |e| non_empty(Some(e))),
            role: self.role.unwrap_or(user.role),
            status: self.status.unwrap_or(user.status),
            avatar: self.avatar.map_or_else(|| user.avatar.clone(), |a| non_empty(Some(a))),
            qq: self.qq.map_or_else(|| user.qq.clone(), |q| non_empty(Some(q))),
        };
        profile.validate()?;
        Ok(profile)
    }
}

impl UserProfile {
    fn validate(&self) -> ApiResult<()> {
        let len = char_len(&self.username);
        if !(3..=32).contains(&len)
            || !self
                .username
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(ApiError::invalid(
                "用户名需为 3-32 个字符，只能包含字母、数字、下划线、点和短横线",
            ));
        }
        if let Some(email) = &self.email {
            if !looks_like_email(email) {
                return Err(ApiError::invalid("邮箱格式无效"));
            }
        }
        if let Some(avatar) = &self.avatar {
            if !is_http_url(avatar) && !avatar.starts_with("data:image/") {
                return Err(ApiError::invalid("头像地址格式无效"));
            }
        }
        if let Some(qq) = &self.qq {
            if !avatar::is_valid_qq(qq) {
                return Err(ApiError::invalid("QQ 号格式无效"));
            }
        }
        Ok(())
    }
}

/// 校验密码强度
pub fn validate_password(password: &str) -> ApiResult<()> {
    if char_len(password) < MIN_PASSWORD_CHARS {
        return Err(ApiError::invalid(format!(
            "密码至少需要 {} 个字符",
            MIN_PASSWORD_CHARS
        )));
    }
    if char_len(password) > 72 {
        // bcrypt 只使用前 72 字节
        return Err(ApiError::invalid("密码不能超过 72 个字符"));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
