//! JWT Token 管理模块
//!
//! 提供 JWT Token 的生成和验证功能

use anyhow::{Result, anyhow};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::user::{User, UserRole};

/// JWT Claims 结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户 ID
    pub sub: i64,
    pub username: String,
    pub role: UserRole,
    /// 签发时间 (Unix timestamp)
    pub iat: u64,
    /// 过期时间 (Unix timestamp)
    pub exp: u64,
}

/// 从配置的密钥派生 HMAC 密钥
///
/// 使用 SHA256 哈希作为 JWT 签名密钥
fn derive_secret_key(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

/// JWT 签发与校验
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_secs: u64,
}

impl JwtManager {
    pub fn new(secret: &str, expiry_hours: u64) -> Self {
        let key = derive_secret_key(secret);
        Self {
            encoding: EncodingKey::from_secret(&key),
            decoding: DecodingKey::from_secret(&key),
            expiry_secs: expiry_hours.max(1) * 60 * 60,
        }
    }

    /// Token 有效期（秒）
    pub fn expiry_secs(&self) -> u64 {
        self.expiry_secs
    }

    /// 为用户签发 Token，返回 (token, 过期秒数)
    pub fn issue(&self, user: &User) -> Result<(String, u64)> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_secs();

        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now,
            exp: now + self.expiry_secs,
        };

        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok((token, self.expiry_secs))
    }

    /// 验证 Token（过期、签名错误均返回错误）
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| anyhow!("Invalid token: {}", e))?;
        Ok(token_data.claims)
    }
}

/// 生成随机密钥（未配置 jwtSecret 时使用）
pub fn random_secret() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}
