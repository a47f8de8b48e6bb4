//! CAPTCHA 生成和验证模块
//!
//! 提供基于图像的 CAPTCHA 验证功能，用于防止暴力破解登录

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::{Engine as _, engine::general_purpose};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::common::auth::constant_time_eq;
use crate::error::ApiError;

/// 会话有效期
const SESSION_TTL: Duration = Duration::from_secs(5 * 60);

/// 单个 CAPTCHA 最多验证次数
const MAX_ATTEMPTS: u8 = 3;

/// CAPTCHA 会话信息
#[derive(Debug, Clone)]
struct CaptchaSession {
    /// 正确答案(小写)
    answer: String,
    created_at: Instant,
    attempts: u8,
}

/// CAPTCHA 存储
#[derive(Default)]
pub struct CaptchaStore {
    /// token -> session
    sessions: RwLock<HashMap<String, CaptchaSession>>,
}

impl CaptchaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 生成 CAPTCHA
    ///
    /// 返回 (token, PNG data URL)
    pub fn generate(&self) -> Result<(String, String), CaptchaError> {
        let (answer, png_bytes) = generate_captcha_image()?;
        let token = Uuid::new_v4().to_string();
        self.insert(token.clone(), &answer);

        let data_url = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(&png_bytes)
        );
        Ok((token, data_url))
    }

    fn insert(&self, token: String, answer: &str) {
        self.sessions.write().insert(
            token,
            CaptchaSession {
                answer: answer.to_lowercase(),
                created_at: Instant::now(),
                attempts: 0,
            },
        );
    }

    /// 验证 CAPTCHA 答案（不区分大小写，成功后 token 作废）
    pub fn verify(&self, token: &str, answer: &str) -> Result<(), CaptchaError> {
        let mut sessions = self.sessions.write();

        let session = sessions
            .get_mut(token)
            .ok_or(CaptchaError::TokenNotFound)?;

        if session.created_at.elapsed() >= SESSION_TTL {
            sessions.remove(token);
            return Err(CaptchaError::TokenNotFound);
        }

        if session.attempts >= MAX_ATTEMPTS {
            sessions.remove(token);
            return Err(CaptchaError::TooManyAttempts);
        }

        session.attempts += 1;

        if constant_time_eq(&session.answer, &answer.trim().to_lowercase()) {
            sessions.remove(token);
            Ok(())
        } else {
            Err(CaptchaError::AnswerIncorrect)
        }
    }

    /// 清理过期的 CAPTCHA 会话，返回清理数量
    pub fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| session.created_at.elapsed() < SESSION_TTL);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn answer_for(&self, token: &str) -> Option<String> {
        self.sessions.read().get(token).map(|s| s.answer.clone())
    }
}

/// CAPTCHA 错误类型
#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptchaError {
    #[error("验证码已失效，请刷新后重试")]
    TokenNotFound,
    #[error("验证码错误")]
    AnswerIncorrect,
    #[error("验证码尝试次数过多，请刷新后重试")]
    TooManyAttempts,
    #[error("生成验证码失败")]
    Generation,
}

impl From<CaptchaError> for ApiError {
    fn from(e: CaptchaError) -> Self {
        match e {
            CaptchaError::Generation => ApiError::internal(e),
            _ => ApiError::invalid(e.to_string()),
        }
    }
}

/// 生成 CAPTCHA 图像
///
/// 返回 (答案字符串, PNG 图像字节)
fn generate_captcha_image() -> Result<(String, Vec<u8>), CaptchaError> {
    use captcha::Captcha;
    use captcha::filters::{Noise, Wave};

    let mut captcha = Captcha::new();

    captcha
        .add_chars(4)
        .apply_filter(Noise::new(0.1)) // 轻度噪声
        .apply_filter(Wave::new(2.0, 10.0)) // 波浪扭曲
        .view(160, 60);

    let answer = captcha.chars_as_string();
    let png = captcha.as_png().ok_or(CaptchaError::Generation)?;
    Ok((answer, png))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer_of(store: &CaptchaStore, token: &str) -> String {
        store.answer_for(token).unwrap()
    }

    #[test]
    fn test_captcha_generation() {
        let store = CaptchaStore::new();
        let (token, image) = store.generate().unwrap();

        assert!(!token.is_empty());
        assert!(image.starts_with("data:image/png;base64,"));
        let png = general_purpose::STANDARD
            .decode(image.trim_start_matches("data:image/png;base64,"))
            .unwrap();
        assert!(png.starts_with(&[0x89, 0x50, 0x4E, 0x47])); // PNG 文件头
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_case_insensitive_one_time_use() {
        let store = CaptchaStore::new();
        store.insert("t".into(), "AbCd");
        assert_eq!(answer_of(&store, "t"), "abcd");

        assert!(store.verify("t", " ABCD ").is_ok());
        assert!(matches!(
            store.verify("t", "abcd"),
            Err(CaptchaError::TokenNotFound)
        ));
    }

    #[test]
    fn test_max_attempts() {
        let store = CaptchaStore::new();
        store.insert("t".into(), "abcd");

        for _ in 0..3 {
            assert!(matches!(
                store.verify("t", "wrong"),
                Err(CaptchaError::AnswerIncorrect)
            ));
        }
        assert!(matches!(
            store.verify("t", "abcd"),
            Err(CaptchaError::TooManyAttempts)
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_cleanup_keeps_fresh_sessions() {
        let store = CaptchaStore::new();
        store.insert("fresh".into(), "x");
        assert_eq!(store.cleanup_expired(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_error_maps_to_bad_request() {
        let api: ApiError = CaptchaError::AnswerIncorrect.into();
        assert_eq!(api.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
