//! 按客户端 IP 的固定窗口限流

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::error::ApiError;

/// 速率限制条目
#[derive(Debug, Clone)]
struct RateLimitEntry {
    attempts: u32,
    window_start: Instant,
}

/// 固定窗口限流器
pub struct RateLimiter {
    name: &'static str,
    max_attempts: u32,
    window: Duration,
    entries: RwLock<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, max_attempts: u32, window: Duration) -> Self {
        Self {
            name,
            max_attempts,
            window,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// 登录：15 分钟内最多 5 次
    pub fn login() -> Self {
        Self::new("login", 5, Duration::from_secs(15 * 60))
    }

    /// 公开提交（反馈、友链申请）：10 分钟内最多 5 次
    pub fn submissions() -> Self {
        Self::new("submission", 5, Duration::from_secs(10 * 60))
    }

    /// 记录一次尝试，超限时返回 429
    pub fn check(&self, key: &str) -> Result<(), ApiError> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), ApiError> {
        let mut entries = self.entries.write();
        let entry = entries.entry(key.to_string()).or_insert(RateLimitEntry {
            attempts: 0,
            window_start: now,
        });

        // 窗口过期则重置
        if now.duration_since(entry.window_start) >= self.window {
            entry.attempts = 0;
            entry.window_start = now;
        }

        if entry.attempts >= self.max_attempts {
            let retry_after = self
                .window
                .saturating_sub(now.duration_since(entry.window_start));
            tracing::warn!("{} 请求过于频繁: {}", self.name, key);
            return Err(ApiError::TooManyRequests(format!(
                "操作过于频繁，请 {} 分钟后再试",
                retry_after.as_secs().div_ceil(60).max(1)
            )));
        }

        entry.attempts += 1;
        Ok(())
    }

    /// 清理已过期的窗口，返回清理数量
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.window_start) < self.window);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiting() {
        let limiter = RateLimiter::login();
        let ip = "192.168.1.1";

        for _ in 0..5 {
            assert!(limiter.check(ip).is_ok());
        }
        let err = limiter.check(ip).unwrap_err();
        assert!(matches!(err, ApiError::TooManyRequests(_)));

        // 其他 IP 不受影响
        assert!(limiter.check("10.0.0.1").is_ok());
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new("test", 1, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.check_at("ip", start).is_ok());
        assert!(limiter.check_at("ip", start + Duration::from_secs(30)).is_err());
        assert!(limiter.check_at("ip", start + Duration::from_secs(61)).is_ok());
    }

    #[test]
    fn test_cleanup_keeps_active_windows() {
        let limiter = RateLimiter::submissions();
        limiter.check("ip").unwrap();
        assert_eq!(limiter.cleanup_expired(), 0);

        let expired = RateLimiter::new("test", 1, Duration::ZERO);
        expired.check("ip").unwrap();
        assert_eq!(expired.cleanup_expired(), 1);
    }
}
