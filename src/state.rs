//! 应用共享状态

use std::sync::Arc;

use parking_lot::RwLock;

use crate::auth::captcha::CaptchaStore;
use crate::auth::jwt::{self, JwtManager};
use crate::auth::rate_limit::RateLimiter;
use crate::db::Database;
use crate::http_client::build_client;
use crate::model::config::Config;
use crate::notification::{EmailNotifier, SiteInfo};
use crate::search::ToolCatalog;

/// 所有处理器共享的状态（克隆开销为若干 `Arc`）
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// 运行时配置（邮件配置可由管理后台修改）
    pub config: Arc<RwLock<Config>>,
    pub jwt: Arc<JwtManager>,
    pub captcha: Arc<CaptchaStore>,
    pub login_limiter: Arc<RateLimiter>,
    pub submit_limiter: Arc<RateLimiter>,
    pub notifier: Arc<EmailNotifier>,
    pub catalog: Arc<ToolCatalog>,
    /// 出站请求客户端
    pub http: reqwest::Client,
}

impl AppState {
    /// 由配置与数据库构建状态（需在 tokio 运行时内调用）
    pub fn new(config: Config, db: Database) -> anyhow::Result<Self> {
        let secret = match config.jwt_secret.as_deref().map(str::trim) {
            Some(secret) if !secret.is_empty() => secret.to_string(),
            _ => {
                tracing::warn!("未配置 jwtSecret，已生成随机密钥（重启后需重新登录）");
                jwt::random_secret()
            }
        };
        let http = build_client(config.proxy_url.as_deref(), config.fetch_timeout_secs)?;

        Ok(Self {
            catalog: Arc::new(ToolCatalog::new(db.clone())),
            db,
            jwt: Arc::new(JwtManager::new(&secret, config.token_expiry_hours)),
            captcha: Arc::new(CaptchaStore::new()),
            login_limiter: Arc::new(RateLimiter::login()),
            submit_limiter: Arc::new(RateLimiter::submissions()),
            notifier: Arc::new(EmailNotifier::new(config.email.clone())),
            http,
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// 邮件等场景使用的站点信息
    pub fn site_info(&self) -> SiteInfo {
        let config = self.config.read();
        SiteInfo {
            name: config.site_name.clone(),
            url: config.base_url().to_string(),
        }
    }

    pub fn base_url(&self) -> String {
        self.config.read().base_url().to_string()
    }

    pub fn login_captcha_enabled(&self) -> bool {
        self.config.read().login_captcha
    }
}
