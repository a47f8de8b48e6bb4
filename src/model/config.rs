use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 邮件通知配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    /// 是否启用邮件通知
    #[serde(default)]
    pub enabled: bool,
    /// SMTP 服务器地址
    pub smtp_host: String,
    /// SMTP 端口
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP 用户名
    pub smtp_username: String,
    /// SMTP 密码（注意：以明文存储在 config.json 中，请确保文件权限安全）
    pub smtp_password: String,
    /// 是否使用 STARTTLS
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: bool,
    /// 发件人地址
    pub from_address: String,
    /// 管理员收件人地址列表（反馈、友链申请通知）
    pub to_addresses: Vec<String>,
}

pub fn default_smtp_port() -> u16 {
    587
}

pub fn default_smtp_tls() -> bool {
    true
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite 数据库文件路径
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// 站点对外访问地址（用于 sitemap、邮件中的链接、友链互链检测）
    #[serde(default = "default_site_url")]
    pub site_url: String,

    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// JWT 签名密钥（未配置时启动时随机生成，重启后登录失效）
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,

    /// 登录 Token 有效期（小时）
    #[serde(default = "default_token_expiry_hours")]
    pub token_expiry_hours: u64,

    /// 初始管理员用户名（仅在用户表为空时使用）
    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    /// 初始管理员密码（未配置时随机生成并打印到日志）
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,

    /// 登录是否需要图形验证码
    #[serde(default = "default_login_captcha")]
    pub login_captcha: bool,

    /// 允许跨域的前端地址（为空时允许任意来源）
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// 前端静态文件目录（可选，配置后由本服务托管 SPA）
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,

    /// 外部请求超时（秒）：图标抓取、头像校验、友链检测
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// HTTP 代理地址（可选）
    /// 支持格式: http://host:port, https://host:port
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,

    /// 邮件通知配置（可选）
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailConfig>,

    /// 配置文件路径（运行时元数据，不写入 JSON）
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_path() -> String {
    "data/toolbox.db".to_string()
}

fn default_site_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_site_name() -> String {
    "AiQiji Toolbox".to_string()
}

fn default_token_expiry_hours() -> u64 {
    7 * 24
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_login_captcha() -> bool {
    true
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            site_url: default_site_url(),
            site_name: default_site_name(),
            jwt_secret: None,
            token_expiry_hours: default_token_expiry_hours(),
            admin_username: default_admin_username(),
            admin_password: None,
            login_captcha: default_login_captcha(),
            cors_origins: Vec::new(),
            static_dir: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            proxy_url: None,
            email: None,
            config_path: None,
        }
    }
}

impl Config {
    /// 获取默认配置文件路径
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// 站点地址（去掉结尾 `/`）
    pub fn base_url(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }

    /// 从文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            // 配置文件不存在，返回默认配置
            let mut config = Self::default();
            config.config_path = Some(path.to_path_buf());
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// 用环境变量覆盖配置（`.env` 由 dotenvy 预先加载）
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("TOOLBOX_HOST") {
            self.host = v;
        }
        if let Some(v) = get("TOOLBOX_PORT") {
            match v.parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!("忽略无效的 TOOLBOX_PORT: {}", v),
            }
        }
        if let Some(v) = get("TOOLBOX_DATABASE") {
            self.database_path = v;
        }
        if let Some(v) = get("TOOLBOX_SITE_URL") {
            self.site_url = v;
        }
        if let Some(v) = get("TOOLBOX_JWT_SECRET") {
            self.jwt_secret = Some(v);
        }
        if let Some(v) = get("TOOLBOX_ADMIN_USERNAME") {
            self.admin_username = v;
        }
        if let Some(v) = get("TOOLBOX_ADMIN_PASSWORD") {
            self.admin_password = Some(v);
        }
    }

    /// 指定配置文件路径（`save` 写入该文件）
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// 获取配置文件路径（如果有）
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 将当前配置写回原始配置文件
    pub fn save(&self) -> anyhow::Result<()> {
        let path = self
            .config_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("配置文件路径未知，无法保存配置"))?;

        let content = serde_json::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, content)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
        Ok(())
    }
}
