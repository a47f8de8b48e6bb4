//! 邮件发送
//!
//! 使用有界 mpsc channel 解耦请求处理与 SMTP 发送，请求路径上只做入队。
//! SMTP 配置支持运行时热更新，未启用邮件时消息直接丢弃。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::model::config::EmailConfig;

/// channel 容量，SMTP 故障时防止无限堆积
const CHANNEL_CAPACITY: usize = 64;

/// 邮件发送最大尝试次数
const MAX_SEND_ATTEMPTS: u32 = 3;

/// 待发送的邮件（已渲染）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// 邮件通知器
///
/// 即使未配置邮件也可创建实例。`enqueue` 非阻塞，channel 已满时丢弃并记录日志。
pub struct EmailNotifier {
    sender: mpsc::Sender<OutgoingEmail>,
    config: Arc<RwLock<Option<EmailConfig>>>,
}

impl EmailNotifier {
    /// 创建通知器并启动后台消费任务（需在 tokio 运行时内调用）
    pub fn new(config: Option<EmailConfig>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let config = Arc::new(RwLock::new(config));
        tokio::spawn(Self::consume_loop(config.clone(), rx));
        Self { sender: tx, config }
    }

    /// 更新邮件配置（运行时热更新）
    pub fn update_config(&self, config: Option<EmailConfig>) {
        *self.config.write() = config;
    }

    /// 获取当前邮件配置的克隆
    pub fn get_config(&self) -> Option<EmailConfig> {
        self.config.read().clone()
    }

    /// 邮件功能是否已启用
    pub fn is_enabled(&self) -> bool {
        self.config.read().as_ref().is_some_and(|c| c.enabled)
    }

    /// 管理员收件人
    pub fn admin_recipients(&self) -> Vec<String> {
        self.config
            .read()
            .as_ref()
            .map(|c| c.to_addresses.clone())
            .unwrap_or_default()
    }

    /// 入队（非阻塞），返回是否成功入队
    pub fn enqueue(&self, email: OutgoingEmail) -> bool {
        if !self.is_enabled() {
            tracing::debug!("邮件未启用，丢弃邮件: {}", email.subject);
            return false;
        }
        if email.to.is_empty() {
            tracing::debug!("邮件没有收件人，丢弃: {}", email.subject);
            return false;
        }
        match self.sender.try_send(email) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("邮件入队失败（channel 已满或已关闭）: {}", e);
                false
            }
        }
    }

    /// 后台消费循环
    async fn consume_loop(
        config: Arc<RwLock<Option<EmailConfig>>>,
        mut rx: mpsc::Receiver<OutgoingEmail>,
    ) {
        while let Some(email) = rx.recv().await {
            // 以发送时的配置为准
            let current = config.read().clone().filter(|c| c.enabled);
            let Some(current) = current else {
                tracing::debug!("邮件已停用，丢弃队列中的邮件: {}", email.subject);
                continue;
            };

            let mut last_err = None;
            for attempt in 1..=MAX_SEND_ATTEMPTS {
                match send_message(&current, &email).await {
                    Ok(()) => {
                        last_err = None;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "发送邮件失败（第 {}/{} 次）: {:#}",
                            attempt,
                            MAX_SEND_ATTEMPTS,
                            e
                        );
                        last_err = Some(e);
                        if attempt < MAX_SEND_ATTEMPTS {
                            tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
                        }
                    }
                }
            }
            if let Some(e) = last_err {
                tracing::error!(
                    "邮件「{}」发送失败（已尝试 {} 次）: {:#}",
                    email.subject,
                    MAX_SEND_ATTEMPTS,
                    e
                );
            }
        }
        tracing::debug!("邮件消费循环已退出");
    }

    /// 发送测试邮件（同步等待结果，用于管理后台测试端点）
    ///
    /// `to` 为空时发给配置中的管理员收件人
    pub async fn send_test(config: &EmailConfig, to: Option<&str>) -> anyhow::Result<()> {
        let recipients = match to.map(str::trim).filter(|t| !t.is_empty()) {
            Some(addr) => vec![addr.to_string()],
            None => config.to_addresses.clone(),
        };
        let email = OutgoingEmail {
            to: recipients,
            subject: "[AiQiji Toolbox] 测试邮件".to_string(),
            body: "这是一封来自 AiQiji Toolbox 的测试邮件。\n\n如果您收到此邮件，说明 SMTP 配置正确。"
                .to_string(),
        };
        send_message(config, &email).await
    }
}

/// 构建邮件：全部收件人放在同一封邮件中，一次 SMTP 事务投递
fn build_message(from_address: &str, email: &OutgoingEmail) -> anyhow::Result<Message> {
    if email.to.is_empty() {
        anyhow::bail!("收件人列表为空");
    }

    let from: Mailbox = from_address.parse().context("发件人地址格式无效")?;
    let mut builder = Message::builder().from(from);
    for to_addr in &email.to {
        let mailbox: Mailbox = to_addr
            .parse()
            .with_context(|| format!("收件人地址格式无效: {}", to_addr))?;
        builder = builder.to(mailbox);
    }
    builder
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .context("构建邮件失败")
}

/// 底层邮件发送
///
/// 失败时没有任何收件人收到，重试不会产生重复邮件
async fn send_message(config: &EmailConfig, email: &OutgoingEmail) -> anyhow::Result<()> {
    let message = build_message(&config.from_address, email)?;
    let mailer = build_transport(config)?;
    mailer
        .send(message)
        .await
        .with_context(|| format!("发送邮件到 {} 失败", email.to.join(", ")))?;

    #[cfg(feature = "sensitive-logs")]
    tracing::debug!("邮件正文: {}", email.body);

    tracing::info!("邮件「{}」已发送到 {} 个收件人", email.subject, email.to.len());
    Ok(())
}

/// 构建 SMTP 传输
fn build_transport(config: &EmailConfig) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
    let builder = if config.smtp_tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .context("创建 STARTTLS SMTP 传输失败")?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
    };

    let builder = builder.port(config.smtp_port);
    let builder = if config.smtp_username.is_empty() {
        builder
    } else {
        builder.credentials(Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        ))
    };
    Ok(builder.build())
}
