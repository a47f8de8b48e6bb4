//! 定期维护任务

use std::time::Duration;

use crate::common::now_rfc3339;
use crate::db;
use crate::state::AppState;

/// 维护间隔
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// 执行一轮维护：清理验证码与限流窗口，将到期友链标记为 expired
///
/// 返回本轮到期的友链数
pub async fn run_once(state: &AppState) -> usize {
    let captchas = state.captcha.cleanup_expired();
    let windows = state.login_limiter.cleanup_expired() + state.submit_limiter.cleanup_expired();
    if captchas + windows > 0 {
        tracing::debug!("已清理 {} 个过期验证码，{} 个限流窗口", captchas, windows);
    }

    let now = now_rfc3339();
    match state
        .db
        .call(move |conn| Ok(db::friend_links::expire_overdue(conn, &now)?))
        .await
    {
        Ok(0) => 0,
        Ok(expired) => {
            tracing::info!("{} 个友链已到期", expired);
            expired
        }
        Err(e) => {
            tracing::warn!("标记到期友链失败: {}", e);
            0
        }
    }
}

/// 启动后台维护任务
pub fn start_maintenance_task(state: AppState, interval: Duration) {
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);
        loop {
            interval_timer.tick().await;
            run_once(&state).await;
        }
    });
}
