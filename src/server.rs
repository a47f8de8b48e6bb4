//! HTTP 服务组装与启动

use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::admin::create_admin_router;
use crate::auth::{self, handlers as auth_handlers, middleware::require_login};
use crate::db::Database;
use crate::error::ApiError;
use crate::maintenance::{MAINTENANCE_INTERVAL, start_maintenance_task};
use crate::model::config::Config;
use crate::public::{create_public_router, handlers as public_handlers};
use crate::state::AppState;

/// 认证路由（挂载于 `/api/auth`）
fn create_auth_router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(auth_handlers::me))
        .route("/password", put(auth_handlers::change_password))
        .route_layer(middleware::from_fn_with_state(state, require_login));

    Router::new()
        .route("/captcha", get(auth_handlers::get_captcha))
        .route("/login", post(auth_handlers::login))
        .route("/logout", post(auth_handlers::logout))
        .merge(protected)
}

async fn api_not_found() -> ApiError {
    ApiError::not_found("接口")
}

/// CORS：未配置来源时允许任意来源（不携带凭据），否则仅允许列表中的来源并允许 Cookie
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim().trim_end_matches('/')) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("忽略无效的 CORS 来源: {}", o);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// 组装完整路由
pub fn build_router(state: AppState) -> Router {
    let (static_dir, cors_origins) = {
        let config = state.config.read();
        (config.static_dir.clone(), config.cors_origins.clone())
    };

    let api = create_public_router()
        .nest("/auth", create_auth_router(state.clone()))
        .nest("/admin", create_admin_router(state.clone()))
        .fallback(api_not_found);

    let mut app = Router::new()
        .nest("/api", api)
        .route("/sitemap.xml", get(public_handlers::sitemap))
        .route("/robots.txt", get(public_handlers::robots));

    // 前端 SPA：未命中的路径回退到 index.html
    if let Some(dir) = static_dir.filter(|d| !d.trim().is_empty()) {
        let index = Path::new(&dir).join("index.html");
        tracing::info!("托管前端静态文件: {}", dir);
        app = app.fallback_service(ServeDir::new(&dir).fallback(ServeFile::new(index)));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(cors_layer(&cors_origins))
        .with_state(state)
}

/// 打开数据库、创建初始管理员并启动 HTTP 服务，直到收到退出信号
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database_path)?;
    auth::bootstrap_admin(&db, &config.admin_username, config.admin_password.as_deref())
        .await
        .context("创建初始管理员失败")?;

    let addr = format!("{}:{}", config.host, config.port);
    let site_url = config.base_url().to_string();
    let state = AppState::new(config, db)?;
    start_maintenance_task(state.clone(), MAINTENANCE_INTERVAL);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("监听地址失败: {}", addr))?;
    tracing::info!("服务已启动: http://{}（站点地址 {}）", addr, site_url);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP 服务异常退出")?;

    tracing::info!("服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("无法监听 Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("收到 Ctrl+C，正在关闭");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("收到 SIGTERM，正在关闭");
            }
            Err(e) => {
                tracing::error!("无法监听 SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
