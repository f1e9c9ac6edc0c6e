//! 主应用程序入口
//!
//! 装配投递引擎并启动 Axum Web 服务。

use std::sync::Arc;

use application::ChatRepository;
use config::AppConfig;
use infrastructure::{Db, PgChatRepository};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 缺少 DATABASE_URL / JWT_SECRET 时直接终止，不回退到开发默认值
    let config = AppConfig::from_env();

    tracing::info!(
        database = config.database.url.split('@').next_back().unwrap_or("unknown"),
        "connecting to database"
    );

    let pool = Db::create_pool(&config.database.url, config.database.max_connections).await?;

    // 运行迁移
    sqlx::migrate!("../../migrations").run(&pool).await?;

    let repository: Arc<dyn ChatRepository> = Arc::new(PgChatRepository::new(pool));
    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));
    let state = AppState::new(repository, jwt_service);

    let app = router(state);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!(addr = %bind_addr, "message delivery server started");
    axum::serve(listener, app).await?;

    Ok(())
}
