use std::net::SocketAddr;

use anyhow::Context as _;
use sea_orm::Database;
use tracing::info;

use tabi_auth::config::AuthConfig;
use tabi_auth::infra::notifier::{AppNotifier, LogNotifier, TelegramNotifier};
use tabi_auth::router::build_router;
use tabi_auth::state::AppState;
use tabi_auth_migration::{Migrator, MigratorTrait};
use tabi_core::tracing::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // sqlx logs every statement at info.
    init_tracing("info,sqlx=warn");

    let config = AuthConfig::from_env().context("load auth config")?;

    let db = Database::connect(&config.database_url)
        .await
        .context("connect to database")?;
    Migrator::up(&db, None).await.context("run migrations")?;

    let notifier = match &config.telegram_bot_token {
        Some(token) => AppNotifier::Telegram(TelegramNotifier::new(
            config.telegram_api_url.clone(),
            token.clone(),
            config.login_code_ttl_minutes,
        )?),
        None => {
            tracing::warn!("TELEGRAM_BOT_TOKEN not set, login codes will only be logged");
            AppNotifier::Log(LogNotifier)
        }
    };

    let state = AppState {
        db,
        notifier,
        keys: config.session_keys()?,
        login_policy: config.login_policy()?,
        cookie: config.cookie_options()?,
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.auth_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    info!("auth service listening on {addr}");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;
    Ok(())
}
