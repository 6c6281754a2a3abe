use anyhow::{bail, Context};
use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;

use siteprogress::auth::LocalAuthClient;
use siteprogress::core::config::{AppConfig, BackendKind};
use siteprogress::core::data::{ChangeFeed, DataClient, MemoryDataClient, PgDataClient};
use siteprogress::core::shared::utils::{create_conn, redact_database_url, run_migrations, DbPool};
use siteprogress::main_module::run_axum_server;
use siteprogress::AppState;

const CHANGE_FEED_CAPACITY: usize = 256;

const USAGE: &str = "Usage: siteprogress [serve | migrate | create-user <email> <password> [display name]]";

fn connect(config: &AppConfig) -> anyhow::Result<DbPool> {
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL is required for the postgres backend")?;
    info!("Connecting to {}", redact_database_url(url));
    let pool = create_conn(url, config.database.pool_size)
        .with_context(|| format!("Failed to connect to {}", redact_database_url(url)))?;
    run_migrations(&pool).map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;
    Ok(pool)
}

fn build_data_client(config: &AppConfig) -> anyhow::Result<Arc<dyn DataClient>> {
    let feed = ChangeFeed::new(CHANGE_FEED_CAPACITY);
    let client: Arc<dyn DataClient> = match config.database.backend {
        BackendKind::Postgres => Arc::new(PgDataClient::new(connect(config)?, feed)),
        BackendKind::Memory => {
            info!("Using in-memory data backend; rows are lost on exit");
            Arc::new(MemoryDataClient::with_feed(feed))
        }
    };
    Ok(client)
}

async fn create_user(config: &AppConfig, args: &[String]) -> anyhow::Result<()> {
    let (email, password) = match args {
        [email, password, ..] => (email, password),
        _ => bail!("{USAGE}"),
    };
    let display_name = (args.len() > 2).then(|| args[2..].join(" "));
    let data = build_data_client(config)?;
    let auth = LocalAuthClient::new(data, &config.auth);
    let user = auth
        .create_user(email, password, display_name.as_deref())
        .await
        .context("Failed to create user")?;
    println!("User {} saved (id {})", user.email, user.id);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = AppConfig::from_env().context("Invalid configuration")?;

    match args.first().map(String::as_str) {
        None | Some("serve") => {}
        Some("migrate") => {
            if config.database.backend != BackendKind::Postgres {
                bail!("migrate needs DATA_BACKEND=postgres");
            }
            connect(&config)?;
            info!("Migrations complete");
            return Ok(());
        }
        Some("create-user") => return create_user(&config, &args[1..]).await,
        Some("--help") | Some("-h") => {
            println!("{USAGE}");
            return Ok(());
        }
        Some(other) => bail!("Unknown command {other}\n{USAGE}"),
    }

    info!("Starting siteprogress {}", env!("CARGO_PKG_VERSION"));
    let data = build_data_client(&config)?;
    let auth = Arc::new(LocalAuthClient::new(Arc::clone(&data), &config.auth));
    let state = Arc::new(AppState::new(data, auth, config));

    if let Err(e) = run_axum_server(state).await {
        error!("Server error: {e}");
        return Err(e.into());
    }
    Ok(())
}
