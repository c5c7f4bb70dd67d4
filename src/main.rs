use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use dotenvy::dotenv;
use fundoo_notes::{
    config::Config,
    graph::{GraphStore, MemoryGraph, PgGraph},
    mail::{LogMailer, Mailer},
    route::create_router,
    AppState,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn open_store(database_url: &str) -> Result<Arc<dyn GraphStore>, Box<dyn std::error::Error>> {
    if database_url.starts_with("memory://") {
        warn!("using the in-memory graph, data is lost on exit");
        return Ok(Arc::new(MemoryGraph::new()));
    }
    let graph = PgGraph::connect(database_url).await?;
    graph.migrate().await?;
    info!("Connection to the database is successful");
    Ok(Arc::new(graph))
}

#[tokio::main]
async fn main() {
    let _ = dotenv();
    init_logging();

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            error!("Failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    let store = match open_store(&config.database_url).await {
        Ok(store) => store,
        Err(err) => {
            error!("Failed to connect to the database: {err}");
            std::process::exit(1);
        }
    };

    let (mailer, _mail_worker) = Mailer::spawn(Arc::new(LogMailer::new(config.mail.clone())));
    let app = create_router(Arc::new(AppState::new(store, mailer, config.clone())));

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), config.port);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };
    info!("Server started successfully on {addr}");
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {err}");
    }
}
