use kgraph::config::AppConfig;
use kgraph::{build_state, create_router};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("reqwest", LevelFilter::Warn)
        .init();

    let config = AppConfig::load()?;
    log::info!(
        "configuration loaded: server={}, graph store={}",
        config.server_address(),
        config.graph.url.as_deref().unwrap_or("in-memory")
    );

    let state = build_state(&config);
    let app = create_router().with_state(state);

    let listener = TcpListener::bind(config.server_address()).await?;
    log::info!("kgraph server running on http://{}", config.server_address());

    axum::serve(listener, app).await?;

    Ok(())
}
