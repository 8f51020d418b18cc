mod bootstrap;
mod error;
mod health;
mod ratelimit;
mod routes;

use anyhow::Result;
use dealscope_core::config::LoadOptions;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).compact().init();

    let application = bootstrap::bootstrap(LoadOptions::default()).await?;
    let address = format!(
        "{}:{}",
        application.config.server.bind_address, application.config.server.port
    );

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(address = %address, "dealscope-server listening");

    axum::serve(listener, routes::router(application.state))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    info!("dealscope-server stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
