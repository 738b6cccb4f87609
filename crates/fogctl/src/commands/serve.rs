use std::net::SocketAddr;

use tracing::info;

use super::Context;

pub fn run(ctx: &Context, port: Option<u16>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(ctx, port.unwrap_or(ctx.config.api.port)))
}

async fn serve(ctx: &Context, port: u16) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    info!(path = ?ctx.config.store.path, "state store opened");

    let router = fogplane_api::build_router(store, ctx.settings());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
            }
        })
        .await?;

    info!("fogplane controller stopped");
    Ok(())
}
