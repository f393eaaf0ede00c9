pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::ApiState;

use anyhow::Result;

/// Bind and serve the export API. Wiring the concrete query executor and
/// SQL validator is the embedding application's job; the retention sweeper
/// is spawned here so expired exports are reclaimed for the lifetime of
/// the server.
pub async fn serve(state: ApiState, addr: &str) -> Result<()> {
    let sweeper = dbexport_worker::RetentionSweeper::new(
        state.registry.clone(),
        state.config.clone(),
    );
    tokio::spawn(async move { sweeper.run().await });

    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Export API listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
