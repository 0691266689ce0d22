use std::sync::Arc;

use attendance_server::alerts::LogNotifier;
use attendance_server::config::Cfg;
use attendance_server::views::Views;
use attendance_server::{router, store, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cfg = match std::env::args().nth(1) {
        Some(path) => Cfg::from_file(path)?,
        None => Cfg::default(),
    }
    .with_env();
    log::info!("Configuration:\n{:#?}", &cfg);

    let pool = store::connect(&cfg.database_url).await?;
    store::ensure_schema(&pool).await?;

    let state = AppState::new(
        pool,
        Views::new()?,
        Arc::new(LogNotifier),
        cfg.session_lifetime(),
    );
    let app = router(state);

    log::info!("Starting attendance server on http://{}", cfg.addr);
    axum::Server::bind(&cfg.addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
