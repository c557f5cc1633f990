mod handlers;
mod lifecycle;
mod setup;
mod state;
mod telemetry;
#[cfg(test)]
mod test_support;
mod ws;

use loft_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration; a missing volume list is fatal here, not later.
    let config = Config::from_env()?;

    telemetry::init_tracing();

    let (state, router) = setup::initialize_app(config).await?;

    setup::server::start_server(&state, router).await?;

    Ok(())
}
