use gem_api::setup;
use gem_core::Config;

// mimalloc keeps fragmentation low for the many short-lived upload buffers
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Reads .env, then the process environment
    let config = Config::from_env()?;

    let (state, router) = setup::initialize_app(config).await?;

    setup::server::start_server(&state.config, router).await?;

    Ok(())
}
