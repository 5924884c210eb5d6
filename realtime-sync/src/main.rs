use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use realtime_sync::{
    cli::{Cli, Command, ServeArgs},
    client,
    server::Server,
    store::Store,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

async fn serve(args: ServeArgs) -> Result<()> {
    let store = Arc::new(Store::new());
    if args.seed_demo {
        store.seed_demo().await;
        let (customers, items) = store.counts().await;
        info!(customers, items, "seeded demo data");
    }

    let listener = TcpListener::bind(args.listen).await?;
    let server = Server::new(listener, store).with_ws_path(args.ws_path.clone());
    let addr = server.local_addr()?;
    info!("server listening on {}", addr);

    if let Err(err) = server.run_until_ctrl_c().await {
        warn!("server exited with error: {err:?}");
        return Err(err);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await?,
        Command::Client(args) => client::run(args).await?,
    }

    Ok(())
}
