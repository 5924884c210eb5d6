use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

use crate::server::DEFAULT_WS_PATH;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the sync server, accepting WebSocket connections.
    Serve(ServeArgs),
    /// Connect to a server and exchange raw messages from the terminal.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Socket address the server should bind to. Use port 0 for an ephemeral port.
    #[arg(long, env = "SYNC_LISTEN", default_value = "127.0.0.1:5000")]
    pub listen: SocketAddr,

    /// Path on which WebSocket upgrades are accepted.
    #[arg(long, default_value = DEFAULT_WS_PATH, value_parser = parse_ws_path)]
    pub ws_path: String,

    /// Preload a few demo customers and items.
    #[arg(long)]
    pub seed_demo: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// WebSocket URL of the server to connect to.
    #[arg(long, default_value = "ws://127.0.0.1:5000/ws")]
    pub server: String,
}

fn parse_ws_path(raw: &str) -> Result<String, String> {
    if raw.starts_with('/') && raw.len() > 1 {
        Ok(raw.to_string())
    } else {
        Err(format!("'{raw}' must start with '/' and name a path"))
    }
}
