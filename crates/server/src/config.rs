// crates/server/src/config.rs
//! Command-line and environment configuration for the `sharecycle` binary.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47900;

#[derive(Parser, Debug, Clone)]
#[command(name = "sharecycle")]
#[command(version, about = "Share-session tracking service", long_about = None)]
pub struct Config {
    /// Port to listen on. Falls back to `$PORT`, then 47900.
    #[arg(long, env = "SHARECYCLE_PORT")]
    pub port: Option<u16>,

    /// Address to bind.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    /// SQLite database file. Defaults to `<data dir>/sharecycle/sharecycle.db`.
    #[arg(long, env = "SHARECYCLE_DB")]
    pub db_path: Option<PathBuf>,

    /// JSON file with users, reward types, postings and metric definitions
    /// to upsert at startup.
    #[arg(long)]
    pub fixtures: Option<PathBuf>,
}

impl Config {
    /// Resolved port: `--port` / `SHARECYCLE_PORT`, then `PORT`, then the default.
    pub fn port(&self) -> u16 {
        self.port
            .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
            .unwrap_or(DEFAULT_PORT)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port())
    }
}
