//! Command-line and environment configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use inkshare_core::connections::DEFAULT_OUTBOX_CAPACITY;

/// Default inbound command queue length for the hub.
pub const DEFAULT_HUB_CAPACITY: usize = 1024;

/// Server configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "inkshare-server", version, about = "Shared canvas sync server")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "INKSHARE_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Directory of client assets to serve at `/`
    #[arg(long, env = "INKSHARE_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Messages buffered per connection before a slow peer starts missing events
    #[arg(long, default_value_t = DEFAULT_OUTBOX_CAPACITY)]
    pub outbox_capacity: usize,

    /// Inbound commands buffered ahead of the hub
    #[arg(long, default_value_t = DEFAULT_HUB_CAPACITY)]
    pub hub_capacity: usize,
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_args() {
        let config = ServerConfig::try_parse_from([
            "inkshare-server",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--static-dir",
            "client",
            "--outbox-capacity",
            "16",
        ])
        .unwrap();

        assert_eq!(config.addr(), "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.static_dir, Some(PathBuf::from("client")));
        assert_eq!(config.outbox_capacity, 16);
        assert_eq!(config.hub_capacity, DEFAULT_HUB_CAPACITY);
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(ServerConfig::try_parse_from(["inkshare-server", "--port", "70000"]).is_err());
    }
}
