//! Relay configuration, from flags or environment.

use clap::Parser;
use percent_encoding::percent_decode_str;
use std::net::{IpAddr, SocketAddr};

#[derive(Debug, Clone, Parser)]
#[command(name = "roomkeeper-relay", version, about = "WebSocket relay for shared canvas rooms")]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "ROOMKEEPER_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "ROOMKEEPER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Room used when a client connects to `/`.
    #[arg(long, env = "ROOMKEEPER_DEFAULT_ROOM", default_value = "lobby")]
    pub default_room: String,

    /// Keep rooms around after their last member leaves.
    #[arg(long, env = "ROOMKEEPER_KEEP_EMPTY_ROOMS")]
    pub keep_empty_rooms: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, env = "ROOMKEEPER_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Map a request path to a room id. `/` and the empty path go to the
    /// default room; a trailing slash is ignored. Percent-escapes are
    /// decoded, so `/my%20room` and `/my room` are the same room.
    pub fn room_for_path(&self, path: &str) -> String {
        let name = path.trim_matches('/');
        if name.is_empty() {
            self.default_room.clone()
        } else {
            percent_decode_str(name).decode_utf8_lossy().into_owned()
        }
    }
}
