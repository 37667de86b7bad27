//! Reference transport for roomkeeper: a WebSocket relay that maps request
//! paths to rooms and fans store results out to room members.

pub mod config;
pub mod router;
pub mod server;

pub use config::Config;
