//! Server Configuration
//!
//! Options come from the command line, falling back to `FLASHCACHE_*`
//! environment variables and then to the defaults below. Logging verbosity
//! is controlled separately through `RUST_LOG`.

use crate::protocol::Response;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use clap::{Parser, ValueEnum};

/// The acknowledgement sent after a successful `set`.
///
/// Deployed clients of this server expect `END`; standard memcached clients
/// expect `STORED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SetReply {
    #[default]
    End,
    Stored,
}

impl SetReply {
    pub fn response(&self) -> Response {
        match self {
            SetReply::End => Response::End,
            SetReply::Stored => Response::Stored,
        }
    }
}

/// FlashCache server configuration
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "flashcache")]
#[command(about = "A memcached-compatible, in-memory key-value cache server")]
#[command(version)]
pub struct Config {
    /// Host to bind to
    #[arg(long, env = "FLASHCACHE_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "FLASHCACHE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Reply sent after a successful `set`
    #[arg(long, env = "FLASHCACHE_SET_REPLY", value_enum, default_value_t = SetReply::End)]
    pub set_reply: SetReply,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            set_reply: SetReply::default(),
        }
    }
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
