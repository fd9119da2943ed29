//! Server configuration resolution
//!
//! Command-line arguments (with their environment fallbacks) override the
//! TOML file, which overrides built-in defaults.

use clap::Parser;
use sieve_common::config::{
    ClassifierSettings, PipelineSettings, TomlConfig, DEFAULT_BIND, DEFAULT_PORT,
    DEFAULT_STATIC_DIR,
};
use sieve_common::{Error, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing::info;

/// Command-line arguments for sieve-server
#[derive(Parser, Debug, Default)]
#[command(name = "sieve-server")]
#[command(about = "Streams the English-language prompts found in large texts")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "SIEVE_BIND")]
    pub bind: Option<String>,

    /// Path to TOML config file
    #[arg(short, long, env = "SIEVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory of static client files
    #[arg(long, env = "SIEVE_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub max_payload_bytes: usize,
    pub log_level: String,
    pub pipeline: PipelineSettings,
    pub classifier: ClassifierSettings,
}

impl ServerConfig {
    /// Merge arguments over the TOML layer
    pub fn resolve(args: &Args, toml: TomlConfig) -> Result<Self> {
        let port = match (args.port, toml.port) {
            (Some(port), _) => {
                info!("Port: {} (from command line or PORT)", port);
                port
            }
            (None, Some(port)) => {
                info!("Port: {} (from config file)", port);
                port
            }
            (None, None) => {
                info!("Port: {} (default)", DEFAULT_PORT);
                DEFAULT_PORT
            }
        };

        let bind = args
            .bind
            .clone()
            .or(toml.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let ip: IpAddr = bind
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind, e)))?;

        let static_dir = args
            .static_dir
            .clone()
            .or(toml.static_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));

        Ok(Self {
            bind_addr: SocketAddr::new(ip, port),
            static_dir,
            max_payload_bytes: toml.max_payload_bytes,
            log_level: toml.logging.level,
            pipeline: toml.pipeline,
            classifier: toml.classifier,
        })
    }
}
