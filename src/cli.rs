use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vidcat")]
#[command(author, version, about = "Transport-stream segmenting and cataloging tool")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start receiving a stream and writing cataloged segments
    Start {
        /// Stream URI to listen on (udp://host:port), overrides the config
        #[arg(long)]
        uri: Option<String>,

        /// Stream title, overrides the config
        #[arg(long)]
        title: Option<String>,
    },

    /// Reduce a WKT footprint to per-component envelopes
    Simplify {
        /// WKT geometry to simplify
        #[arg(required = true)]
        wkt: String,

        /// Also drop vertices below this area tolerance
        #[arg(long)]
        tolerance: Option<f64>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
