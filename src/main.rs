mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

use vidcat_core::config::Config;
use vidcat_geo::{simplify, wkt_io, GeometryOperator, SimplifyOperator};
use vidcat_stream::StreamMonitor;

async fn start_stream(
    config_path: Option<&Path>,
    uri: Option<String>,
    title: Option<String>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path).context("loading configuration")?;

    // Override stream identity from CLI if specified
    if let Some(uri) = uri {
        config.stream.uri = uri;
    }
    if let Some(title) = title {
        config.stream.title = title;
    }
    for warning in config.validate() {
        tracing::warn!("Config: {}", warning);
    }

    tracing::info!("Starting vidcat stream monitor");
    tracing::info!(
        "Segments: {}, records: {}",
        config.output.segment_dir.display(),
        config.store.record_dir.display()
    );

    let monitor = StreamMonitor::from_config(&config)
        .await
        .with_context(|| format!("starting stream {}", config.stream.uri))?;
    tracing::info!("Listening on udp://{}", monitor.local_addr());

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl+C")?;

    tracing::info!("Shutting down...");
    monitor.shutdown().await;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidcat=trace,vidcat_stream=trace,vidcat_geo=debug,vidcat_core=debug".to_string()
        } else {
            "vidcat=info,vidcat_stream=info,vidcat_geo=warn,vidcat_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { uri, title } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_stream(cli.config.as_deref(), uri, title))
        }
        Commands::Simplify { wkt, tolerance } => simplify_wkt(&wkt, tolerance),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("vidcat {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn simplify_wkt(text: &str, tolerance: Option<f64>) -> Result<()> {
    let geometry = wkt_io::parse(text)?;

    let mut simplified = simplify(Some(geometry));
    if let Some(tolerance) = tolerance {
        if !tolerance.is_finite() || tolerance < 0.0 {
            anyhow::bail!("Tolerance must be a non-negative number, got {tolerance}");
        }
        simplified = SimplifyOperator::new(tolerance).apply(simplified);
    }

    if let Some(geometry) = simplified {
        println!("{}", wkt_io::render(&geometry));
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config =
                Config::load(p).with_context(|| format!("validating {}", p.display()))?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Stream: {} ({})", config.stream.uri, config.stream.title);
    println!(
        "  Rollover: elapsed {} / size {} / check every {} ms",
        config
            .rollover
            .elapsed_secs
            .map_or("off".to_string(), |s| format!("{s} s")),
        config
            .rollover
            .megabytes
            .map_or("off".to_string(), |mb| format!("{mb} MB")),
        config.rollover.check_interval_ms
    );
    println!("  Segments: {}", config.output.segment_dir.display());
    println!("  Records: {}", config.store.record_dir.display());

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("Warnings:");
        for warning in &warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}
