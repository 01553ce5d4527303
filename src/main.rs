use std::path::PathBuf;

use clap::Parser;

use repothread::server;

/// RepoThread - turns repositories into blog posts and blog posts into threads
#[derive(Parser, Debug)]
#[command(
    name = "repothread",
    version,
    about = "RepoThread - turns repositories into blog posts and blog posts into threads"
)]
struct Cli {
    /// Bind host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Data directory path
    #[arg(long = "data-dir")]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up tracing based on verbose flag
    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("debug").init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = server::load_config(cli.config.as_deref())?;

    if let Some(ref host) = cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(ref data_dir) = cli.data_dir {
        config.data_dir = Some(data_dir.clone());
    }

    server::run(config).await
}
