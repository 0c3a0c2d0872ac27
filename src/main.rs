use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use appupgrade::{commands, config::Settings, runtime::RealRuntime};
use clap::Parser;
use log::error;

/// appupgrade - keep GitHub-released Debian packages up to date
///
/// Reports whether a newer release of a monitored package is available and
/// swaps the installed package for a chosen release.
///
/// Monitored packages are read from appupgrade.yaml in the home directory or
/// the working directory.
///
/// Examples:
///   appupgrade start                    # Serve the HTTP API
///   appupgrade info daydash             # Print the version report
///   appupgrade update daydash 1.3.0     # Install release 1.3.0
#[derive(Parser, Debug)]
#[command(author, version = env!("APPUPGRADE_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (overrides the search; also via APPUPGRADE_CONFIG)
    #[arg(
        long = "config",
        short = 'c',
        env = "APPUPGRADE_CONFIG",
        value_name = "PATH",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// GitHub API URL (defaults to the settings file, then https://api.github.com)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API until interrupted
    Start,

    /// Print the installed and latest versions of a package as JSON
    Info(InfoArgs),

    /// Replace the installed package with the given release
    Update(UpdateArgs),
}

#[derive(clap::Args, Debug)]
pub struct InfoArgs {
    /// Name of a monitored package
    #[arg(value_name = "PACKAGE")]
    pub package: String,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Name of a monitored package
    #[arg(value_name = "PACKAGE")]
    pub package: String,

    /// Release version to install (e.g. 1.3.0 or v1.3.0)
    #[arg(value_name = "VERSION")]
    pub version: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = Arc::new(RealRuntime);

    let mut settings = Settings::load(runtime.as_ref(), cli.config.as_deref())?;
    if let Some(api_url) = cli.api_url {
        settings.github.api_url = api_url;
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log.level_filter().to_string()),
    )
    .init();

    let result = match cli.command {
        Commands::Start => commands::start(runtime, &settings).await,
        Commands::Info(args) => commands::info(runtime, &settings, &args.package).await,
        Commands::Update(args) => {
            commands::update(runtime, &settings, &args.package, &args.version).await
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
