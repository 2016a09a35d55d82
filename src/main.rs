use clap::{Parser, Subcommand};
use cwquery::cli::run::QueryArgs;
use cwquery::config::expand_tilde;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cwquery")]
#[command(about = "Time-ordered retrieval from CloudWatch log groups", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the events of a log group within a time window
    Query(QueryArgs),
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout carries only query output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cwquery=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config);

    match cli.command {
        Commands::Query(args) => {
            cwquery::cli::run::run(config_path, args).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => {
                cwquery::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                cwquery::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}

fn resolve_config_path(explicit_path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(expand_tilde(&path));
    }

    // Check ~/.config/cwquery/config.yml
    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/cwquery/config.yml");
        if user_config.exists() {
            return Some(user_config);
        }
    }

    // Check /etc/cwquery/config.yml
    let system_config = PathBuf::from("/etc/cwquery/config.yml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}
