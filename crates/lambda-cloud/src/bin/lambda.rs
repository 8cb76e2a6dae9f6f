//! Lambda Cloud CLI - rent GPU instances, waiting for capacity if needed.

use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lambda_cloud::config::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, ENV_API_KEY, ENV_BASE_URL};
use lambda_cloud::interrupt::InterruptRouter;
use lambda_cloud::retry::DEFAULT_RETRY_INTERVAL_SECS;
use lambda_cloud::ui::AvailabilityFilter;
use lambda_cloud::{App, Config, LambdaCloud, LaunchOptions, RetryPolicy, TerminationTarget};

/// Lambda Cloud CLI - launch and manage GPU instances.
#[derive(Parser)]
#[command(name = "lambda")]
#[command(about = "Launch and manage Lambda Cloud GPU instances")]
#[command(version)]
struct Cli {
    /// Lambda Cloud API key (or set `LAMBDA_API_KEY` env var).
    #[arg(long, env = ENV_API_KEY, default_value = "", hide_env_values = true)]
    api_key: String,

    /// API base URL (or set `LAMBDA_API_BASE_URL` env var).
    #[arg(long, env = ENV_BASE_URL, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Without a subcommand the interactive menu is shown.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List running instances.
    List,

    /// List instance types and their availability.
    Types {
        /// Only types whose name contains this text (case-insensitive).
        #[arg(long)]
        filter: Option<String>,

        /// Which types to show.
        #[arg(long, value_enum, default_value_t = AvailabilityFilter::All)]
        show: AvailabilityFilter,
    },

    /// Launch instances.
    Launch {
        /// Instance type (picked interactively if omitted).
        instance_type: Option<String>,

        /// SSH key name (auto-selected if the account has exactly one).
        #[arg(long)]
        ssh_key: Option<String>,

        /// Region to launch in (first region with capacity if omitted).
        #[arg(long)]
        region: Option<String>,

        /// Instance name.
        #[arg(long)]
        name: Option<String>,

        /// Number of instances.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        quantity: u32,

        /// Keep retrying until capacity is available.
        #[arg(long, short = 'w', default_value = "false")]
        wait: bool,

        /// Seconds between attempts when waiting.
        #[arg(
            long,
            default_value_t = DEFAULT_RETRY_INTERVAL_SECS,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        retry_interval: u64,

        /// Give up after this many attempts (unlimited if omitted).
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_retries: Option<u32>,

        /// Include types without capacity in the interactive picker.
        #[arg(long, default_value = "false")]
        show_all: bool,
    },

    /// Terminate instances by ID, or `all`.
    Terminate {
        /// Instance IDs, or the single word `all`.
        #[arg(required = true)]
        ids: Vec<String>,

        /// Skip confirmation prompt.
        #[arg(long, short = 'y', default_value = "false")]
        force: bool,
    },

    /// List SSH keys registered with the account.
    SshKeys,

    /// Manage `~/.ssh/config` entries for instances.
    SshConfig {
        #[command(subcommand)]
        action: SshConfigAction,
    },
}

#[derive(Subcommand)]
enum SshConfigAction {
    /// Add a `Host` entry for an instance.
    Add {
        /// Instance ID or unique prefix (picked interactively if omitted).
        id: Option<String>,

        /// Host alias (defaults to `lambda-<id prefix>`).
        #[arg(long)]
        alias: Option<String>,
    },

    /// Remove every entry this tool added.
    Remove {
        /// Skip confirmation prompt.
        #[arg(long, short = 'y', default_value = "false")]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so tables on stdout stay clean
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::with_base_url(cli.api_key.trim(), &cli.base_url)?
        .request_timeout(std::time::Duration::from_secs(cli.timeout));
    let provider =
        LambdaCloud::new(&config).context("Failed to create Lambda Cloud client")?;
    let app = App::new(Arc::new(provider), InterruptRouter::install());

    match cli.command {
        None => lambda_cloud::menu::run(&app).await,
        Some(Commands::List) => app.list_instances().await.map(|_| ()),
        Some(Commands::Types { filter, show }) => app.list_types(filter.as_deref(), show).await,
        Some(Commands::Launch {
            instance_type,
            ssh_key,
            region,
            name,
            quantity,
            wait,
            retry_interval,
            max_retries,
            show_all,
        }) => {
            let policy = RetryPolicy::new(retry_interval, max_retries.and_then(NonZeroU32::new));
            app.launch(LaunchOptions {
                instance_type,
                ssh_key,
                region,
                name,
                quantity,
                wait,
                policy,
                show_all,
            })
            .await
        }
        Some(Commands::Terminate { ids, force }) => {
            app.terminate(TerminationTarget::from_args(&ids), force)
                .await
        }
        Some(Commands::SshKeys) => app.list_ssh_keys().await,
        Some(Commands::SshConfig { action }) => match action {
            SshConfigAction::Add { id, alias } => app.ssh_config_add(id.as_deref(), alias).await,
            SshConfigAction::Remove { force } => app.ssh_config_remove(force),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("lambda").chain(args.iter().copied()))
    }

    #[test]
    fn test_retry_interval_must_be_positive() {
        assert!(parse(&["launch", "gpu_1x_a10", "--wait", "--retry-interval", "0"]).is_err());

        let cli = parse(&["launch", "gpu_1x_a10", "--retry-interval", "2"]).unwrap();
        match cli.command {
            Some(Commands::Launch { retry_interval, .. }) => assert_eq!(retry_interval, 2),
            _ => panic!("expected launch"),
        }
    }

    #[test]
    fn test_max_retries_must_be_positive() {
        assert!(parse(&["launch", "gpu_1x_a10", "--max-retries", "0"]).is_err());
    }
}
