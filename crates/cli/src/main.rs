mod auth_commands;
mod credential_store;
mod models_commands;

use {
    clap::{Parser, Subcommand},
    kilo_plugins::KiloGatewayPlugin,
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "kilo", version, about = "Kilo Gateway login and model sync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.config/kilo/).
    #[arg(long, global = true, env = "KILO_CONFIG_DIR")]
    config_dir: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Credential management.
    Auth {
        #[command(subcommand)]
        action: auth_commands::AuthAction,
    },
    /// List models offered by the gateway.
    Models {
        /// Include paid models.
        #[arg(long, default_value_t = false)]
        all: bool,
        /// Print the catalog as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Sync the gateway's free models into a host config file.
    Sync {
        /// Host config file (.json, .toml, .yaml).
        #[arg(long)]
        config: std::path::PathBuf,
        /// Print the result instead of writing it.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Show the request options for the stored credential.
    Options,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(ref dir) = cli.config_dir {
        kilo_config::set_config_dir(dir.clone());
    }
    debug!(version = env!("CARGO_PKG_VERSION"), "kilo starting");

    let plugin = KiloGatewayPlugin::from_env();
    match cli.command {
        Commands::Auth { action } => auth_commands::handle_auth(action, &plugin).await,
        Commands::Models { all, json } => models_commands::list_models(&plugin, all, json).await,
        Commands::Sync { config, dry_run } => {
            models_commands::sync(&plugin, &config, dry_run).await
        },
        Commands::Options => models_commands::show_options(&plugin).await,
    }
}
