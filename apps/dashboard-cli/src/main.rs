use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dashboard_auth::{AccessToken, Principal, Session};
use dashboard_client::{ApiClientBuilder, ApiClientConfig, ApiError, DashboardApi, JsonObject};
use serde_json::Value;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Dashboard CLI - call the dashboard backend as the signed-in user
#[derive(Parser, Debug)]
#[command(name = "dashboard-cli")]
#[command(about = "Call the dashboard backend as the signed-in user")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config and DASHBOARD_API_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token of the signed-in user
    #[arg(long, env = "DASHBOARD_ID_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// User id recorded in the session
    #[arg(long, default_value = "cli-user")]
    user_id: String,

    /// Allow plain http to non-loopback hosts
    #[arg(long)]
    allow_insecure_http: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Print effective configuration (JSON) and exit
    #[arg(long)]
    print_config: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the profile of the signed-in user
    Profile,
    /// Update profile fields
    UpdateProfile {
        /// Fields to update, as a JSON object
        #[arg(long)]
        data: String,
    },
    /// Fetch protected data
    Protected,
    /// Store metadata for an uploaded image
    UploadMetadata {
        /// Image metadata, as a non-empty JSON object
        #[arg(long)]
        data: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if let Some(hint) = api_error(&err).and_then(hint) {
                eprintln!("hint: {hint}");
            }
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(path) = &cli.config
        && !path.is_file()
    {
        bail!("config file does not exist: {}", path.display());
    }

    // 1) defaults -> 2) YAML -> 3) DASHBOARD_* env -> 4) CLI overrides
    let mut config = ApiClientConfig::load_layers(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if cli.allow_insecure_http {
        config.allow_insecure_http = true;
    }
    config.validate()?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let Some(command) = cli.command else {
        bail!("no command given; see --help");
    };

    let session = Arc::new(Session::new());
    if let Some(token) = cli.token.filter(|t| !t.trim().is_empty()) {
        session.sign_in(Principal::new(cli.user_id, AccessToken::new(token)));
    }

    let client = ApiClientBuilder::with_config(config)
        .shared_token_provider(session)
        .build()
        .context("failed to build API client")?;

    let value = dispatch(&client, command).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn dispatch(api: &dyn DashboardApi, command: Commands) -> Result<Value> {
    let value = match command {
        Commands::Profile => api.get_user_profile().await?,
        Commands::UpdateProfile { data } => api.update_user_profile(parse_object(&data)?).await?,
        Commands::Protected => api.get_protected_data().await?,
        Commands::UploadMetadata { data } => {
            api.upload_image_metadata(parse_object(&data)?).await?
        }
    };
    Ok(value)
}

fn parse_object(raw: &str) -> Result<JsonObject> {
    serde_json::from_str(raw).context("--data must be a JSON object")
}

fn api_error(err: &anyhow::Error) -> Option<&ApiError> {
    err.chain().find_map(|e| e.downcast_ref::<ApiError>())
}

fn hint(err: &ApiError) -> Option<&'static str> {
    match err {
        ApiError::Unauthenticated => Some("sign in with --token or DASHBOARD_ID_TOKEN"),
        ApiError::Config(m) if m.contains("allow_insecure_http") => Some(
            "pass --allow-insecure-http or set DASHBOARD_ALLOW_INSECURE_HTTP=true for a non-loopback http backend",
        ),
        _ => None,
    }
}

/// 2 = not signed in, 3 = backend answered with an error status, 1 = anything else
fn exit_code(err: &anyhow::Error) -> u8 {
    match api_error(err) {
        Some(ApiError::Unauthenticated) => 2,
        Some(ApiError::RequestFailed { .. }) => 3,
        _ => 1,
    }
}

fn init_tracing(verbose: u8, json: bool) {
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "warn,dashboard_cli=info,dashboard_client=info,dashboard_auth=info",
            2 => "info,dashboard_cli=debug,dashboard_client=debug,dashboard_auth=debug",
            _ => "debug,dashboard_cli=trace,dashboard_client=trace,dashboard_auth=trace",
        })
    });

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(verbose >= 2)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
