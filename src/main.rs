mod cli;
mod core;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cwatch", about = "Claude usage quota monitor", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll usage periodically (default)
    Watch {
        /// Print the detail panel after every update
        #[arg(long)]
        panel: bool,
    },
    /// Fetch usage once and print it
    Usage,
    /// Manage the stored access token
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show recorded usage history
    History {
        /// Number of most recent points to show
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Delete all recorded points
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
enum AuthAction {
    /// Paste a token and store it in the OS keyring
    Login,
    /// Remove the stored token
    Logout,
    /// Show the cached token and auto-detection sources
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file
    Check,
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let debug_logging = core::config::AppConfig::load()
        .map(|c| c.monitor.debug_logging)
        .unwrap_or(false);
    core::logging::init(cli.verbose, debug_logging);

    let output_opts = cli::output::OutputOptions {
        format: if cli.json {
            cli::output::OutputFormat::Json
        } else {
            match cli.format.as_deref() {
                Some("json") => cli::output::OutputFormat::Json,
                _ => cli::output::OutputFormat::Text,
            }
        },
        pretty: cli.pretty,
        use_color: cli::output::detect_color(!cli.no_color),
        verbose: cli.verbose,
    };

    match cli.command {
        None => cli::watch_cmd::run(false, &output_opts).await?,
        Some(Commands::Watch { panel }) => cli::watch_cmd::run(panel, &output_opts).await?,
        Some(Commands::Usage) => cli::usage_cmd::run(&output_opts).await?,
        Some(Commands::Auth { action }) => match action {
            AuthAction::Login => cli::auth_cmd::login(&output_opts).await?,
            AuthAction::Logout => cli::auth_cmd::logout(&output_opts)?,
            AuthAction::Status => cli::auth_cmd::status(&output_opts)?,
        },
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init => cli::config_cmd::init(&output_opts)?,
            ConfigAction::Check => cli::config_cmd::check(&output_opts)?,
            ConfigAction::Path => cli::config_cmd::path(&output_opts)?,
        },
        Some(Commands::History { limit, clear }) => {
            cli::history_cmd::run(limit, clear, &output_opts)?
        }
    }

    Ok(())
}
