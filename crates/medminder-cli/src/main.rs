use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod terminal;

#[derive(Parser)]
#[command(name = "medminder", version, about = "Medication reminder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Alert about overdue doses and start reminders for them
    Check {
        /// Print the check report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remind about a dose period until it is logged
    Remind {
        /// Period name (defaults to the configured default period)
        period: Option<String>,
        /// Print the reminder report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Today's medication log
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("medminder=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Check { json } => commands::check::run(json),
        Commands::Remind { period, json } => commands::remind::run(period, json),
        Commands::Status { json } => commands::status::run(json),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
