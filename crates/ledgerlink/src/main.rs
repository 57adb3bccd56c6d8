//! ledgerlink launcher.
//!
//! Commands: `init` (create the schema), `cycle <kind>` (run one delivery
//! cycle), `migrate` (replay the backlog), `ack` (process one inbound
//! confirmation envelope).

use anyhow::Result;
use clap::{Parser, Subcommand};
use ledgerlink::cli;
use ledgerlink::config::AppConfig;
use ledgerlink_logging::{init_logging, LogConfig};
use ledgerlink_protocol::RecordKind;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "ledgerlink", about = "Record delivery and reconciliation engine")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Config file path (defaults to <home>/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database schema
    Init,

    /// Run one delivery cycle for a record kind
    Cycle {
        /// CONTRIBUTION or FINAL_COST
        kind: RecordKind,
    },

    /// Replay the historical backlog through the delivery path
    Migrate,

    /// Process one inbound confirmation envelope
    Ack {
        /// CONTRIBUTION or FINAL_COST
        #[arg(long)]
        kind: RecordKind,

        /// Envelope JSON file (webhook body shape)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Record id (with --case-id, instead of --file)
        #[arg(long)]
        record_id: Option<i64>,

        /// Case id (with --record-id, instead of --file)
        #[arg(long)]
        case_id: Option<String>,

        /// Report title; anything but "Success" counts as an error
        #[arg(long)]
        title: Option<String>,

        /// Report detail (ISO-8601 UTC timestamp from the Recipient)
        #[arg(long)]
        detail: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    if let Err(e) = init_logging(LogConfig {
        app_name: "ledgerlink",
        verbose: args.verbose,
    }) {
        eprintln!("failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<()> {
    let config = AppConfig::load(args.config.as_deref())?;

    match args.command {
        Commands::Init => cli::init::run(&config).await,
        Commands::Cycle { kind } => cli::cycle::run(&config, kind).await,
        Commands::Migrate => cli::migrate::run(&config).await,
        Commands::Ack {
            kind,
            file,
            record_id,
            case_id,
            title,
            detail,
        } => {
            cli::ack::run(
                &config,
                cli::ack::AckArgs {
                    kind,
                    file,
                    record_id,
                    case_id,
                    title,
                    detail,
                },
            )
            .await
        }
    }
}
