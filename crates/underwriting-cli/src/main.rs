mod commands;
mod config;
mod input;
mod output;
mod telemetry;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::financing::FinancingArgs;
use commands::rates::RatesArgs;
use commands::underwrite::DealArgs;
use commands::workspace::WorkspaceArgs;
use config::MarketArgs;

/// Income-property underwriting calculations
#[derive(Parser)]
#[command(
    name = "uwc",
    version,
    about = "Income-property underwriting calculations",
    long_about = "A CLI for underwriting income properties with decimal precision. \
                  Computes debt service, NOI, cap rate, cash-on-cash, DSCR, break-even \
                  occupancy and conservative/base/optimistic scenarios from manual \
                  figures or a rent roll."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log filter used when RUST_LOG is unset (e.g. info, debug)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(flatten)]
    market: MarketArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Underwrite a deal: debt service, NOI, returns, risk flags and scenarios
    Underwrite(DealArgs),
    /// Conservative, base and optimistic scenarios side by side
    Scenarios(DealArgs),
    /// Loan amount, monthly payment and annual debt service
    DebtService(FinancingArgs),
    /// Year-by-year amortization schedule
    Amortize(FinancingArgs),
    /// Indicative mortgage rates by property type
    Rates(RatesArgs),
    /// Save, load, list or delete underwriting workspaces
    Workspace(WorkspaceArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = telemetry::init(&cli.log_level) {
        eprintln!("{}: {}", "error".red().bold(), e);
        process::exit(1);
    }

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Version => {
            println!("uwc {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        command => run(command, &cli.market),
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

fn run(command: Commands, market: &MarketArgs) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let defaults = config::load_defaults(market)?;
    match command {
        Commands::Underwrite(args) => commands::underwrite::run_underwrite(args, &defaults),
        Commands::Scenarios(args) => commands::underwrite::run_scenarios(args, &defaults),
        Commands::DebtService(args) => commands::financing::run_debt_service(args, &defaults),
        Commands::Amortize(args) => commands::financing::run_amortize(args, &defaults),
        Commands::Rates(args) => commands::rates::run_rates(args, &defaults),
        Commands::Workspace(args) => commands::workspace::run_workspace(args, &defaults),
        Commands::Version => Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") })),
    }
}
