pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "dealdesk",
    about = "Dealdesk operator CLI",
    long_about = "Check dealdesk configuration and backend readiness, or run a one-off deal query.",
    after_help = "Examples:\n  dealdesk doctor --json\n  dealdesk config\n  \
                  dealdesk ask \"What is CompanyABC's deal?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config and probe the sales and deal backends")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one deal question through the agent and print the answer")]
    Ask {
        #[arg(help = "Natural-language question, e.g. \"deal for customer id 7\"")]
        query: String,
        #[arg(long, help = "Customer id to use instead of parsing the question")]
        customer_id: Option<i64>,
        #[arg(long, help = "Company name to resolve instead of parsing the question")]
        company: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Ask { query, customer_id, company } => {
            commands::ask::run(commands::ask::AskArgs { query, customer_id, company })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
