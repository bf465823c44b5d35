pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::commands::chat::ChatArgs;

#[derive(Debug, Parser)]
#[command(
    name = "concierge",
    about = "Concierge operator CLI",
    long_about = "Operate the travel concierge: preflight checks, migrations, demo data, config inspection and one-off chat turns.",
    after_help = "Examples:\n  concierge doctor --json\n  concierge seed\n  concierge chat \"Two nights in Kathmandu for a couple\" --client-id client-demo-001"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo Himalayan catalog, client and booking (idempotent)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model key readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Send one message through the agent and print the reply")]
    Chat {
        message: String,
        #[arg(long, help = "Client id for personalization, memory and lead scoring")]
        client_id: Option<String>,
        #[arg(long, help = "Conversation id whose history is excluded from memory")]
        conversation_id: Option<String>,
        #[arg(long, help = "Use the WhatsApp channel prompt")]
        whatsapp: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start => commands::start::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Chat { message, client_id, conversation_id, whatsapp } => {
            commands::chat::run(ChatArgs { message, client_id, conversation_id, whatsapp })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
