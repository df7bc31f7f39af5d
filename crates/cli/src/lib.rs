pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "deplo",
    about = "Deplo operator CLI",
    long_about = "Inspect deplo configuration, preview agent manifests, and check runtime readiness.",
    after_help = "Examples:\n  deplo config\n  deplo render --agent-id abc123\n  deplo doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Print the workload and exposure synthesized for an agent, without applying")]
    Render {
        #[arg(long, help = "Agent identifier, as carried in the queue message")]
        agent_id: String,
        #[arg(long, help = "Read the prompt from this file instead of the prompts root")]
        prompt_file: Option<PathBuf>,
    },
    #[command(about = "Validate config and prompts root readability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Render { agent_id, prompt_file } => {
            commands::render::run(&agent_id, prompt_file.as_deref())
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
