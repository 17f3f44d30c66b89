mod cmd;

use clap::{Parser, Subcommand};
use cmd::Format;
use miette::Result;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(version, about = "Concurrency-safety checker for isolated code", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Check a program model and report isolation findings")]
    Check {
        path: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        #[arg(long)]
        no_hints: bool,
    },
    #[command(about = "Tell whether calls to a function or method may run concurrently")]
    Dispatch {
        path: PathBuf,
        #[arg(long)]
        method: String,
        #[arg(long)]
        object: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    #[command(about = "Explain a rule code, or list all of them")]
    Explain { code: Option<String> },
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            path,
            config,
            format,
            no_hints,
        } => {
            let outcome = cmd::check(&path, config.as_deref(), format, no_hints)?;
            print!("{}", outcome.output);
            if outcome.failed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Dispatch {
            path,
            method,
            object,
            config,
        } => {
            let answer = cmd::dispatch(&path, object.as_deref(), &method, config.as_deref())?;
            println!("{}", answer);
        }
        Commands::Explain { code } => {
            println!("{}", cmd::explain(code.as_deref())?);
        }
    }
    Ok(ExitCode::SUCCESS)
}
