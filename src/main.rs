mod block;
mod config;
mod detach;
mod report;
mod runner;
mod signals;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use config::NocttyConfig;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `NOCTTY_LOG=debug`).
const LOG_ENV: &str = "NOCTTY_LOG";

/// Relinquish the controlling terminal. Optionally, run a command.
///
/// Without COMMAND, blocks until killed, leaving the terminal free to become
/// the controlling terminal of another process (e.g. a program started by
/// GDB with `set inferior-tty`).
#[derive(Parser, Debug)]
#[command(
    name = "noctty",
    about = "Relinquish the controlling terminal. Optionally, run a command.",
    override_usage = "noctty [-v] [-h] [-c PATH] [COMMAND]",
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("NOCTTY_COMMIT"),
        " ",
        env!("NOCTTY_BUILD_DATE"),
        ")"
    ),
    after_help = concat!(
        "(Built from ",
        env!("NOCTTY_COMMIT"),
        " on ",
        env!("NOCTTY_BUILD_DATE"),
        ".)"
    )
)]
pub struct Cli {
    /// Print the terminal's pathname before relinquishing it
    #[arg(short, long)]
    verbose: bool,

    /// Config file path (default: $NOCTTY_CONFIG, else built-in settings)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Shell command to run afterwards; blocks forever when absent
    #[arg(value_name = "COMMAND")]
    command: Vec<String>,
}

/// Parse arguments, exiting 0 for help/version and 1 for anything malformed.
fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                process::exit(0);
            }
            _ => {
                let _ = e.print();
                process::exit(1);
            }
        },
    }
}

fn invalid_arguments() -> ! {
    eprintln!("error: invalid arguments");
    eprintln!();
    eprint!("{}", Cli::command().render_help());
    process::exit(1);
}

fn fail(err: impl std::fmt::Display) -> ! {
    eprintln!("noctty: {err}");
    process::exit(1);
}

fn main() {
    let cli = parse_cli();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let command = match cli.command.as_slice() {
        [] => None,
        [command] => Some(command.as_str()),
        _ => invalid_arguments(),
    };

    let config = NocttyConfig::load(cli.config.as_deref()).unwrap_or_else(|e| fail(e));
    let verbose = cli.verbose || config.terminal.verbose;

    if let Err(e) = report::print_tty(
        verbose,
        &config.terminal.report_command,
        &mut std::io::stdout().lock(),
    ) {
        fail(e);
    }

    if let Err(e) = detach::relinquish_controlling_tty(&config.terminal.device) {
        fail(e);
    }

    match command {
        Some(command) => match runner::run_given_command(&config.command.shell, command) {
            Ok(code) => process::exit(code),
            Err(e) => fail(e),
        },
        None => match block::block_forever() {
            Ok(()) => process::exit(0),
            Err(e) => fail(e),
        },
    }
}
