//! `reap` - run a command until all its spawned processes are dead
//!
//! Exit status is the command's own exit code, 111 when supervision itself
//! failed (or the command was killed by a signal), and 1 on bad usage.

use clap::Parser;
use std::io::IsTerminal;
use subreaper::{SupervisorOptions, INTERNAL_ERROR_EXIT_CODE};
use tracing::Level;

/// Run COMMAND as a subreaper and terminate everything it leaves behind
#[derive(Debug, Parser)]
#[command(name = "reap", version)]
struct Cli {
    /// Wait for all descendants to exit on their own (default: start reaping once COMMAND exits)
    #[arg(short = 'w', long = "wait-for-all")]
    wait_for_all: bool,

    /// Report spawned, reaped and killed processes on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Deny setuid/setgid privilege elevation to COMMAND and its descendants
    #[arg(short = 'x', long = "no-new-privs")]
    no_new_privs: bool,

    /// Command to run, followed by its arguments
    #[arg(value_name = "COMMAND", required = true, trailing_var_arg = true)]
    command: Vec<String>,
}

impl From<Cli> for SupervisorOptions {
    fn from(cli: Cli) -> Self {
        SupervisorOptions::new(cli.command)
            .wait_for_all(cli.wait_for_all)
            .verbose(cli.verbose)
            .restrict_privileges(cli.no_new_privs)
    }
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            // --help and --version print to stdout and succeed
            let code = if error.use_stderr() { 1 } else { 0 };
            let _ = error.print();
            std::process::exit(code);
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::INFO } else { Level::WARN };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .init();
}

fn main() {
    let cli = parse_cli();
    init_tracing(cli.verbose);

    match subreaper::run(cli.into()) {
        Ok(outcome) => std::process::exit(outcome.exit_code),
        Err(error) => {
            tracing::error!("reap: {}", error);
            std::process::exit(INTERNAL_ERROR_EXIT_CODE);
        }
    }
}
