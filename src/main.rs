mod cli;
mod error;
mod export;
mod fmt;
mod importer;
mod ledger;
mod logging;
mod models;
#[cfg(feature = "pdf")]
mod pdf;
mod settings;
mod source;
mod usage;

use clap::{CommandFactory, Parser};

use cli::{Cli, Commands, Context};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Init(args) => cli::init::run(args),
        Commands::Report { command } => {
            let ctx = Context::new(cli.source, cli.refresh);
            cli::report::dispatch(&ctx, command)
        }
        Commands::Export { command } => {
            let ctx = Context::new(cli.source, cli.refresh);
            cli::export::dispatch(&ctx, command)
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "arledger", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::debug!(error = ?e, "command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
