use clap::{Parser, Subcommand};

use rag_reconcile::cli::{self, ScopeArgs};
use rag_reconcile::commands::{CleanupCommand, CleanupMode, CleanupOptions};

#[derive(Parser)]
#[command(name = "cleanup")]
#[command(about = "Find and tear down the RAG application's AWS resources", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    scope: ScopeArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List resources and report which ones are not in declared state
    Check,

    /// Delete resources that declared state does not track
    Clean,

    /// Delete every resource of the environment, tracked or not
    All,
}

fn main() {
    let cli = Cli::parse();

    let mode = match cli.command {
        Commands::Check => CleanupMode::Check,
        Commands::Clean => CleanupMode::Clean,
        Commands::All => CleanupMode::All,
    };
    let options = CleanupOptions {
        assume_yes: cli.scope.yes,
        dry_run: cli.scope.dry_run,
        allow_protected: cli.scope.allow_protected.clone(),
    };

    let code = cli::run(&cli.scope, |ctx, config| {
        CleanupCommand::execute(ctx, config, mode, &options)
    });
    std::process::exit(code);
}
