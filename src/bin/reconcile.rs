use clap::Parser;

use rag_reconcile::cli::{self, ScopeArgs};
use rag_reconcile::commands::{ReconcileCommand, ReconcileOptions};

#[derive(Parser)]
#[command(name = "reconcile")]
#[command(about = "Import orphaned AWS resources back into Terraform state", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    scope: ScopeArgs,

    /// Decide without prompting: import confident matches, flag the rest
    #[arg(long)]
    auto: bool,
}

fn main() {
    let cli = Cli::parse();

    let options = ReconcileOptions {
        auto: cli.auto,
        dry_run: cli.scope.dry_run,
        assume_yes: cli.scope.yes,
        allow_protected: cli.scope.allow_protected.clone(),
    };

    let code = cli::run(&cli.scope, |ctx, config| {
        ReconcileCommand::execute(ctx, config, &options)
    });
    std::process::exit(code);
}
