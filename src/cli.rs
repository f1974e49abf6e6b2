//! Command-line plumbing shared by the `cleanup` and `reconcile` binaries.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::commands::{exit_code_for_error, EXIT_CANCELLED};
use crate::config::{ConfigOverrides, EngineConfig};
use crate::context::Context;
use crate::output;

/// Scope and safety flags accepted by both binaries
#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Project prefix every resource name starts with
    #[arg(long, visible_alias = "project", env = "RAG_PROJECT_PREFIX", global = true)]
    pub prefix: Option<String>,

    /// Environment name (dev, staging, ...)
    #[arg(long = "env", env = "RAG_ENVIRONMENT", global = true)]
    pub environment: Option<String>,

    /// AWS region to operate in
    #[arg(long, env = "AWS_REGION", global = true)]
    pub region: Option<String>,

    /// Configuration file (defaults to ./rag-reconcile.yaml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Skip the typed confirmation before destructive actions
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Report what would happen without mutating anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Allow a protected environment; must repeat the environment name
    #[arg(long, value_name = "ENV", global = true)]
    pub allow_protected: Option<String>,

    /// Directory holding the Terraform configuration
    #[arg(long, global = true)]
    pub iac_dir: Option<PathBuf>,

    /// IaC binary to run (terraform or tofu)
    #[arg(long, global = true)]
    pub iac_binary: Option<String>,

    /// Directory for run logs
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
}

impl ScopeArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            project_prefix: self.prefix.clone(),
            environment: self.environment.clone(),
            region: self.region.clone(),
            log_dir: self.log_dir.clone(),
            iac_binary: self.iac_binary.clone(),
            iac_dir: self.iac_dir.clone(),
        }
    }

    /// Configuration file plus command-line overrides
    pub fn load_config(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig::load(self.config.as_deref())?;
        config.apply_overrides(self.overrides());
        config.validate()?;
        Ok(config)
    }
}

/// First Ctrl-C asks the run to stop after the current level; the second
/// one exits immediately.
fn install_interrupt_handler(cancel: Arc<AtomicBool>) {
    let result = ctrlc::set_handler(move || {
        if cancel.swap(true, Ordering::SeqCst) {
            std::process::exit(EXIT_CANCELLED);
        }
        output::warning("Interrupted: finishing in-flight deletions, press Ctrl-C again to abort");
    });
    if let Err(err) = result {
        output::warning(&format!("Could not install Ctrl-C handler: {}", err));
    }
}

/// Load configuration, build the context and run `command`; returns the
/// process exit code.
pub fn run<F>(args: &ScopeArgs, command: F) -> i32
where
    F: FnOnce(&Context, &EngineConfig) -> Result<i32>,
{
    let config = match args.load_config() {
        Ok(config) => config,
        Err(err) => {
            output::error(&format!("{:#}", err));
            return exit_code_for_error(&err);
        }
    };

    let cancel = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(cancel.clone());
    let ctx = Context::from_config(&config).with_cancel_flag(cancel);

    match command(&ctx, &config) {
        Ok(code) => code,
        Err(err) => {
            output::error(&format!("{:#}", err));
            exit_code_for_error(&err)
        }
    }
}
