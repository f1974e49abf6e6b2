use anyhow::{Context as AnyhowContext, Result};

use super::pipeline;
use super::EXIT_CANCELLED;
use crate::config::EngineConfig;
use crate::context::Context;
use crate::drift::partition;
use crate::import_executor::execute_imports;
use crate::planner::{plan, Decision, DecisionPrompt, PlanMode, UserInputPrompt};
use crate::resolver::resolve;
use crate::resource::{DiscoveryScope, ResourceDescriptor};
use crate::safety::{confirm_destructive, SafetyGate};
use crate::session::{CleanupSession, ResourceOutcome};
use crate::teardown::{run_teardown, TeardownOptions};

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Decide without prompting
    pub auto: bool,
    pub dry_run: bool,
    pub assume_yes: bool,
    pub allow_protected: Option<String>,
}

/// Handles the 'reconcile' command: bring orphans back under IaC management
pub struct ReconcileCommand;

impl ReconcileCommand {
    pub fn execute(ctx: &Context, config: &EngineConfig, options: &ReconcileOptions) -> Result<i32> {
        let scope = pipeline::scope_from(config);
        let gate = SafetyGate::new(&config.protected_environments);
        gate.check(&scope, options.allow_protected.as_deref())?;

        ctx.output.section("Reconcile");
        ctx.output.key_value("Project", &scope.project_prefix);
        ctx.output
            .environment_badge(&scope.environment, gate.protected_match(&scope.environment).is_some());
        ctx.output.key_value("Region", &scope.region);

        let mut session = pipeline::open_session(config, "reconcile", scope.clone(), options.dry_run)?;
        match Self::run(ctx, config, options, &scope, &mut session) {
            Ok(cancelled) => {
                let code = pipeline::finish(ctx, &mut session);
                Ok(if cancelled { EXIT_CANCELLED } else { code })
            }
            Err(err) => {
                session.error(&format!("Run aborted: {}", err));
                pipeline::finish(ctx, &mut session);
                Err(err)
            }
        }
    }

    /// Plan, import and delete; returns whether the teardown was interrupted
    fn run(
        ctx: &Context,
        config: &EngineConfig,
        options: &ReconcileOptions,
        scope: &DiscoveryScope,
        session: &mut CleanupSession,
    ) -> Result<bool> {
        let mode = if options.auto || options.dry_run {
            PlanMode::Auto
        } else if !ctx.interactive {
            let message = "stdin is not a terminal; deciding automatically";
            session.warn(message);
            ctx.output.warning(message);
            PlanMode::Auto
        } else {
            PlanMode::Interactive
        };
        if options.dry_run {
            ctx.output.dimmed("Dry run: nothing will be imported or deleted");
        }
        ctx.output.blank();

        let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

        ctx.output.info("Discovering resources and reading declared state...");
        let handler_ctx = pipeline::handler_context(ctx, scope);
        let (report, tracked) = runtime.block_on(pipeline::gather(
            ctx,
            handler_ctx.clone(),
            config.concurrency.discovery,
            true,
        ))?;
        let mut tracked = tracked.unwrap_or_default();
        pipeline::report_warnings(ctx, session, &report);
        session.record_discovered(report.resources.clone());
        session.info(&format!("{} entries in declared state", tracked.len()));

        let (managed, orphans) = partition(&report.resources, &tracked);
        for resource in &managed {
            session.record_outcome(resource, ResourceOutcome::Tracked);
        }
        for resource in &orphans {
            session.record_outcome(resource, ResourceOutcome::Orphaned);
        }
        ctx.output.info(&format!(
            "{} resources found, {} tracked, {} orphaned",
            report.resources.len(),
            managed.len(),
            orphans.len()
        ));

        if orphans.is_empty() {
            ctx.output.success("Declared state already covers every resource");
            return Ok(false);
        }

        let suggested: Vec<_> = orphans
            .into_iter()
            .map(|resource| {
                let suggestion = resolve(&resource);
                (resource, suggestion)
            })
            .collect();
        ctx.output.section("Orphaned resources");
        let rows: Vec<_> = suggested
            .iter()
            .map(|(resource, suggestion)| {
                (
                    resource,
                    format!("{} ({})", suggestion.address, suggestion.confidence),
                )
            })
            .collect();
        pipeline::print_resources(ctx, &rows);

        let prompt = UserInputPrompt::new(ctx.input.clone());
        let prompt_ref: Option<&dyn DecisionPrompt> = match mode {
            PlanMode::Interactive => Some(&prompt as &dyn DecisionPrompt),
            PlanMode::Auto => None,
        };
        let planned = plan(suggested, mode, prompt_ref, session)?;

        let mut deletions: Vec<ResourceDescriptor> = Vec::new();
        for item in &planned {
            match &item.decision {
                Decision::Skip => session.record_outcome(&item.resource, ResourceOutcome::Skipped),
                Decision::ManualReview => session.record_outcome(
                    &item.resource,
                    ResourceOutcome::Unresolved(format!(
                        "needs manual review, suggested {}",
                        item.suggestion.address
                    )),
                ),
                Decision::Delete => deletions.push(item.resource.clone()),
                Decision::Import(_) => {}
            }
        }

        ctx.output.section("Import");
        let stats = execute_imports(ctx.iac.as_ref(), &planned, &mut tracked, session)?;
        ctx.output.key_value("Imported", &stats.imported.to_string());
        if stats.planned > 0 {
            ctx.output.key_value("Would import", &stats.planned.to_string());
        }
        if stats.unresolved > 0 {
            ctx.output.warning(&format!("{} imports could not be applied", stats.unresolved));
        }

        if !deletions.is_empty() {
            ctx.output.blank();
            ctx.output.warning(&format!(
                "{} resources were marked for deletion",
                deletions.len()
            ));
            if !options.dry_run {
                if let Err(err) = confirm_destructive(
                    ctx.input.as_ref(),
                    scope,
                    options.assume_yes,
                    ctx.interactive,
                ) {
                    session.warn(&format!("Deletion not confirmed: {}", err));
                    return Err(err);
                }
            }

            ctx.output.section("Teardown");
            let teardown = runtime.block_on(run_teardown(
                ctx.handlers.clone(),
                handler_ctx,
                deletions,
                TeardownOptions {
                    concurrency: config.concurrency.teardown,
                    dry_run: options.dry_run,
                },
                ctx.cancel.clone(),
                ctx.output.as_ref(),
                session,
            ))?;
            return Ok(teardown.cancelled);
        }

        Ok(false)
    }
}
