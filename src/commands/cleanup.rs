use anyhow::{Context as AnyhowContext, Result};

use super::pipeline;
use super::EXIT_CANCELLED;
use crate::config::EngineConfig;
use crate::context::Context;
use crate::drift::{classify, DriftStatus};
use crate::resource::{DiscoveryScope, ResourceDescriptor};
use crate::safety::{confirm_destructive, validate_environment, validate_project_prefix, SafetyGate};
use crate::session::{CleanupSession, ResourceOutcome};
use crate::teardown::{run_teardown, TeardownOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupMode {
    /// Discovery and classification only
    Check,
    /// Delete orphaned resources
    Clean,
    /// Delete every discovered resource of the environment
    All,
}

impl CleanupMode {
    fn as_str(&self) -> &'static str {
        match self {
            CleanupMode::Check => "check",
            CleanupMode::Clean => "clean",
            CleanupMode::All => "all",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CleanupOptions {
    pub assume_yes: bool,
    pub dry_run: bool,
    pub allow_protected: Option<String>,
}

/// Handles the 'cleanup' command
pub struct CleanupCommand;

impl CleanupCommand {
    /// Run one cleanup mode; returns the process exit code
    pub fn execute(
        ctx: &Context,
        config: &EngineConfig,
        mode: CleanupMode,
        options: &CleanupOptions,
    ) -> Result<i32> {
        let scope = pipeline::scope_from(config);
        let gate = SafetyGate::new(&config.protected_environments);

        // Listing is harmless, so `check` only validates the names
        if mode == CleanupMode::Check {
            validate_project_prefix(&scope.project_prefix)?;
            validate_environment(&scope.environment)?;
        } else {
            gate.check(&scope, options.allow_protected.as_deref())?;
        }

        ctx.output.section(&format!("Cleanup: {}", mode.as_str()));
        ctx.output.key_value("Project", &scope.project_prefix);
        ctx.output
            .environment_badge(&scope.environment, gate.protected_match(&scope.environment).is_some());
        ctx.output.key_value("Region", &scope.region);
        if options.dry_run {
            ctx.output.dimmed("Dry run: no resources will be modified");
        }
        ctx.output.blank();

        let mut session = pipeline::open_session(
            config,
            &format!("cleanup-{}", mode.as_str()),
            scope.clone(),
            options.dry_run,
        )?;
        match Self::run(ctx, config, mode, options, &scope, &mut session) {
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

    /// Everything after the session log is open; returns whether the
    /// teardown was interrupted
    fn run(
        ctx: &Context,
        config: &EngineConfig,
        mode: CleanupMode,
        options: &CleanupOptions,
        scope: &DiscoveryScope,
        session: &mut CleanupSession,
    ) -> Result<bool> {
        let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

        ctx.output.info("Discovering resources...");
        let handler_ctx = pipeline::handler_context(ctx, scope);
        let inspect = mode != CleanupMode::All;
        let (report, tracked) = runtime.block_on(pipeline::gather(
            ctx,
            handler_ctx.clone(),
            config.concurrency.discovery,
            inspect,
        ))?;
        pipeline::report_warnings(ctx, session, &report);
        session.record_discovered(report.resources.clone());

        let mut targets: Vec<ResourceDescriptor> = Vec::new();
        let mut rows = Vec::new();
        for resource in &report.resources {
            let status = match &tracked {
                Some(tracked) => classify(resource, tracked),
                None => DriftStatus::Orphaned,
            };
            match (status, mode) {
                (DriftStatus::Tracked, CleanupMode::All) | (DriftStatus::Orphaned, _) => {
                    targets.push(resource.clone());
                }
                (DriftStatus::Tracked, _) => {}
            }
            let label = match (status, inspect) {
                (DriftStatus::Tracked, _) => {
                    session.record_outcome(resource, ResourceOutcome::Tracked);
                    "tracked"
                }
                (DriftStatus::Orphaned, true) => {
                    session.record_outcome(resource, ResourceOutcome::Orphaned);
                    "orphaned"
                }
                (DriftStatus::Orphaned, false) => {
                    session.record_outcome(resource, ResourceOutcome::Orphaned);
                    "present"
                }
            };
            rows.push((resource, label.to_string()));
        }
        pipeline::print_resources(ctx, &rows);

        if mode == CleanupMode::Check || targets.is_empty() {
            if targets.is_empty() {
                ctx.output.success("No resources to delete");
            }
            return Ok(false);
        }

        ctx.output.blank();
        ctx.output.warning(&format!(
            "{} resources will be deleted from {}",
            targets.len(),
            scope.stack_name()
        ));
        if !options.dry_run {
            if let Err(err) = confirm_destructive(
                ctx.input.as_ref(),
                scope,
                options.assume_yes,
                ctx.interactive,
            ) {
                session.warn(&format!("Teardown not confirmed: {}", err));
                return Err(err);
            }
            session.action(&format!("Teardown of {} resources confirmed", targets.len()));
        }

        ctx.output.section("Teardown");
        let teardown = runtime.block_on(run_teardown(
            ctx.handlers.clone(),
            handler_ctx,
            targets,
            TeardownOptions {
                concurrency: config.concurrency.teardown,
                dry_run: options.dry_run,
            },
            ctx.cancel.clone(),
            ctx.output.as_ref(),
            session,
        ))?;

        Ok(teardown.cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::resource::ResourceType;
    use crate::test_helpers::{FakeIac, ScriptedCloud};
    use crate::traits::{MockOutput, MockResponse, MockUserInput};
    use serde_json::json;
    use std::sync::Arc;

    fn config(log_dir: &std::path::Path, env: &str) -> EngineConfig {
        EngineConfig {
            project_prefix: "proj".into(),
            environment: env.into(),
            log_dir: log_dir.to_path_buf(),
            ..EngineConfig::default()
        }
    }

    fn buckets() -> Arc<ScriptedCloud> {
        Arc::new(ScriptedCloud::new().respond(
            "s3api",
            "list-buckets",
            json!({"Buckets": [{"Name": "proj-documents-dev"}, {"Name": "proj-documents-dev-abc"}]}),
        ))
    }

    fn tracked_iac() -> Arc<FakeIac> {
        Arc::new(FakeIac::new().with_entry(
            "module.storage.aws_s3_bucket.documents",
            ResourceType::S3Bucket,
            "proj-documents-dev",
        ))
    }

    #[test]
    fn test_check_reports_orphans_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = buckets();
        let ctx = Context::test(cloud.clone(), tracked_iac());
        let code = CleanupCommand::execute(
            &ctx,
            &config(dir.path(), "dev"),
            CleanupMode::Check,
            &CleanupOptions::default(),
        )
        .unwrap();
        assert_eq!(code, 1);
        assert!(cloud.mutating_calls().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_clean_deletes_only_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = buckets();
        let ctx = Context::test(cloud.clone(), tracked_iac());
        let options = CleanupOptions {
            assume_yes: true,
            ..Default::default()
        };
        let code =
            CleanupCommand::execute(&ctx, &config(dir.path(), "dev"), CleanupMode::Clean, &options).unwrap();
        assert_eq!(code, 0);
        let deleted = cloud.calls_to("s3api", "delete-bucket");
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].value_of("bucket"), Some("proj-documents-dev-abc"));
    }

    #[test]
    fn test_production_refused_even_with_yes() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = buckets();
        let ctx = Context::test(cloud.clone(), tracked_iac());
        let options = CleanupOptions {
            assume_yes: true,
            ..Default::default()
        };
        let err = CleanupCommand::execute(&ctx, &config(dir.path(), "production"), CleanupMode::All, &options)
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<ErrorKind>(), Some(ErrorKind::SafetyViolation(_))));
        assert!(cloud.calls().is_empty());
    }

    #[test]
    fn test_non_interactive_without_yes_aborts_before_delete() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = buckets();
        let ctx = Context::test(cloud.clone(), tracked_iac());
        let err = CleanupCommand::execute(
            &ctx,
            &config(dir.path(), "dev"),
            CleanupMode::Clean,
            &CleanupOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err.downcast_ref::<ErrorKind>(), Some(ErrorKind::SafetyViolation(_))));
        assert!(cloud.mutating_calls().is_empty());
    }

    #[test]
    fn test_wrong_confirmation_is_safety_violation() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = buckets();
        let input = Arc::new(MockUserInput::with_responses(vec![MockResponse::Text("delete proj".into())]));
        let ctx = Context::test_with(cloud.clone(), tracked_iac(), input, Arc::new(MockOutput::new()), true);
        let err = CleanupCommand::execute(
            &ctx,
            &config(dir.path(), "dev"),
            CleanupMode::All,
            &CleanupOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err.downcast_ref::<ErrorKind>(), Some(ErrorKind::SafetyViolation(_))));
        assert!(cloud.mutating_calls().is_empty());
    }

    #[test]
    fn test_declined_confirmation_still_writes_summary() {
        let dir = tempfile::tempdir().unwrap();
        let input = Arc::new(MockUserInput::with_responses(vec![MockResponse::Cancel]));
        let ctx = Context::test_with(buckets(), tracked_iac(), input, Arc::new(MockOutput::new()), true);
        let err = CleanupCommand::execute(
            &ctx,
            &config(dir.path(), "dev"),
            CleanupMode::Clean,
            &CleanupOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err.downcast_ref::<ErrorKind>(), Some(ErrorKind::UserCancellation)));

        let log = std::fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap().path();
        let content = std::fs::read_to_string(log).unwrap();
        let last = content.lines().last().unwrap();
        assert!(last.contains("[INFO] Summary: "), "last line was {}", last);
        assert!(content.contains("[ERROR] Run aborted: "));
    }

    #[test]
    fn test_unreachable_backend_is_fatal_for_clean() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::test(buckets(), Arc::new(FakeIac::unavailable()));
        let err = CleanupCommand::execute(
            &ctx,
            &config(dir.path(), "dev"),
            CleanupMode::Clean,
            &CleanupOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err.downcast_ref::<ErrorKind>(), Some(ErrorKind::Config(_))));
    }
}
