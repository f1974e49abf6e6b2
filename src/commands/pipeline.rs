//! Steps shared by the cleanup and reconcile commands.

use anyhow::{Context as AnyhowContext, Result};
use chrono::Local;

use crate::config::EngineConfig;
use crate::context::Context;
use crate::declared_state::{self, TrackedSet};
use crate::discovery::{discover, DiscoveryReport};
use crate::error::{EngineResult, ErrorKind};
use crate::handlers::HandlerContext;
use crate::resource::{DiscoveryScope, ResourceDescriptor, ResourceType};
use crate::session::{CleanupSession, SessionLog};

pub fn scope_from(config: &EngineConfig) -> DiscoveryScope {
    DiscoveryScope::new(&config.project_prefix, &config.environment, &config.region)
}

/// Session whose log file lives under the configured log directory
pub fn open_session(
    config: &EngineConfig,
    command: &str,
    scope: DiscoveryScope,
    dry_run: bool,
) -> Result<CleanupSession> {
    let log = SessionLog::to_file(&config.log_dir, command, Local::now())
        .with_context(|| format!("Failed to open run log in {}", config.log_dir.display()))?;
    Ok(CleanupSession::new(command, scope, dry_run, log))
}

pub fn handler_context(ctx: &Context, scope: &DiscoveryScope) -> HandlerContext {
    HandlerContext::new(ctx.cloud.clone(), scope.clone(), ctx.waits)
}

/// Discovery and (optionally) declared-state inspection, side by side
pub async fn gather(
    ctx: &Context,
    handler_ctx: HandlerContext,
    concurrency: usize,
    inspect: bool,
) -> EngineResult<(DiscoveryReport, Option<TrackedSet>)> {
    let iac = ctx.iac.clone();
    let discovery = discover(
        ctx.handlers.clone(),
        handler_ctx,
        ResourceType::all(),
        concurrency,
    );
    let declared = async move {
        if !inspect {
            return Ok(None);
        }
        tokio::task::spawn_blocking(move || declared_state::inspect(iac.as_ref()))
            .await
            .map_err(|e| ErrorKind::Config(format!("declared-state inspection failed: {}", e)))?
            .map(Some)
    };
    let (report, tracked) = tokio::join!(discovery, declared);
    Ok((report, tracked?))
}

/// Log and print listing failures; they never abort the run
pub fn report_warnings(ctx: &Context, session: &mut CleanupSession, report: &DiscoveryReport) {
    for (resource_type, message) in &report.warnings {
        let line = format!("Could not list {}: {}", resource_type.display_name(), message);
        session.warn(&line);
        ctx.output.warning(&line);
    }
}

/// Table of resources with a status column
pub fn print_resources(ctx: &Context, rows: &[(&ResourceDescriptor, String)]) {
    if rows.is_empty() {
        return;
    }
    let table_rows: Vec<Vec<String>> = rows
        .iter()
        .map(|(resource, status)| {
            vec![
                resource.resource_type.display_name().to_string(),
                resource.name.clone(),
                resource.native_id.clone(),
                status.clone(),
            ]
        })
        .collect();
    ctx.output.table(&["Type", "Name", "ID", "Status"], &table_rows);
}

/// Summary table, log path, and the exit code derived from the session
pub fn finish(ctx: &Context, session: &mut CleanupSession) -> i32 {
    let code = session.finish();
    let summary = session.summary();

    ctx.output.blank();
    ctx.output.section("Summary");
    let rows: Vec<Vec<String>> = summary
        .rows()
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(label, count)| vec![label.to_string(), count.to_string()])
        .collect();
    ctx.output.table(&["Outcome", "Count"], &rows);
    if let Some(path) = session.log_path() {
        ctx.output.key_value("Log file", &path.display().to_string());
    }
    if summary.remaining() == 0 {
        ctx.output.success("Nothing left to resolve");
    } else {
        ctx.output.warning(&format!(
            "{} resources still need attention",
            summary.remaining()
        ));
    }
    code
}
