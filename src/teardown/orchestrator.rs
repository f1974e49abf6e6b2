//! Level-by-level teardown.
//!
//! Every task of a level reaches a terminal state before the next level
//! starts. Within a level at most `concurrency` deletions run at once, each
//! on a blocking worker thread. Workers only return results; task states and
//! the session are updated here.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::graph::{build_tasks, levels, TaskState, TeardownTask};
use crate::error::{EngineResult, ErrorKind};
use crate::handlers::{DeleteProgress, HandlerContext, HandlerRegistry};
use crate::resource::{ResourceDescriptor, ResourceKey};
use crate::session::{CleanupSession, ResourceOutcome};
use crate::traits::{Output, Progress};

#[derive(Debug, Clone, Copy)]
pub struct TeardownOptions {
    pub concurrency: usize,
    pub dry_run: bool,
}

#[derive(Debug, Default)]
pub struct TeardownReport {
    pub tasks: Vec<TeardownTask>,
    /// Stopped between levels because the operator interrupted the run
    pub cancelled: bool,
}

impl TeardownReport {
    pub fn task(&self, key: &ResourceKey) -> Option<&TeardownTask> {
        self.tasks.iter().find(|t| &t.key() == key)
    }

    pub fn completed(&self) -> usize {
        self.count(|s| matches!(s, TaskState::Completed))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, TaskState::Failed(_)))
    }

    /// Tasks never started (cancellation)
    pub fn not_started(&self) -> usize {
        self.count(|s| matches!(s, TaskState::Pending))
    }

    fn count(&self, f: impl Fn(&TaskState) -> bool) -> usize {
        self.tasks.iter().filter(|t| f(&t.state)).count()
    }
}

/// What a worker reports back for one deletion
struct WorkerResult {
    index: usize,
    /// Set when the delete completed asynchronously
    waited: Option<String>,
    result: EngineResult<()>,
}

fn delete_one(
    registry: &dyn HandlerRegistry,
    ctx: &HandlerContext,
    resource: &ResourceDescriptor,
) -> (Option<String>, EngineResult<()>) {
    let handler = match registry.get(resource.resource_type) {
        Ok(h) => h,
        Err(err) => return (None, Err(err)),
    };

    let (waited, result) = match handler.delete(ctx, resource) {
        Ok(DeleteProgress::Done) => (None, Ok(())),
        Ok(DeleteProgress::Pending(status)) => {
            (Some(status), handler.wait_for_deletion(ctx, resource))
        }
        Err(err) => (None, Err(err)),
    };

    let result = match result {
        Err(err) if err.is_not_found() => Ok(()),
        Err(ErrorKind::DependencyConflict { resource: label, blockers }) if blockers.is_empty() => {
            Err(ErrorKind::DependencyConflict {
                resource: label,
                blockers: handler.diagnose_blockers(ctx, resource).unwrap_or_default(),
            })
        }
        other => other,
    };
    (waited, result)
}

/// Delete `resources` in dependency order
pub async fn run_teardown(
    registry: Arc<dyn HandlerRegistry>,
    ctx: HandlerContext,
    resources: Vec<ResourceDescriptor>,
    options: TeardownOptions,
    cancel: Arc<AtomicBool>,
    output: &dyn Output,
    session: &mut CleanupSession,
) -> EngineResult<TeardownReport> {
    let mut tasks = build_tasks(resources, registry.as_ref())?;
    let levels = levels(&tasks)?;
    let index: HashMap<ResourceKey, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.key(), i))
        .collect();
    let mut cancelled = false;

    for (number, level) in levels.iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            let remaining = tasks.iter().filter(|t| !t.state.is_terminal()).count();
            session.warn(&format!(
                "Interrupted: stopping before level {} with {} resources not attempted",
                number + 1,
                remaining
            ));
            output.warning(&format!("Interrupted, {} resources were not attempted", remaining));
            cancelled = true;
            break;
        }

        session.info(&format!("Teardown level {}: {} resources", number + 1, level.len()));
        output.subsection(&format!("Level {} ({} resources)", number + 1, level.len()));

        let mut runnable = Vec::new();
        for key in level {
            let i = index[key];
            let blocked_by: Vec<String> = tasks[i]
                .depends_on
                .iter()
                .filter_map(|dep| index.get(dep))
                .filter(|d| tasks[**d].state != TaskState::Completed)
                .map(|d| tasks[*d].resource.display_string())
                .collect();

            if !blocked_by.is_empty() {
                let reason = format!("not attempted, blocked by {}", blocked_by.join(", "));
                let resource = tasks[i].resource.clone();
                let diag_registry = registry.clone();
                let diag_ctx = ctx.clone();
                let diag_resource = resource.clone();
                let blockers = tokio::task::spawn_blocking(move || {
                    diag_registry
                        .get(diag_resource.resource_type)
                        .and_then(|h| h.diagnose_blockers(&diag_ctx, &diag_resource))
                })
                .await;
                match blockers {
                    Ok(Ok(found)) if !found.is_empty() => session.warn(&format!(
                        "Blockers for {}: {}",
                        resource.display_string(),
                        found.join("; ")
                    )),
                    Ok(Err(err)) => session.warn(&format!(
                        "Could not list blockers for {}: {}",
                        resource.display_string(),
                        err
                    )),
                    _ => {}
                }
                output.progress(&resource.display_string(), &Progress::Blocked(reason.clone()));
                tasks[i].transition(TaskState::Failed(reason.clone()));
                session.record_outcome(&resource, ResourceOutcome::Failed(reason));
                continue;
            }

            if options.dry_run {
                tasks[i].transition(TaskState::Completed);
                output.progress(&tasks[i].resource.display_string(), &Progress::WouldDelete);
                let resource = tasks[i].resource.clone();
                session.record_outcome(&resource, ResourceOutcome::WouldDelete);
                continue;
            }

            tasks[i].transition(TaskState::InProgress);
            tasks[i].attempt += 1;
            session.action(&format!("Deleting {}", tasks[i].resource.display_string()));
            runnable.push(i);
        }

        let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
        let mut handles = Vec::new();
        for i in runnable {
            let permit = semaphore.clone().acquire_owned().await.ok();
            let registry = registry.clone();
            let ctx = ctx.clone();
            let resource = tasks[i].resource.clone();

            handles.push(tokio::spawn(async move {
                let (waited, result) =
                    tokio::task::spawn_blocking(move || delete_one(registry.as_ref(), &ctx, &resource))
                        .await
                        .unwrap_or_else(|e| {
                            (
                                None,
                                Err(ErrorKind::Api {
                                    code: None,
                                    message: format!("teardown task panicked: {}", e),
                                }),
                            )
                        });
                drop(permit);
                WorkerResult {
                    index: i,
                    waited,
                    result,
                }
            }));
        }

        for joined in join_all(handles).await {
            let Ok(worker) = joined else {
                continue;
            };
            let task = &mut tasks[worker.index];
            let label = task.resource.display_string();
            // recorded after the fact; the wait already happened inside the worker
            if let Some(status) = worker.waited {
                task.transition(TaskState::WaitingAsync);
                output.progress(&label, &Progress::Waiting);
                session.info(&format!("{}: waited for asynchronous deletion ({})", label, status));
            }
            let resource = task.resource.clone();
            match worker.result {
                Ok(()) => {
                    task.transition(TaskState::Completed);
                    output.progress(&label, &Progress::Deleted);
                    session.record_outcome(&resource, ResourceOutcome::Completed);
                }
                Err(err) => {
                    let reason = err.to_string();
                    task.transition(TaskState::Failed(reason.clone()));
                    output.progress(&label, &Progress::Failed(reason.clone()));
                    session.record_outcome(&resource, ResourceOutcome::Failed(reason));
                }
            }
        }
    }

    Ok(TeardownReport { tasks, cancelled })
}
