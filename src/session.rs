//! Per-run state and the append-only run log.
//!
//! A [`CleanupSession`] is created when a command starts and is only touched
//! by the orchestrating thread; workers hand their results back and the
//! session records them.

use chrono::{DateTime, Local, SecondsFormat};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{EngineResult, ErrorKind};
use crate::planner::Decision;
use crate::resource::{DiscoveryScope, ResourceDescriptor, ResourceKey};

/// Highest exit code used for "resources remaining"
pub const MAX_REMAINING_EXIT_CODE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    /// A mutating call was issued
    Action,
    /// A mutating call was skipped because of `--dry-run`
    DryRun,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Action => "ACTION",
            LogLevel::DryRun => "DRYRUN",
        }
    }
}

/// `[timestamp][LEVEL] message` lines, kept in memory and appended to a file
pub struct SessionLog {
    path: Option<PathBuf>,
    file: Option<File>,
    lines: Vec<String>,
}

impl SessionLog {
    /// Log into `<dir>/<command>-<YYYYmmdd_HHMMSS>.log`, creating `dir`
    pub fn to_file(dir: &Path, command: &str, started_at: DateTime<Local>) -> EngineResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            ErrorKind::Config(format!("cannot create log directory {}: {}", dir.display(), e))
        })?;
        let path = dir.join(format!(
            "{}-{}.log",
            command,
            started_at.format("%Y%m%d_%H%M%S")
        ));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ErrorKind::Config(format!("cannot open {}: {}", path.display(), e)))?;

        Ok(Self {
            path: Some(path),
            file: Some(file),
            lines: Vec::new(),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            file: None,
            lines: Vec::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn write(&mut self, level: LogLevel, message: &str) {
        let line = format!(
            "[{}][{}] {}",
            Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            level.as_str(),
            message
        );
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = writeln!(file, "{}", line) {
                crate::output::warning(&format!("Run log write failed, continuing without it: {}", e));
                self.file = None;
            }
        }
        self.lines.push(line);
    }
}

/// Final state of one resource in this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceOutcome {
    /// Declared state already owns it
    Tracked,
    /// Not tracked and no action was requested (`cleanup check`)
    Orphaned,
    Imported(String),
    /// Deleted, or already gone when the delete was issued
    Completed,
    Failed(String),
    Unresolved(String),
    Skipped,
    WouldImport(String),
    WouldDelete,
}

impl ResourceOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ResourceOutcome::Tracked => "tracked",
            ResourceOutcome::Orphaned => "orphaned",
            ResourceOutcome::Imported(_) => "imported",
            ResourceOutcome::Completed => "deleted",
            ResourceOutcome::Failed(_) => "failed",
            ResourceOutcome::Unresolved(_) => "unresolved",
            ResourceOutcome::Skipped => "skipped",
            ResourceOutcome::WouldImport(_) => "would import",
            ResourceOutcome::WouldDelete => "would delete",
        }
    }

    /// Whether this resource still needs attention after the run
    pub fn is_remaining(&self) -> bool {
        matches!(
            self,
            ResourceOutcome::Orphaned | ResourceOutcome::Failed(_) | ResourceOutcome::Unresolved(_)
        )
    }
}

/// Counts reported at the end of every run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub discovered: usize,
    pub tracked: usize,
    pub orphaned: usize,
    pub imported: usize,
    pub completed: usize,
    pub failed: usize,
    pub unresolved: usize,
    pub skipped: usize,
    pub planned: usize,
}

impl Summary {
    pub fn remaining(&self) -> usize {
        self.orphaned + self.failed + self.unresolved
    }

    /// Process exit code: the remaining count, capped
    pub fn exit_code(&self) -> i32 {
        self.remaining().min(MAX_REMAINING_EXIT_CODE) as i32
    }

    pub fn rows(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("Discovered", self.discovered),
            ("Tracked", self.tracked),
            ("Orphaned", self.orphaned),
            ("Imported", self.imported),
            ("Completed", self.completed),
            ("Failed", self.failed),
            ("Unresolved", self.unresolved),
            ("Skipped", self.skipped),
            ("Planned (dry run)", self.planned),
        ]
    }
}

/// Everything one command invocation learns and decides
pub struct CleanupSession {
    pub id: Uuid,
    pub command: String,
    pub scope: DiscoveryScope,
    pub dry_run: bool,
    pub operator: String,
    pub started_at: DateTime<Local>,
    descriptors: Vec<ResourceDescriptor>,
    decisions: BTreeMap<ResourceKey, Decision>,
    outcomes: BTreeMap<ResourceKey, ResourceOutcome>,
    log: SessionLog,
}

impl CleanupSession {
    pub fn new(command: &str, scope: DiscoveryScope, dry_run: bool, log: SessionLog) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            command: command.to_string(),
            scope,
            dry_run,
            operator: whoami::username(),
            started_at: Local::now(),
            descriptors: Vec::new(),
            decisions: BTreeMap::new(),
            outcomes: BTreeMap::new(),
            log,
        };
        let header = format!(
            "Session {} started by {}: {} for {} in {}{}",
            session.id,
            session.operator,
            session.command,
            session.scope.stack_name(),
            session.scope.region,
            if dry_run { " (dry run)" } else { "" }
        );
        session.log.write(LogLevel::Info, &header);
        session
    }

    /// Session that only logs to memory
    pub fn in_memory(command: &str, scope: DiscoveryScope, dry_run: bool) -> Self {
        Self::new(command, scope, dry_run, SessionLog::in_memory())
    }

    pub fn log(&mut self, level: LogLevel, message: &str) {
        self.log.write(level, message);
    }

    pub fn info(&mut self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&mut self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn action(&mut self, message: &str) {
        self.log(LogLevel::Action, message);
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log.path()
    }

    pub fn log_lines(&self) -> &[String] {
        self.log.lines()
    }

    pub fn record_discovered(&mut self, descriptors: Vec<ResourceDescriptor>) {
        self.info(&format!("Discovered {} resources", descriptors.len()));
        self.descriptors = descriptors;
    }

    pub fn descriptors(&self) -> &[ResourceDescriptor] {
        &self.descriptors
    }

    pub fn record_decision(&mut self, resource: &ResourceDescriptor, decision: Decision) {
        self.info(&format!("Decision for {}: {}", resource.display_string(), decision));
        self.decisions.insert(resource.key(), decision);
    }

    pub fn decision(&self, key: &ResourceKey) -> Option<&Decision> {
        self.decisions.get(key)
    }

    pub fn record_outcome(&mut self, resource: &ResourceDescriptor, outcome: ResourceOutcome) {
        let label = resource.display_string();
        match &outcome {
            ResourceOutcome::Failed(reason) => {
                self.error(&format!("{}: failed: {}", label, reason))
            }
            ResourceOutcome::Unresolved(reason) => {
                self.warn(&format!("{}: unresolved: {}", label, reason))
            }
            ResourceOutcome::WouldImport(address) => self.log(
                LogLevel::DryRun,
                &format!("{}: would import as {}", label, address),
            ),
            ResourceOutcome::WouldDelete => {
                self.log(LogLevel::DryRun, &format!("{}: would delete", label))
            }
            ResourceOutcome::Imported(address) => {
                self.action(&format!("{}: imported as {}", label, address))
            }
            ResourceOutcome::Completed => self.action(&format!("{}: deleted", label)),
            other => self.info(&format!("{}: {}", label, other.label())),
        }
        self.outcomes.insert(resource.key(), outcome);
    }

    pub fn outcome(&self, key: &ResourceKey) -> Option<&ResourceOutcome> {
        self.outcomes.get(key)
    }

    pub fn outcomes(&self) -> &BTreeMap<ResourceKey, ResourceOutcome> {
        &self.outcomes
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            discovered: self.descriptors.len(),
            ..Default::default()
        };
        for outcome in self.outcomes.values() {
            match outcome {
                ResourceOutcome::Tracked => summary.tracked += 1,
                ResourceOutcome::Orphaned => summary.orphaned += 1,
                ResourceOutcome::Imported(_) => summary.imported += 1,
                ResourceOutcome::Completed => summary.completed += 1,
                ResourceOutcome::Failed(_) => summary.failed += 1,
                ResourceOutcome::Unresolved(_) => summary.unresolved += 1,
                ResourceOutcome::Skipped => summary.skipped += 1,
                ResourceOutcome::WouldImport(_) | ResourceOutcome::WouldDelete => {
                    summary.planned += 1
                }
            }
        }
        summary
    }

    /// Write the closing summary line and return the exit code
    pub fn finish(&mut self) -> i32 {
        let summary = self.summary();
        let line = summary
            .rows()
            .iter()
            .map(|(k, v)| format!("{}={}", k.to_lowercase().replace(' ', "_"), v))
            .collect::<Vec<_>>()
            .join(" ");
        self.info(&format!("Summary: {}", line));
        summary.exit_code()
    }
}
