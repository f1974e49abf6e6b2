use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Mutex;

/// Runs the external tools (`aws`, `terraform`/`tofu`) the engine drives
pub trait CommandExecutor: Send + Sync {
    /// Run `command` to completion and capture its output
    fn execute(&self, command: &str, args: &[&str], working_dir: &Path) -> Result<Output>;
}

/// Environment every child process gets: no pager, no interactive prompts
const NON_INTERACTIVE_ENV: &[(&str, &str)] = &[
    ("AWS_PAGER", ""),
    ("TF_IN_AUTOMATION", "1"),
    ("TF_INPUT", "0"),
];

/// Spawns real processes
#[derive(Default)]
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, command: &str, args: &[&str], working_dir: &Path) -> Result<Output> {
        Command::new(command)
            .args(args)
            .envs(NON_INTERACTIVE_ENV.iter().copied())
            .current_dir(working_dir)
            .output()
            .with_context(|| format!("failed to start {} in {}", command, working_dir.display()))
    }
}

/// A canned result returned by [`MockCommandExecutor`]
#[derive(Clone, Debug)]
pub struct MockCommandResult {
    pub command: String,
    /// When set, the result only matches a call whose joined args contain it
    pub args_contain: Option<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl MockCommandResult {
    pub fn ok(command: &str, stdout: &str) -> Self {
        Self {
            command: command.to_string(),
            args_contain: None,
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failed(command: &str, exit_code: i32, stderr: &str) -> Self {
        Self {
            command: command.to_string(),
            args_contain: None,
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn when_args_contain(mut self, needle: &str) -> Self {
        self.args_contain = Some(needle.to_string());
        self
    }
}

/// Replays canned results; unmatched calls succeed with empty output
pub struct MockCommandExecutor {
    outputs: Mutex<Vec<MockCommandResult>>,
    /// Every call as `command arg1 arg2 ...`
    calls: Mutex<Vec<String>>,
}

impl MockCommandExecutor {
    pub fn new() -> Self {
        Self {
            outputs: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_outputs(outputs: Vec<MockCommandResult>) -> Self {
        Self {
            outputs: Mutex::new(outputs),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for MockCommandExecutor {
    fn execute(&self, command: &str, args: &[&str], _working_dir: &Path) -> Result<Output> {
        let joined = args.join(" ");
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", command, joined).trim_end().to_string());

        let mut outputs = self.outputs.lock().unwrap();
        let position = outputs.iter().position(|r| {
            r.command == command
                && r
                    .args_contain
                    .as_deref()
                    .is_none_or(|needle| joined.contains(needle))
        });

        if let Some(index) = position {
            let mock_result = outputs.remove(index);
            return Ok(Output {
                status: create_exit_status(mock_result.exit_code),
                stdout: mock_result.stdout.into_bytes(),
                stderr: mock_result.stderr.into_bytes(),
            });
        }

        Ok(Output {
            status: create_exit_status(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }
}

fn create_exit_status(code: i32) -> std::process::ExitStatus {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        // wait status: exit code in the high byte
        std::process::ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code as u32)
    }
}
