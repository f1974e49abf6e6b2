use std::sync::Mutex;

/// Per-resource result line printed during teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Deleted,
    WouldDelete,
    /// Delete accepted, completion is asynchronous
    Waiting,
    Blocked(String),
    Failed(String),
}

/// Output message captured by MockOutput for testing
#[derive(Debug, Clone, PartialEq)]
pub enum OutputMessage {
    Success(String),
    Error(String),
    Warning(String),
    Info(String),
    Section(String),
    Subsection(String),
    KeyValue(String, String),
    Dimmed(String),
    Table(Vec<String>, Vec<Vec<String>>),
    Environment { name: String, protected: bool },
    Progress { resource: String, progress: Progress },
    Blank,
}

/// Terminal output seam; commands and the teardown orchestrator print only
/// through this trait
pub trait Output: Send + Sync {
    fn success(&self, message: &str);

    fn error(&self, message: &str);

    fn warning(&self, message: &str);

    fn info(&self, message: &str);

    fn section(&self, title: &str);

    fn subsection(&self, title: &str);

    fn key_value(&self, key: &str, value: &str);

    fn dimmed(&self, message: &str);

    /// Rows under a header, columns padded to the widest cell
    fn table(&self, headers: &[&str], rows: &[Vec<String>]);

    fn blank(&self);

    /// The environment a run targets; protected names are highlighted
    fn environment_badge(&self, env_name: &str, protected: bool);

    /// One resource's teardown result
    fn progress(&self, resource: &str, progress: &Progress);
}

/// Colored terminal output through the `output` module
pub struct TerminalOutput;

impl Output for TerminalOutput {
    fn success(&self, message: &str) {
        crate::output::success(message);
    }

    fn error(&self, message: &str) {
        crate::output::error(message);
    }

    fn warning(&self, message: &str) {
        crate::output::warning(message);
    }

    fn info(&self, message: &str) {
        crate::output::info(message);
    }

    fn section(&self, title: &str) {
        crate::output::section(title);
    }

    fn subsection(&self, title: &str) {
        crate::output::subsection(title);
    }

    fn key_value(&self, key: &str, value: &str) {
        crate::output::key_value(key, value);
    }

    fn dimmed(&self, message: &str) {
        crate::output::dimmed(message);
    }

    fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        crate::output::table(headers, rows);
    }

    fn blank(&self) {
        crate::output::blank();
    }

    fn environment_badge(&self, env_name: &str, protected: bool) {
        crate::output::environment_badge(env_name, protected);
    }

    fn progress(&self, resource: &str, progress: &Progress) {
        crate::output::progress(resource, progress);
    }
}

/// Captures everything printed, for assertions
pub struct MockOutput {
    messages: Mutex<Vec<OutputMessage>>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, message: OutputMessage) {
        self.messages.lock().unwrap().push(message);
    }

    pub fn messages(&self) -> Vec<OutputMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| match m {
                OutputMessage::Warning(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    /// Progress lines printed for `resource`, in order
    pub fn progress_of(&self, resource: &str) -> Vec<Progress> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| match m {
                OutputMessage::Progress { resource: r, progress } if r == resource => {
                    Some(progress.clone())
                }
                _ => None,
            })
            .collect()
    }
}

impl Default for MockOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Output for MockOutput {
    fn success(&self, message: &str) {
        self.push(OutputMessage::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(OutputMessage::Error(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.push(OutputMessage::Warning(message.to_string()));
    }

    fn info(&self, message: &str) {
        self.push(OutputMessage::Info(message.to_string()));
    }

    fn section(&self, title: &str) {
        self.push(OutputMessage::Section(title.to_string()));
    }

    fn subsection(&self, title: &str) {
        self.push(OutputMessage::Subsection(title.to_string()));
    }

    fn key_value(&self, key: &str, value: &str) {
        self.push(OutputMessage::KeyValue(key.to_string(), value.to_string()));
    }

    fn dimmed(&self, message: &str) {
        self.push(OutputMessage::Dimmed(message.to_string()));
    }

    fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        self.push(OutputMessage::Table(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.to_vec(),
        ));
    }

    fn blank(&self) {
        self.push(OutputMessage::Blank);
    }

    fn environment_badge(&self, env_name: &str, protected: bool) {
        self.push(OutputMessage::Environment {
            name: env_name.to_string(),
            protected,
        });
    }

    fn progress(&self, resource: &str, progress: &Progress) {
        self.push(OutputMessage::Progress {
            resource: resource.to_string(),
            progress: progress.clone(),
        });
    }
}
