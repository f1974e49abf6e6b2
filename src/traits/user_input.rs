use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::ErrorKind;

/// Scripted answer for [`MockUserInput`]
#[derive(Debug, Clone)]
pub enum MockResponse {
    Select(String),
    Text(String),
    /// Operator pressed Esc / Ctrl-C at the prompt
    Cancel,
}

/// Operator prompts used by the planner and the safety gate
pub trait UserInput: Send + Sync {
    /// Pick one of `options`; returns the chosen option verbatim
    fn select(&self, prompt: &str, options: Vec<String>) -> Result<String>;

    fn text(&self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Ask the operator to type `literal`; returns what was typed
    fn type_to_confirm(&self, literal: &str) -> Result<String>;
}

/// Terminal prompts through `inquire`
pub struct InquireUserInput;

/// Escape and Ctrl-C at a prompt become [`ErrorKind::UserCancellation`]
fn map_inquire_error(err: inquire::InquireError) -> anyhow::Error {
    match err {
        inquire::InquireError::OperationCanceled | inquire::InquireError::OperationInterrupted => {
            anyhow::Error::new(ErrorKind::UserCancellation)
        }
        other => anyhow::Error::new(other),
    }
}

impl UserInput for InquireUserInput {
    fn select(&self, prompt: &str, options: Vec<String>) -> Result<String> {
        inquire::Select::new(prompt, options)
            .with_page_size(6)
            .prompt()
            .map_err(map_inquire_error)
    }

    fn text(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut text_prompt = inquire::Text::new(prompt);
        if let Some(default_val) = default {
            text_prompt = text_prompt.with_default(default_val);
        }
        text_prompt.prompt().map_err(map_inquire_error)
    }

    fn type_to_confirm(&self, literal: &str) -> Result<String> {
        let prompt = format!("Type '{}' to confirm:", literal);
        inquire::Text::new(&prompt)
            .with_help_message("anything else aborts; Esc cancels")
            .prompt()
            .map_err(map_inquire_error)
    }
}

/// Replays scripted answers and records every prompt shown
pub struct MockUserInput {
    responses: Mutex<VecDeque<MockResponse>>,
    prompts: Mutex<Vec<String>>,
}

impl MockUserInput {
    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts shown so far, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_response(&self, prompt: &str) -> Result<MockResponse> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted answer for prompt '{}'", prompt))?;
        if let MockResponse::Cancel = response {
            return Err(anyhow::Error::new(ErrorKind::UserCancellation));
        }
        Ok(response)
    }

    fn next_text(&self, prompt: &str) -> Result<String> {
        match self.next_response(prompt)? {
            MockResponse::Text(answer) => Ok(answer),
            other => anyhow::bail!("expected a Text answer for '{}', got {:?}", prompt, other),
        }
    }
}

impl Default for MockUserInput {
    fn default() -> Self {
        Self::new()
    }
}

impl UserInput for MockUserInput {
    fn select(&self, prompt: &str, options: Vec<String>) -> Result<String> {
        match self.next_response(prompt)? {
            MockResponse::Select(answer) if options.contains(&answer) => Ok(answer),
            MockResponse::Select(answer) => {
                anyhow::bail!("'{}' is not one of the options {:?}", answer, options)
            }
            other => anyhow::bail!("expected a Select answer for '{}', got {:?}", prompt, other),
        }
    }

    fn text(&self, prompt: &str, _default: Option<&str>) -> Result<String> {
        self.next_text(prompt)
    }

    fn type_to_confirm(&self, literal: &str) -> Result<String> {
        self.next_text(&format!("Type '{}' to confirm:", literal))
    }
}
