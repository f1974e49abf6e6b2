//! Declared state read through the `terraform`/`tofu` command line.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::executor::{DeclaredStateEntry, IacExecutor};
use crate::error::{EngineResult, ErrorKind};
use crate::resource::ResourceType;
use crate::traits::CommandExecutor;

/// State attributes that identify a live resource besides `id`
const ALIAS_ATTRIBUTES: &[&str] = &[
    "arn",
    "name",
    "bucket",
    "function_name",
    "layer_name",
    "alarm_name",
    "rule_name",
];

lazy_static! {
    /// `  arn = "arn:aws:s3:::bucket"` lines in `state show` output
    static ref STATE_SHOW_ATTRIBUTE: Regex =
        Regex::new(r#"^\s*([a-z_]+)\s*=\s*"([^"]*)"\s*$"#).expect("valid regex");
}

pub struct TerraformCli {
    command: Arc<dyn CommandExecutor>,
    binary: String,
    working_dir: PathBuf,
}

impl TerraformCli {
    pub fn new(command: Arc<dyn CommandExecutor>, binary: &str, working_dir: &Path) -> Self {
        Self {
            command,
            binary: binary.to_string(),
            working_dir: working_dir.to_path_buf(),
        }
    }

    /// Run the binary; `Err` only when it could not be started
    fn run(&self, args: &[&str]) -> EngineResult<std::process::Output> {
        self.command
            .execute(&self.binary, args, &self.working_dir)
            .map_err(|e| {
                ErrorKind::Config(format!(
                    "failed to run {} in {}: {}",
                    self.binary,
                    self.working_dir.display(),
                    e
                ))
            })
    }

    fn list_from_json(&self) -> Option<Vec<DeclaredStateEntry>> {
        let output = self.run(&["show", "-json", "-no-color"]).ok()?;
        if !output.status.success() {
            return None;
        }
        let state: Value = serde_json::from_slice(&output.stdout).ok()?;
        Some(parse_show_json(&state))
    }

    fn list_from_state_commands(&self) -> EngineResult<Vec<DeclaredStateEntry>> {
        let output = self.run(&["state", "list"])?;
        if !output.status.success() {
            return Err(ErrorKind::Config(format!(
                "{} state list failed: {}",
                self.binary,
                last_line(&output.stderr)
            )));
        }

        let mut entries = Vec::new();
        for address in String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with("data.") && !l.contains(".data."))
        {
            let shown = self.run(&["state", "show", "-no-color", address])?;
            let body = if shown.status.success() {
                String::from_utf8_lossy(&shown.stdout).to_string()
            } else {
                String::new()
            };
            entries.push(parse_state_show(address, &body));
        }
        Ok(entries)
    }
}

impl IacExecutor for TerraformCli {
    fn get_name(&self) -> &str {
        &self.binary
    }

    fn list_tracked(&self) -> EngineResult<Vec<DeclaredStateEntry>> {
        match self.list_from_json() {
            Some(entries) => Ok(entries),
            None => self.list_from_state_commands(),
        }
    }

    fn import(&self, address: &str, import_id: &str) -> EngineResult<()> {
        let output = self.run(&["import", "-input=false", "-no-color", address, import_id])?;
        if output.status.success() {
            return Ok(());
        }
        let mut message = last_line(&output.stderr);
        if message.is_empty() {
            message = last_line(&output.stdout);
        }
        Err(ErrorKind::ImportFailure {
            address: address.to_string(),
            message,
        })
    }
}

/// Last non-empty line, where the CLI puts its summary of the failure
fn last_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .unwrap_or_default()
        .trim_start_matches("Error: ")
        .to_string()
}

/// Type part of an address: `module.a.aws_s3_bucket.docs[0]` -> `aws_s3_bucket`
fn iac_type_of(address: &str) -> &str {
    let without_index = address.split('[').next().unwrap_or(address);
    without_index.rsplit('.').nth(1).unwrap_or_default()
}

fn entry_from_attributes<'a>(
    address: &str,
    iac_type: &str,
    lookup: impl Fn(&str) -> Option<&'a str>,
) -> DeclaredStateEntry {
    let resource_type = ResourceType::from_iac_type(iac_type, lookup("type"));
    let native_id = lookup("id").map(str::to_string);
    let mut entry = DeclaredStateEntry::new(address, iac_type, resource_type, native_id);
    for attribute in ALIAS_ATTRIBUTES {
        if let Some(value) = lookup(attribute) {
            entry = entry.with_alias(value);
        }
    }
    entry
}

/// Entries from `show -json`, walking child modules recursively
pub fn parse_show_json(state: &Value) -> Vec<DeclaredStateEntry> {
    let mut entries = Vec::new();
    if let Some(root) = state.get("values").and_then(|v| v.get("root_module")) {
        collect_module(root, &mut entries);
    }
    entries
}

fn collect_module(module: &Value, entries: &mut Vec<DeclaredStateEntry>) {
    if let Some(resources) = module.get("resources").and_then(|r| r.as_array()) {
        for resource in resources {
            if resource.get("mode").and_then(|m| m.as_str()) == Some("data") {
                continue;
            }
            let Some(address) = resource.get("address").and_then(|a| a.as_str()) else {
                continue;
            };
            let iac_type = resource
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or_else(|| iac_type_of(address));
            let values = resource.get("values");
            entries.push(entry_from_attributes(address, iac_type, |key| {
                values.and_then(|v| v.get(key)).and_then(|v| v.as_str())
            }));
        }
    }
    if let Some(children) = module.get("child_modules").and_then(|c| c.as_array()) {
        for child in children {
            collect_module(child, entries);
        }
    }
}

/// Entry from the human-readable `state show` output
pub fn parse_state_show(address: &str, body: &str) -> DeclaredStateEntry {
    let attributes: Vec<(String, String)> = body
        .lines()
        .filter_map(|line| {
            let captures = STATE_SHOW_ATTRIBUTE.captures(line)?;
            Some((captures[1].to_string(), captures[2].to_string()))
        })
        .collect();
    entry_from_attributes(address, iac_type_of(address), |key| {
        attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    })
}
