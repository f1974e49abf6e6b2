use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use super::{AwsRequest, CloudApi};
use crate::error::{classify_aws_error, EngineResult, ErrorKind};
use crate::traits::CommandExecutor;

lazy_static! {
    /// `An error occurred (DependencyViolation) when calling the DeleteVpc operation: ...`
    static ref AWS_ERROR_CODE: Regex =
        Regex::new(r"An error occurred \(([A-Za-z0-9_.]+)\)").expect("valid regex");
}

/// Runs requests through the `aws` command line client
pub struct AwsCliApi {
    command: Arc<dyn CommandExecutor>,
    binary: String,
    region: String,
    working_dir: PathBuf,
}

impl AwsCliApi {
    pub fn new(command: Arc<dyn CommandExecutor>, region: &str) -> Self {
        Self {
            command,
            binary: "aws".to_string(),
            region: region.to_string(),
            working_dir: PathBuf::from("."),
        }
    }

    fn build_args(&self, request: &AwsRequest) -> Vec<String> {
        let mut args = vec![request.service.clone(), request.operation.clone()];
        args.extend(request.args.iter().cloned());
        args.push("--region".to_string());
        args.push(request.region.clone().unwrap_or_else(|| self.region.clone()));
        args.push("--output".to_string());
        args.push("json".to_string());
        args
    }
}

/// Pull the error code out of CLI stderr, when there is one
pub fn parse_error_code(stderr: &str) -> Option<String> {
    AWS_ERROR_CODE
        .captures(stderr)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

impl CloudApi for AwsCliApi {
    fn call(&self, request: &AwsRequest) -> EngineResult<Value> {
        let args = self.build_args(request);
        let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();

        let output = self
            .command
            .execute(&self.binary, &arg_refs, &self.working_dir)
            .map_err(|e| ErrorKind::Config(format!("failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim();
            let code = parse_error_code(message);
            let resource = request.label();
            return Err(match classify_aws_error(code.as_deref(), message, &resource) {
                ErrorKind::NotFound { resource_type, .. } => ErrorKind::NotFound {
                    resource_type,
                    resource_id: request.args.get(1).cloned().unwrap_or_default(),
                },
                other => other,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&stdout)?)
    }
}
