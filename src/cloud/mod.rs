//! Seam between resource handlers and the cloud provider.
//!
//! Handlers describe each call as an [`AwsRequest`] and receive the JSON
//! response. The production [`AwsCliApi`] runs the `aws` CLI; tests script
//! responses instead.

pub mod aws_cli;
pub mod retrying;

pub use aws_cli::AwsCliApi;
pub use retrying::RetryingCloudApi;

use serde_json::Value;

use crate::error::EngineResult;

/// One provider API call: `aws <service> <operation> [args...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsRequest {
    pub service: String,
    pub operation: String,
    pub args: Vec<String>,
    /// Overrides the session region (CloudFront and IAM are global)
    pub region: Option<String>,
}

impl AwsRequest {
    pub fn new(service: &str, operation: &str) -> Self {
        Self {
            service: service.to_string(),
            operation: operation.to_string(),
            args: Vec::new(),
            region: None,
        }
    }

    /// Append `--name value`
    pub fn arg(mut self, name: &str, value: impl Into<String>) -> Self {
        self.args.push(format!("--{}", name));
        self.args.push(value.into());
        self
    }

    /// Append a bare `--name` switch
    pub fn flag(mut self, name: &str) -> Self {
        self.args.push(format!("--{}", name));
        self
    }

    pub fn in_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    /// Value following `--name`, if present
    pub fn value_of(&self, name: &str) -> Option<&str> {
        let flag = format!("--{}", name);
        self.args
            .iter()
            .position(|a| *a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(|s| s.as_str())
    }

    /// Read-only calls are safe during dry runs
    pub fn is_read_only(&self) -> bool {
        ["list-", "describe-", "get-", "batch-get-"]
            .iter()
            .any(|p| self.operation.starts_with(p))
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.service, self.operation)
    }
}

impl std::fmt::Display for AwsRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "aws {} {}", self.service, self.operation)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Anything that can answer an [`AwsRequest`]
pub trait CloudApi: Send + Sync {
    /// Issue the call; an empty response body is `Value::Null`
    fn call(&self, request: &AwsRequest) -> EngineResult<Value>;
}

/// Read `path` (a sequence of object keys) as an array, empty when missing
pub fn array_at<'a>(value: &'a Value, path: &[&str]) -> &'a [Value] {
    let mut current = value;
    for key in path {
        match current.get(key) {
            Some(next) => current = next,
            None => return &[],
        }
    }
    current.as_array().map(|a| a.as_slice()).unwrap_or(&[])
}

/// Read a string field
pub fn str_at<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}

/// EC2-style `[{"Key": .., "Value": ..}]` tag lists
pub fn ec2_tags(value: &Value) -> std::collections::HashMap<String, String> {
    array_at(value, &["Tags"])
        .iter()
        .filter_map(|t| Some((str_at(t, "Key")?.to_string(), str_at(t, "Value")?.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let req = AwsRequest::new("ec2", "describe-vpcs")
            .arg("vpc-ids", "vpc-1")
            .flag("no-paginate");
        assert_eq!(req.value_of("vpc-ids"), Some("vpc-1"));
        assert_eq!(req.value_of("missing"), None);
        assert!(req.is_read_only());
        assert_eq!(req.to_string(), "aws ec2 describe-vpcs --vpc-ids vpc-1 --no-paginate");
        assert!(!AwsRequest::new("ec2", "delete-vpc").is_read_only());
    }

    #[test]
    fn test_json_helpers() {
        let value = json!({"Vpcs": [{"VpcId": "vpc-1", "Tags": [{"Key": "Name", "Value": "x"}]}]});
        let vpcs = array_at(&value, &["Vpcs"]);
        assert_eq!(vpcs.len(), 1);
        assert_eq!(str_at(&vpcs[0], "VpcId"), Some("vpc-1"));
        assert_eq!(ec2_tags(&vpcs[0]).get("Name").map(|s| s.as_str()), Some("x"));
        assert!(array_at(&value, &["Nope", "Deeper"]).is_empty());
    }
}
