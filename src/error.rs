use std::fmt;
use std::time::Duration;

/// Error types for discovery, reconciliation and teardown operations
#[derive(Debug)]
pub enum ErrorKind {
    /// Throttling or eventual consistency; safe to retry
    Transient(String),

    /// The resource does not exist (expected during teardown re-runs)
    NotFound {
        resource_type: String,
        resource_id: String,
    },

    /// Deletion blocked by resources that still reference this one
    DependencyConflict {
        resource: String,
        blockers: Vec<String>,
    },

    /// Input rejected by the safety gate; nothing was mutated
    SafetyViolation(String),

    /// IaC import primitive rejected the resource
    ImportFailure { address: String, message: String },

    /// Operator aborted the run
    UserCancellation,

    /// A bounded wait ran out of attempts or time
    Timeout { waiting_for: String, waited: Duration },

    /// Credentials lack permission for the call
    PermissionDenied(String),

    /// Service or operation not available in this region/account
    Unsupported(String),

    /// Any other provider API error
    Api {
        code: Option<String>,
        message: String,
    },

    /// Unrecoverable configuration problem (bad config, unreachable backend)
    Config(String),

    /// General I/O error
    Io(std::io::Error),
}

impl ErrorKind {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, ErrorKind::NotFound { .. })
    }

    /// Check if the call should be retried with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Transient(_))
    }

    /// Errors that abort the whole run instead of a single resource
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::SafetyViolation(_) | ErrorKind::UserCancellation | ErrorKind::Config(_)
        )
    }

    /// Short category label used in the run log
    pub fn category(&self) -> &'static str {
        match self {
            ErrorKind::Transient(_) => "transient",
            ErrorKind::NotFound { .. } => "not-found",
            ErrorKind::DependencyConflict { .. } => "dependency-conflict",
            ErrorKind::SafetyViolation(_) => "safety-violation",
            ErrorKind::ImportFailure { .. } => "import-failure",
            ErrorKind::UserCancellation => "cancelled",
            ErrorKind::Timeout { .. } => "timeout",
            ErrorKind::PermissionDenied(_) => "permission-denied",
            ErrorKind::Unsupported(_) => "unsupported",
            ErrorKind::Api { .. } => "api",
            ErrorKind::Config(_) => "config",
            ErrorKind::Io(_) => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transient(msg) => write!(f, "Transient error: {}", msg),
            ErrorKind::NotFound {
                resource_type,
                resource_id,
            } => write!(f, "Resource not found: {} '{}'", resource_type, resource_id),
            ErrorKind::DependencyConflict { resource, blockers } => {
                write!(f, "{} is still in use", resource)?;
                if !blockers.is_empty() {
                    write!(f, " (blocked by: {})", blockers.join(", "))?;
                }
                Ok(())
            }
            ErrorKind::SafetyViolation(msg) => write!(f, "Safety check failed: {}", msg),
            ErrorKind::ImportFailure { address, message } => {
                write!(f, "Import into '{}' failed: {}", address, message)
            }
            ErrorKind::UserCancellation => write!(f, "Cancelled by operator"),
            ErrorKind::Timeout {
                waiting_for,
                waited,
            } => write!(
                f,
                "Timed out waiting for {} after {}s",
                waiting_for,
                waited.as_secs()
            ),
            ErrorKind::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            ErrorKind::Unsupported(msg) => write!(f, "Not supported: {}", msg),
            ErrorKind::Api { code, message } => match code {
                Some(code) => write!(f, "AWS error ({}): {}", code, message),
                None => write!(f, "AWS error: {}", message),
            },
            ErrorKind::Config(msg) => write!(f, "Configuration error: {}", msg),
            ErrorKind::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for ErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ErrorKind::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ErrorKind {
    fn from(err: std::io::Error) -> Self {
        ErrorKind::Io(err)
    }
}

impl From<serde_json::Error> for ErrorKind {
    fn from(err: serde_json::Error) -> Self {
        ErrorKind::Api {
            code: None,
            message: format!("Unexpected response: {}", err),
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, ErrorKind>;

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchBucket",
    "NoSuchEntity",
    "NoSuchDistribution",
    "ResourceNotFoundException",
    "NotFoundException",
    "NotFound",
    "InvalidVpcID.NotFound",
    "InvalidSubnetID.NotFound",
    "InvalidGroup.NotFound",
    "InvalidNetworkInterfaceID.NotFound",
    "InvalidAllocationID.NotFound",
    "InvalidInternetGatewayID.NotFound",
    "InvalidRouteTableID.NotFound",
    "InvalidVpcEndpointId.NotFound",
    "NatGatewayNotFound",
    "InvalidRuleName",
];

/// Known AWS error codes for throttling and eventual consistency
const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "SlowDown",
    "ServiceUnavailable",
    "InternalError",
    "InternalFailure",
    "ConflictException",
    "OperationAborted",
    "PreconditionFailed",
];

/// Known AWS error codes for resources still in use
const DEPENDENCY_CODES: &[&str] = &[
    "DependencyViolation",
    "DeleteConflict",
    "BucketNotEmpty",
    "DistributionNotDisabled",
    "InvalidNetworkInterface.InUse",
    "ResourceInUseException",
    "InvalidIPAddress.InUse",
    "AuthFailure.InUse",
];

/// Known AWS error codes for missing permissions
const PERMISSION_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "AuthorizationError",
    "ExpiredToken",
    "InvalidClientTokenId",
];

/// Known AWS error codes for services or operations not available
const UNSUPPORTED_CODES: &[&str] = &[
    "UnrecognizedClientException",
    "InvalidAction",
    "OptInRequired",
    "SubscriptionRequiredException",
    "UnsupportedOperation",
];

/// Classify an AWS error using the error code, falling back to the message.
pub fn classify_aws_error(code: Option<&str>, message: &str, resource: &str) -> ErrorKind {
    if let Some(code) = code {
        if NOT_FOUND_CODES.contains(&code) || code.ends_with(".NotFound") {
            return ErrorKind::NotFound {
                resource_type: resource.to_string(),
                resource_id: String::new(),
            };
        }
        if TRANSIENT_CODES.contains(&code) {
            return ErrorKind::Transient(format!("{}: {}", code, message));
        }
        if DEPENDENCY_CODES.contains(&code) || code.ends_with(".InUse") {
            return ErrorKind::DependencyConflict {
                resource: resource.to_string(),
                blockers: Vec::new(),
            };
        }
        if PERMISSION_CODES.contains(&code) {
            return ErrorKind::PermissionDenied(message.to_string());
        }
        if UNSUPPORTED_CODES.contains(&code) {
            return ErrorKind::Unsupported(message.to_string());
        }
        return ErrorKind::Api {
            code: Some(code.to_string()),
            message: message.to_string(),
        };
    }

    let lower = message.to_lowercase();
    if lower.contains("could not connect to the endpoint") || lower.contains("timed out") {
        return ErrorKind::Transient(message.to_string());
    }
    if lower.contains("does not exist") || lower.contains("not found") {
        return ErrorKind::NotFound {
            resource_type: resource.to_string(),
            resource_id: String::new(),
        };
    }

    ErrorKind::Api {
        code: None,
        message: message.to_string(),
    }
}
