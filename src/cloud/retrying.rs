use serde_json::Value;
use std::sync::Arc;

use super::{AwsRequest, CloudApi};
use crate::error::EngineResult;
use crate::retry::{retry_transient, RetryPolicy};

/// Retries throttling and other transient failures of every call
pub struct RetryingCloudApi {
    inner: Arc<dyn CloudApi>,
    policy: RetryPolicy,
}

impl RetryingCloudApi {
    pub fn new(inner: Arc<dyn CloudApi>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl CloudApi for RetryingCloudApi {
    fn call(&self, request: &AwsRequest) -> EngineResult<Value> {
        retry_transient(&self.policy, || self.inner.call(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_helpers::ScriptedCloud;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_transient_errors_are_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let cloud = Arc::new(ScriptedCloud::new().on("lambda", "list-functions", move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ErrorKind::Transient("Rate exceeded".into()))
            } else {
                Ok(json!({"Functions": []}))
            }
        }));
        let api = RetryingCloudApi::new(cloud.clone(), RetryPolicy::immediate(5));

        assert!(api.call(&AwsRequest::new("lambda", "list-functions")).is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(cloud.count("lambda", "list-functions"), 3);
    }
}
