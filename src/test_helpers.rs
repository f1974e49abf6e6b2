//! Fakes shared by unit tests: an in-memory cloud that records every call
//! and an IaC tool whose declared state lives in a vector.

#![cfg(test)]

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::cloud::{AwsRequest, CloudApi};
use crate::error::{EngineResult, ErrorKind};
use crate::handlers::{HandlerContext, WaitPolicies};
use crate::iac::{DeclaredStateEntry, IacExecutor};
use crate::resource::{DiscoveryScope, ResourceType};

type Responder = Box<dyn Fn(&AwsRequest) -> EngineResult<Value> + Send + Sync>;

/// Cloud API double keyed by `(service, operation)`.
///
/// Unscripted read-only calls answer `{}` (nothing found); unscripted
/// mutating calls succeed with an empty body.
pub struct ScriptedCloud {
    responders: HashMap<(String, String), Responder>,
    calls: Mutex<Vec<AwsRequest>>,
}

impl ScriptedCloud {
    pub fn new() -> Self {
        Self {
            responders: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on<F>(mut self, service: &str, operation: &str, responder: F) -> Self
    where
        F: Fn(&AwsRequest) -> EngineResult<Value> + Send + Sync + 'static,
    {
        self.responders.insert(
            (service.to_string(), operation.to_string()),
            Box::new(responder),
        );
        self
    }

    /// Always answer with the same body
    pub fn respond(self, service: &str, operation: &str, body: Value) -> Self {
        self.on(service, operation, move |_| Ok(body.clone()))
    }

    pub fn calls(&self) -> Vec<AwsRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, service: &str, operation: &str) -> Vec<AwsRequest> {
        self.calls()
            .into_iter()
            .filter(|c| c.service == service && c.operation == operation)
            .collect()
    }

    pub fn count(&self, service: &str, operation: &str) -> usize {
        self.calls_to(service, operation).len()
    }

    pub fn mutating_calls(&self) -> Vec<AwsRequest> {
        self.calls()
            .into_iter()
            .filter(|c| !c.is_read_only())
            .collect()
    }

    /// Operations in call order, as `service operation`
    pub fn operations(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.label()).collect()
    }
}

impl Default for ScriptedCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudApi for ScriptedCloud {
    fn call(&self, request: &AwsRequest) -> EngineResult<Value> {
        self.calls.lock().unwrap().push(request.clone());
        let key = (request.service.clone(), request.operation.clone());
        match self.responders.get(&key) {
            Some(responder) => responder(request),
            None if request.is_read_only() => Ok(json!({})),
            None => Ok(Value::Null),
        }
    }
}

/// Declared state held in memory; successful imports become tracked
pub struct FakeIac {
    entries: Mutex<Vec<DeclaredStateEntry>>,
    imports: Mutex<Vec<(String, String)>>,
    failures: HashMap<String, String>,
    unavailable: bool,
}

impl FakeIac {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            imports: Mutex::new(Vec::new()),
            failures: HashMap::new(),
            unavailable: false,
        }
    }

    pub fn with_entry(self, address: &str, resource_type: ResourceType, native_id: &str) -> Self {
        self.entries.lock().unwrap().push(DeclaredStateEntry::new(
            address,
            resource_type.iac_type(),
            Some(resource_type),
            Some(native_id.to_string()),
        ));
        self
    }

    pub fn failing_import(mut self, address: &str, message: &str) -> Self {
        self.failures.insert(address.to_string(), message.to_string());
        self
    }

    /// Backend that cannot be reached
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new()
        }
    }

    /// `(address, import id)` pairs passed to import, in order
    pub fn imports(&self) -> Vec<(String, String)> {
        self.imports.lock().unwrap().clone()
    }
}

impl Default for FakeIac {
    fn default() -> Self {
        Self::new()
    }
}

impl IacExecutor for FakeIac {
    fn get_name(&self) -> &str {
        "fake"
    }

    fn list_tracked(&self) -> EngineResult<Vec<DeclaredStateEntry>> {
        if self.unavailable {
            return Err(ErrorKind::Config("state backend unreachable".to_string()));
        }
        Ok(self.entries.lock().unwrap().clone())
    }

    fn import(&self, address: &str, import_id: &str) -> EngineResult<()> {
        self.imports
            .lock()
            .unwrap()
            .push((address.to_string(), import_id.to_string()));
        if let Some(message) = self.failures.get(address) {
            return Err(ErrorKind::ImportFailure {
                address: address.to_string(),
                message: message.clone(),
            });
        }
        let native_id = import_id.split('/').next().unwrap_or(import_id).to_string();
        let iac_type = address
            .rsplit('.')
            .nth(1)
            .unwrap_or_default()
            .to_string();
        self.entries.lock().unwrap().push(DeclaredStateEntry::new(
            address,
            &iac_type,
            ResourceType::from_iac_type(&iac_type, None),
            Some(native_id),
        ));
        Ok(())
    }
}

pub fn test_scope() -> DiscoveryScope {
    DiscoveryScope::new("proj", "dev", "us-east-1")
}

/// Handler context over `cloud` with non-sleeping waits
pub fn handler_context(cloud: Arc<ScriptedCloud>) -> HandlerContext {
    HandlerContext::new(cloud, test_scope(), WaitPolicies::immediate(3))
}

/// `describe-vpcs` body for `(id, Name tag)` pairs
pub fn vpcs_body(vpcs: &[(&str, &str)]) -> Value {
    json!({
        "Vpcs": vpcs
            .iter()
            .map(|(id, name)| json!({
                "VpcId": id,
                "IsDefault": false,
                "Tags": [{"Key": "Name", "Value": name}]
            }))
            .collect::<Vec<_>>()
    })
}
