//! One handler per resource type: how to find it, what it waits for, how to
//! remove it and how to explain why removal is blocked.

pub mod bedrock;
pub mod cloudfront;
pub mod compute;
pub mod iam;
pub mod network;
pub mod observability;
pub mod opensearch;
pub mod security;
pub mod storage;

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::cloud::{AwsRequest, CloudApi};
use crate::config::RetryConfig;
use crate::error::{EngineResult, ErrorKind};
use crate::resource::{DiscoveryScope, PolicyKind, ResourceDescriptor, ResourceType, VpcPart};
use crate::retry::RetryPolicy;

/// Bounded waits used by the asynchronous deletions
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicies {
    pub cloudfront: RetryPolicy,
    pub eni: RetryPolicy,
    pub nat_gateway: RetryPolicy,
    pub opensearch: RetryPolicy,
}

impl WaitPolicies {
    pub fn from_config(retry: &RetryConfig) -> Self {
        Self {
            cloudfront: retry.cloudfront.to_policy(),
            eni: retry.eni.to_policy(),
            nat_gateway: retry.nat_gateway.to_policy(),
            opensearch: retry.opensearch.to_policy(),
        }
    }

    /// No sleeping between polls
    pub fn immediate(max_attempts: u32) -> Self {
        let policy = RetryPolicy::immediate(max_attempts);
        Self {
            cloudfront: policy,
            eni: policy,
            nat_gateway: policy,
            opensearch: policy,
        }
    }
}

/// What every handler call needs: the API, the run scope and wait policies
#[derive(Clone)]
pub struct HandlerContext {
    pub cloud: Arc<dyn CloudApi>,
    pub scope: DiscoveryScope,
    pub waits: WaitPolicies,
}

impl HandlerContext {
    pub fn new(cloud: Arc<dyn CloudApi>, scope: DiscoveryScope, waits: WaitPolicies) -> Self {
        Self {
            cloud,
            scope,
            waits,
        }
    }

    pub fn call(&self, request: AwsRequest) -> EngineResult<Value> {
        self.cloud.call(&request)
    }

    /// Region recorded on descriptors; global services use `global`
    pub fn region_for(&self, resource_type: ResourceType) -> String {
        if resource_type.is_global() {
            "global".to_string()
        } else {
            self.scope.region.clone()
        }
    }

    /// Descriptor for a resource of `resource_type` in this scope
    pub fn descriptor(&self, resource_type: ResourceType, native_id: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(resource_type, native_id, self.region_for(resource_type))
    }

    /// Name-only scope check for services that do not return tags in lists
    pub fn matches_name(&self, name: &str) -> bool {
        self.scope.matches(name, name, &HashMap::new())
    }
}

/// Result of issuing a delete call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteProgress {
    /// The resource is gone
    Done,
    /// Deletion was accepted and completes asynchronously
    Pending(String),
}

/// Discovery, dependencies and deletion for a single [`ResourceType`]
pub trait ResourceHandler: Send + Sync {
    fn resource_type(&self) -> ResourceType;

    /// Read-only enumeration of live resources in scope
    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>>;

    /// Issue the deletion
    fn delete(&self, ctx: &HandlerContext, resource: &ResourceDescriptor)
    -> EngineResult<DeleteProgress>;

    /// Block until a [`DeleteProgress::Pending`] deletion finishes
    fn wait_for_deletion(
        &self,
        _ctx: &HandlerContext,
        _resource: &ResourceDescriptor,
    ) -> EngineResult<()> {
        Ok(())
    }

    /// Live resources that keep this one from being deleted
    fn diagnose_blockers(
        &self,
        _ctx: &HandlerContext,
        _resource: &ResourceDescriptor,
    ) -> EngineResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// Types that must be gone before this one can be deleted
    fn dependencies(&self) -> &'static [ResourceType] {
        depends_on(self.resource_type())
    }
}

const VPC_DEPENDENCIES: &[ResourceType] = &[
    ResourceType::Vpc(VpcPart::Nat),
    ResourceType::Vpc(VpcPart::Eip),
    ResourceType::Vpc(VpcPart::Endpoint),
    ResourceType::Vpc(VpcPart::Eni),
    ResourceType::Vpc(VpcPart::SecurityGroup),
    ResourceType::Vpc(VpcPart::Igw),
    ResourceType::Vpc(VpcPart::Subnet),
    ResourceType::Vpc(VpcPart::RouteTable),
];
const EIP_DEPENDENCIES: &[ResourceType] = &[ResourceType::Vpc(VpcPart::Nat)];
const IGW_DEPENDENCIES: &[ResourceType] = &[
    ResourceType::Vpc(VpcPart::Nat),
    ResourceType::Vpc(VpcPart::Eip),
];
const SUBNET_DEPENDENCIES: &[ResourceType] = &[
    ResourceType::Vpc(VpcPart::Nat),
    ResourceType::Vpc(VpcPart::Eni),
    ResourceType::Vpc(VpcPart::Endpoint),
    ResourceType::LambdaFunction,
];
const ENI_DEPENDENCIES: &[ResourceType] = &[
    ResourceType::LambdaFunction,
    ResourceType::Vpc(VpcPart::Nat),
    ResourceType::Vpc(VpcPart::Endpoint),
];
const SECURITY_GROUP_DEPENDENCIES: &[ResourceType] = &[
    ResourceType::Vpc(VpcPart::Eni),
    ResourceType::LambdaFunction,
    ResourceType::Vpc(VpcPart::Endpoint),
];
const ROUTE_TABLE_DEPENDENCIES: &[ResourceType] = &[ResourceType::Vpc(VpcPart::Subnet)];
const LAMBDA_LAYER_DEPENDENCIES: &[ResourceType] = &[ResourceType::LambdaFunction];
const API_CONSUMER_DEPENDENCIES: &[ResourceType] = &[ResourceType::ApiGateway];
const LOG_GROUP_DEPENDENCIES: &[ResourceType] = &[ResourceType::LambdaFunction];
const COLLECTION_DEPENDENCIES: &[ResourceType] = &[ResourceType::BedrockKnowledgeBase];
const POLICY_DEPENDENCIES: &[ResourceType] = &[ResourceType::OpenSearchCollection];
const BUCKET_DEPENDENCIES: &[ResourceType] = &[
    ResourceType::CloudFrontDistribution,
    ResourceType::BedrockKnowledgeBase,
];
const ROLE_DEPENDENCIES: &[ResourceType] = &[
    ResourceType::LambdaFunction,
    ResourceType::BedrockKnowledgeBase,
];
const IAM_POLICY_DEPENDENCIES: &[ResourceType] = &[ResourceType::IamRole];
const KMS_DEPENDENCIES: &[ResourceType] = &[
    ResourceType::S3Bucket,
    ResourceType::OpenSearchCollection,
    ResourceType::LogGroup,
    ResourceType::SnsTopic,
    ResourceType::OpenSearchPolicy(PolicyKind::Encryption),
];
const TOPIC_DEPENDENCIES: &[ResourceType] = &[ResourceType::CloudWatchAlarm];

/// Static dependency table: a type waits until every listed type is gone
pub fn depends_on(resource_type: ResourceType) -> &'static [ResourceType] {
    match resource_type {
        ResourceType::Vpc(VpcPart::Vpc) => VPC_DEPENDENCIES,
        ResourceType::Vpc(VpcPart::Eip) => EIP_DEPENDENCIES,
        ResourceType::Vpc(VpcPart::Igw) => IGW_DEPENDENCIES,
        ResourceType::Vpc(VpcPart::Subnet) => SUBNET_DEPENDENCIES,
        ResourceType::Vpc(VpcPart::Eni) => ENI_DEPENDENCIES,
        ResourceType::Vpc(VpcPart::SecurityGroup) => SECURITY_GROUP_DEPENDENCIES,
        ResourceType::Vpc(VpcPart::RouteTable) => ROUTE_TABLE_DEPENDENCIES,
        ResourceType::LambdaLayer => LAMBDA_LAYER_DEPENDENCIES,
        ResourceType::LambdaFunction | ResourceType::CognitoUserPool => API_CONSUMER_DEPENDENCIES,
        ResourceType::LogGroup => LOG_GROUP_DEPENDENCIES,
        ResourceType::OpenSearchCollection => COLLECTION_DEPENDENCIES,
        ResourceType::OpenSearchPolicy(_) => POLICY_DEPENDENCIES,
        ResourceType::S3Bucket => BUCKET_DEPENDENCIES,
        ResourceType::IamRole => ROLE_DEPENDENCIES,
        ResourceType::IamPolicy => IAM_POLICY_DEPENDENCIES,
        ResourceType::KmsKey => KMS_DEPENDENCIES,
        ResourceType::SnsTopic => TOPIC_DEPENDENCIES,
        _ => &[],
    }
}

/// Treat "already gone" as a finished deletion
pub fn ignore_not_found(result: EngineResult<Value>) -> EngineResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(err),
    }
}

/// Registry of resource handlers keyed by type
pub trait HandlerRegistry: Send + Sync {
    fn register(&mut self, handler: Box<dyn ResourceHandler>);

    fn get(&self, resource_type: ResourceType) -> EngineResult<Arc<dyn ResourceHandler>>;

    fn has(&self, resource_type: ResourceType) -> bool;

    /// Registered types in [`ResourceType::all`] order
    fn list(&self) -> Vec<ResourceType>;
}

pub struct DefaultHandlerRegistry {
    handlers: RwLock<HashMap<ResourceType, Arc<dyn ResourceHandler>>>,
}

impl DefaultHandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with a handler for every [`ResourceType`]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(storage::S3BucketHandler));
        registry.register(Box::new(compute::LambdaFunctionHandler));
        registry.register(Box::new(compute::LambdaLayerHandler));
        registry.register(Box::new(compute::ApiGatewayHandler));
        registry.register(Box::new(compute::CognitoUserPoolHandler));
        registry.register(Box::new(observability::LogGroupHandler));
        registry.register(Box::new(observability::XRaySamplingRuleHandler));
        registry.register(Box::new(observability::SnsTopicHandler));
        registry.register(Box::new(observability::CloudWatchAlarmHandler));
        registry.register(Box::new(opensearch::CollectionHandler));
        for kind in [PolicyKind::Data, PolicyKind::Network, PolicyKind::Encryption] {
            registry.register(Box::new(opensearch::PolicyHandler::new(kind)));
        }
        registry.register(Box::new(cloudfront::DistributionHandler));
        registry.register(Box::new(iam::RoleHandler));
        registry.register(Box::new(iam::PolicyHandler));
        registry.register(Box::new(security::KmsKeyHandler));
        registry.register(Box::new(bedrock::KnowledgeBaseHandler));
        for part in [
            VpcPart::Vpc,
            VpcPart::Nat,
            VpcPart::Eip,
            VpcPart::Eni,
            VpcPart::SecurityGroup,
            VpcPart::Igw,
            VpcPart::Subnet,
            VpcPart::RouteTable,
            VpcPart::Endpoint,
        ] {
            registry.register(network::handler_for(part));
        }
        registry
    }
}

impl Default for DefaultHandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl HandlerRegistry for DefaultHandlerRegistry {
    fn register(&mut self, handler: Box<dyn ResourceHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.insert(handler.resource_type(), Arc::from(handler));
    }

    fn get(&self, resource_type: ResourceType) -> EngineResult<Arc<dyn ResourceHandler>> {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(&resource_type).cloned().ok_or_else(|| {
            ErrorKind::Unsupported(format!("no handler registered for {}", resource_type))
        })
    }

    fn has(&self, resource_type: ResourceType) -> bool {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.contains_key(&resource_type)
    }

    fn list(&self) -> Vec<ResourceType> {
        ResourceType::all()
            .into_iter()
            .filter(|t| self.has(*t))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_type_has_a_handler() {
        let registry = DefaultHandlerRegistry::with_defaults();
        for resource_type in ResourceType::all() {
            let handler = registry.get(resource_type).unwrap();
            assert_eq!(handler.resource_type(), resource_type);
        }
        assert_eq!(registry.list(), ResourceType::all());
    }

    #[test]
    fn test_vpc_waits_for_all_children() {
        let deps = depends_on(ResourceType::Vpc(VpcPart::Vpc));
        assert_eq!(deps.len(), 8);
        assert!(deps.contains(&ResourceType::Vpc(VpcPart::Eni)));
        assert!(depends_on(ResourceType::Vpc(VpcPart::Igw)).contains(&ResourceType::Vpc(VpcPart::Nat)));
        assert!(depends_on(ResourceType::XRaySamplingRule).is_empty());
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let registry = DefaultHandlerRegistry::new();
        assert!(matches!(
            registry.get(ResourceType::S3Bucket),
            Err(ErrorKind::Unsupported(_))
        ));
    }
}
