//! OpenSearch Serverless collections and their data/network/encryption
//! policies.

use super::{ignore_not_found, DeleteProgress, HandlerContext, ResourceHandler};
use crate::cloud::{array_at, str_at, AwsRequest};
use crate::error::EngineResult;
use crate::resource::{PolicyKind, ResourceDescriptor, ResourceType};
use crate::retry::{poll_until, PollStatus};

const SERVICE: &str = "opensearchserverless";

pub struct CollectionHandler;

impl ResourceHandler for CollectionHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::OpenSearchCollection
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(AwsRequest::new(SERVICE, "list-collections"))?;
        Ok(array_at(&response, &["collectionSummaries"])
            .iter()
            .filter_map(|summary| {
                let id = str_at(summary, "id")?;
                let name = str_at(summary, "name")?;
                if !ctx.matches_name(name) || str_at(summary, "status") == Some("DELETING") {
                    return None;
                }
                let mut descriptor = ctx
                    .descriptor(ResourceType::OpenSearchCollection, id)
                    .with_name(name);
                if let Some(arn) = str_at(summary, "arn") {
                    descriptor = descriptor.with_arn(arn);
                }
                Some(descriptor)
            })
            .collect())
    }

    fn delete(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<DeleteProgress> {
        match ctx.call(AwsRequest::new(SERVICE, "delete-collection").arg("id", &resource.native_id)) {
            Ok(_) => Ok(DeleteProgress::Pending("collection deleting".to_string())),
            Err(err) if err.is_not_found() => Ok(DeleteProgress::Done),
            Err(err) => Err(err),
        }
    }

    fn wait_for_deletion(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<()> {
        let waiting_for = format!("collection {} to be deleted", resource.name);
        poll_until(&ctx.waits.opensearch, &waiting_for, |_| {
            let response = match ctx.call(
                AwsRequest::new(SERVICE, "batch-get-collection").arg("ids", &resource.native_id),
            ) {
                Ok(r) => r,
                Err(err) if err.is_not_found() => return Ok(PollStatus::Ready(())),
                Err(err) => return Err(err),
            };
            match array_at(&response, &["collectionDetails"]).first() {
                None => Ok(PollStatus::Ready(())),
                Some(detail) => Ok(PollStatus::Pending(
                    str_at(detail, "status").unwrap_or("UNKNOWN").to_string(),
                )),
            }
        })
    }
}

/// Handler for one policy flavour
pub struct PolicyHandler {
    kind: PolicyKind,
}

impl PolicyHandler {
    pub fn new(kind: PolicyKind) -> Self {
        Self { kind }
    }

    fn is_access_policy(&self) -> bool {
        self.kind == PolicyKind::Data
    }
}

impl ResourceHandler for PolicyHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::OpenSearchPolicy(self.kind)
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let (operation, section) = if self.is_access_policy() {
            ("list-access-policies", "accessPolicySummaries")
        } else {
            ("list-security-policies", "securityPolicySummaries")
        };
        let response = ctx.call(AwsRequest::new(SERVICE, operation).arg("type", self.kind.api_type()))?;

        Ok(array_at(&response, &[section])
            .iter()
            .filter_map(|summary| str_at(summary, "name"))
            .filter(|name| ctx.matches_name(name))
            .map(|name| {
                ctx.descriptor(self.resource_type(), name)
                    .with_attribute("policy_type", self.kind.api_type())
            })
            .collect())
    }

    fn delete(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<DeleteProgress> {
        let operation = if self.is_access_policy() {
            "delete-access-policy"
        } else {
            "delete-security-policy"
        };
        ignore_not_found(ctx.call(
            AwsRequest::new(SERVICE, operation)
                .arg("name", &resource.native_id)
                .arg("type", self.kind.api_type()),
        ))?;
        Ok(DeleteProgress::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_helpers::{handler_context, ScriptedCloud};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_policies_are_listed_per_type() {
        let cloud = Arc::new(
            ScriptedCloud::new()
                .on(SERVICE, "list-security-policies", |req| {
                    let name = format!("proj-dev-{}", req.value_of("type").unwrap_or_default());
                    Ok(json!({"securityPolicySummaries": [{"name": name}]}))
                })
                .respond(
                    SERVICE,
                    "list-access-policies",
                    json!({"accessPolicySummaries": [{"name": "proj-dev-data"}]}),
                ),
        );
        let ctx = handler_context(cloud);

        let network = PolicyHandler::new(PolicyKind::Network).discover(&ctx).unwrap();
        assert_eq!(network[0].native_id, "proj-dev-network");
        assert_eq!(
            network[0].resource_type,
            ResourceType::OpenSearchPolicy(PolicyKind::Network)
        );

        let data = PolicyHandler::new(PolicyKind::Data).discover(&ctx).unwrap();
        assert_eq!(data[0].native_id, "proj-dev-data");
    }

    #[test]
    fn test_collection_delete_waits_until_gone() {
        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        let cloud = Arc::new(ScriptedCloud::new().on(SERVICE, "batch-get-collection", move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(json!({"collectionDetails": [{"status": "DELETING"}]}))
            } else {
                Ok(json!({"collectionDetails": [], "collectionErrorDetails": [{"errorCode": "NOT_FOUND"}]}))
            }
        }));
        let ctx = handler_context(cloud.clone());
        let collection = ctx
            .descriptor(ResourceType::OpenSearchCollection, "abc123")
            .with_name("proj-dev-vectors");

        let progress = CollectionHandler.delete(&ctx, &collection).unwrap();
        assert!(matches!(progress, DeleteProgress::Pending(_)));
        CollectionHandler.wait_for_deletion(&ctx, &collection).unwrap();
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_collection_wait_times_out() {
        let cloud = Arc::new(ScriptedCloud::new().respond(
            SERVICE,
            "batch-get-collection",
            json!({"collectionDetails": [{"status": "DELETING"}]}),
        ));
        let ctx = handler_context(cloud);
        let collection = ctx.descriptor(ResourceType::OpenSearchCollection, "abc123");
        assert!(matches!(
            CollectionHandler.wait_for_deletion(&ctx, &collection),
            Err(ErrorKind::Timeout { .. })
        ));
    }
}
