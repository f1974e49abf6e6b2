use super::{ignore_not_found, DeleteProgress, HandlerContext, ResourceHandler};
use crate::cloud::{array_at, str_at, AwsRequest};
use crate::error::{EngineResult, ErrorKind};
use crate::resource::{ResourceDescriptor, ResourceType};

/// Shortest waiting period KMS accepts
const PENDING_WINDOW_DAYS: u32 = 7;

/// Customer-managed keys found through their aliases. Keys are scheduled for
/// deletion rather than deleted.
pub struct KmsKeyHandler;

impl ResourceHandler for KmsKeyHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::KmsKey
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(AwsRequest::new("kms", "list-aliases"))?;
        let mut found = Vec::new();
        for alias in array_at(&response, &["Aliases"]) {
            let (Some(alias_name), Some(key_id)) =
                (str_at(alias, "AliasName"), str_at(alias, "TargetKeyId"))
            else {
                continue;
            };
            if alias_name.starts_with("alias/aws/") || !ctx.matches_name(alias_name) {
                continue;
            }

            let metadata = ctx.call(AwsRequest::new("kms", "describe-key").arg("key-id", key_id))?;
            let key = metadata.get("KeyMetadata");
            let state = key.and_then(|k| str_at(k, "KeyState")).unwrap_or("Unknown");
            let manager = key.and_then(|k| str_at(k, "KeyManager")).unwrap_or("CUSTOMER");
            if manager == "AWS" || state == "PendingDeletion" {
                continue;
            }

            let mut descriptor = ctx
                .descriptor(ResourceType::KmsKey, key_id)
                .with_name(alias_name)
                .with_attribute("alias", alias_name)
                .with_attribute("key_state", state);
            if let Some(arn) = key.and_then(|k| str_at(k, "Arn")) {
                descriptor = descriptor.with_arn(arn);
            }
            found.push(descriptor);
        }
        Ok(found)
    }

    fn delete(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<DeleteProgress> {
        if let Some(alias) = resource.attribute("alias") {
            ignore_not_found(ctx.call(AwsRequest::new("kms", "delete-alias").arg("alias-name", alias)))?;
        }

        let result = ctx.call(
            AwsRequest::new("kms", "schedule-key-deletion")
                .arg("key-id", &resource.native_id)
                .arg("pending-window-in-days", PENDING_WINDOW_DAYS.to_string()),
        );
        match result {
            Ok(_) => Ok(DeleteProgress::Done),
            Err(err) if err.is_not_found() => Ok(DeleteProgress::Done),
            // Already pending deletion
            Err(ErrorKind::Api { code: Some(code), .. }) if code == "KMSInvalidStateException" => {
                Ok(DeleteProgress::Done)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{handler_context, ScriptedCloud};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_discovery_skips_aws_managed_and_pending_keys() {
        let cloud = Arc::new(
            ScriptedCloud::new()
                .respond(
                    "kms",
                    "list-aliases",
                    json!({"Aliases": [
                        {"AliasName": "alias/proj-dev-main", "TargetKeyId": "k1"},
                        {"AliasName": "alias/proj-dev-old", "TargetKeyId": "k2"},
                        {"AliasName": "alias/aws/s3", "TargetKeyId": "k3"},
                        {"AliasName": "alias/proj-dev-unbound"}
                    ]}),
                )
                .on("kms", "describe-key", |req| {
                    let state = if req.value_of("key-id") == Some("k2") {
                        "PendingDeletion"
                    } else {
                        "Enabled"
                    };
                    Ok(json!({"KeyMetadata": {"KeyState": state, "KeyManager": "CUSTOMER", "Arn": "arn:aws:kms:us-east-1:1:key/k1"}}))
                }),
        );
        let found = KmsKeyHandler.discover(&handler_context(cloud)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].native_id, "k1");
        assert_eq!(found[0].attribute("alias"), Some("alias/proj-dev-main"));
    }

    #[test]
    fn test_delete_schedules_with_seven_day_window() {
        let cloud = Arc::new(ScriptedCloud::new());
        let ctx = handler_context(cloud.clone());
        let key = ctx
            .descriptor(ResourceType::KmsKey, "k1")
            .with_attribute("alias", "alias/proj-dev-main");
        KmsKeyHandler.delete(&ctx, &key).unwrap();

        let scheduled = cloud.calls_to("kms", "schedule-key-deletion");
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].value_of("pending-window-in-days"), Some("7"));
        assert_eq!(cloud.count("kms", "delete-alias"), 1);
    }

    #[test]
    fn test_already_pending_key_counts_as_done() {
        let cloud = Arc::new(ScriptedCloud::new().on("kms", "schedule-key-deletion", |_| {
            Err(ErrorKind::Api {
                code: Some("KMSInvalidStateException".into()),
                message: "pending deletion".into(),
            })
        }));
        let ctx = handler_context(cloud);
        let key = ctx.descriptor(ResourceType::KmsKey, "k1");
        assert_eq!(KmsKeyHandler.delete(&ctx, &key).unwrap(), DeleteProgress::Done);
    }
}
