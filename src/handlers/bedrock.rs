use super::{ignore_not_found, DeleteProgress, HandlerContext, ResourceHandler};
use crate::cloud::{array_at, str_at, AwsRequest};
use crate::error::EngineResult;
use crate::resource::{ResourceDescriptor, ResourceType};
use crate::retry::{poll_until, PollStatus};

const SERVICE: &str = "bedrock-agent";

/// Knowledge bases drop their data sources first and delete asynchronously
pub struct KnowledgeBaseHandler;

impl ResourceHandler for KnowledgeBaseHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::BedrockKnowledgeBase
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(AwsRequest::new(SERVICE, "list-knowledge-bases"))?;
        Ok(array_at(&response, &["knowledgeBaseSummaries"])
            .iter()
            .filter_map(|kb| {
                let id = str_at(kb, "knowledgeBaseId")?;
                let name = str_at(kb, "name")?;
                if !ctx.matches_name(name) || str_at(kb, "status") == Some("DELETING") {
                    return None;
                }
                Some(
                    ctx.descriptor(ResourceType::BedrockKnowledgeBase, id)
                        .with_name(name),
                )
            })
            .collect())
    }

    fn delete(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<DeleteProgress> {
        let kb_id = resource.native_id.as_str();
        let sources = match ctx.call(
            AwsRequest::new(SERVICE, "list-data-sources").arg("knowledge-base-id", kb_id),
        ) {
            Ok(s) => s,
            Err(err) if err.is_not_found() => return Ok(DeleteProgress::Done),
            Err(err) => return Err(err),
        };
        for source in array_at(&sources, &["dataSourceSummaries"]) {
            if let Some(source_id) = str_at(source, "dataSourceId") {
                ignore_not_found(ctx.call(
                    AwsRequest::new(SERVICE, "delete-data-source")
                        .arg("knowledge-base-id", kb_id)
                        .arg("data-source-id", source_id),
                ))?;
            }
        }

        match ctx.call(AwsRequest::new(SERVICE, "delete-knowledge-base").arg("knowledge-base-id", kb_id)) {
            Ok(_) => Ok(DeleteProgress::Pending("knowledge base deleting".to_string())),
            Err(err) if err.is_not_found() => Ok(DeleteProgress::Done),
            Err(err) => Err(err),
        }
    }

    fn wait_for_deletion(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<()> {
        let waiting_for = format!("knowledge base {} to be deleted", resource.name);
        poll_until(&ctx.waits.opensearch, &waiting_for, |_| {
            match ctx.call(
                AwsRequest::new(SERVICE, "get-knowledge-base")
                    .arg("knowledge-base-id", &resource.native_id),
            ) {
                Ok(response) => Ok(PollStatus::Pending(
                    response
                        .get("knowledgeBase")
                        .and_then(|kb| str_at(kb, "status"))
                        .unwrap_or("UNKNOWN")
                        .to_string(),
                )),
                Err(err) if err.is_not_found() => Ok(PollStatus::Ready(())),
                Err(err) => Err(err),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_helpers::{handler_context, ScriptedCloud};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_data_sources_removed_then_wait_for_not_found() {
        let cloud = Arc::new(
            ScriptedCloud::new()
                .respond(
                    SERVICE,
                    "list-data-sources",
                    json!({"dataSourceSummaries": [{"dataSourceId": "ds1"}]}),
                )
                .on(SERVICE, "get-knowledge-base", |_| {
                    Err(ErrorKind::NotFound {
                        resource_type: "knowledge base".into(),
                        resource_id: "kb1".into(),
                    })
                }),
        );
        let ctx = handler_context(cloud.clone());
        let kb = ctx
            .descriptor(ResourceType::BedrockKnowledgeBase, "kb1")
            .with_name("proj-dev-kb");

        assert!(matches!(
            KnowledgeBaseHandler.delete(&ctx, &kb).unwrap(),
            DeleteProgress::Pending(_)
        ));
        KnowledgeBaseHandler.wait_for_deletion(&ctx, &kb).unwrap();
        assert_eq!(
            cloud.operations(),
            vec![
                "bedrock-agent list-data-sources",
                "bedrock-agent delete-data-source",
                "bedrock-agent delete-knowledge-base",
                "bedrock-agent get-knowledge-base",
            ]
        );
    }
}
