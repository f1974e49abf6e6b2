//! Read-only enumeration of live resources across every handler.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::handlers::{HandlerContext, HandlerRegistry};
use crate::resource::{ResourceDescriptor, ResourceKey, ResourceType};

/// Everything discovery found, plus the types it could not list
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Deduplicated by key, sorted by key
    pub resources: Vec<ResourceDescriptor>,
    /// `(type, message)` for each type whose listing failed
    pub warnings: Vec<(ResourceType, String)>,
}

impl DiscoveryReport {
    pub fn count_by_type(&self) -> BTreeMap<ResourceType, usize> {
        let mut counts = BTreeMap::new();
        for resource in &self.resources {
            *counts.entry(resource.resource_type).or_insert(0) += 1;
        }
        counts
    }
}

/// Discover `types` with at most `concurrency` listings in flight.
///
/// Each worker returns its own partition; a failing type contributes a
/// warning and no resources.
pub async fn discover(
    registry: Arc<dyn HandlerRegistry>,
    ctx: HandlerContext,
    types: Vec<ResourceType>,
    concurrency: usize,
) -> DiscoveryReport {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::new();

    for resource_type in types {
        let permit = semaphore.clone().acquire_owned().await.ok();
        let registry = registry.clone();
        let ctx = ctx.clone();

        handles.push(tokio::spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || {
                let handler = registry.get(resource_type)?;
                handler.discover(&ctx)
            })
            .await
            .unwrap_or_else(|e| {
                Err(crate::error::ErrorKind::Api {
                    code: None,
                    message: format!("discovery task panicked: {}", e),
                })
            });
            drop(permit);
            (resource_type, outcome)
        }));
    }

    let mut merged: BTreeMap<ResourceKey, ResourceDescriptor> = BTreeMap::new();
    let mut warnings = Vec::new();
    for joined in join_all(handles).await {
        let Ok((resource_type, outcome)) = joined else {
            continue;
        };
        match outcome {
            Ok(found) => {
                for resource in found {
                    merged.entry(resource.key()).or_insert(resource);
                }
            }
            Err(err) => warnings.push((resource_type, err.to_string())),
        }
    }
    warnings.sort_by(|a, b| a.0.cmp(&b.0));

    DiscoveryReport {
        resources: merged.into_values().collect(),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::handlers::DefaultHandlerRegistry;
    use crate::test_helpers::{handler_context, ScriptedCloud};
    use serde_json::json;

    fn registry() -> Arc<dyn HandlerRegistry> {
        Arc::new(DefaultHandlerRegistry::with_defaults())
    }

    #[tokio::test]
    async fn test_failing_type_becomes_warning() {
        let cloud = Arc::new(
            ScriptedCloud::new()
                .respond("s3api", "list-buckets", json!({"Buckets": [{"Name": "proj-docs-dev"}]}))
                .on("lambda", "list-functions", |_| {
                    Err(ErrorKind::PermissionDenied("lambda:ListFunctions".into()))
                }),
        );
        let report = discover(
            registry(),
            handler_context(cloud),
            vec![ResourceType::S3Bucket, ResourceType::LambdaFunction],
            2,
        )
        .await;
        assert_eq!(report.resources.len(), 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].0, ResourceType::LambdaFunction);
    }

    #[tokio::test]
    async fn test_completeness_across_types() {
        let cloud = Arc::new(
            ScriptedCloud::new()
                .respond(
                    "s3api",
                    "list-buckets",
                    json!({"Buckets": [
                        {"Name": "proj-b-dev"}, {"Name": "proj-a-dev"}, {"Name": "unrelated"}
                    ]}),
                )
                .respond(
                    "logs",
                    "describe-log-groups",
                    json!({"logGroups": [
                        {"logGroupName": "/aws/lambda/proj-query-handler-dev", "arn": "arn:aws:logs:us-east-1:1:log-group:/aws/lambda/proj-query-handler-dev:*"}
                    ]}),
                )
                .respond(
                    "sns",
                    "list-topics",
                    json!({"Topics": [{"TopicArn": "arn:aws:sns:us-east-1:1:proj-alerts-dev"}]}),
                ),
        );
        for concurrency in [1, 8] {
            let report = discover(
                registry(),
                handler_context(cloud.clone()),
                ResourceType::all(),
                concurrency,
            )
            .await;
            assert_eq!(report.resources.len(), 4, "{:?}", report.warnings);
            assert!(report.warnings.is_empty());
            let keys: Vec<_> = report.resources.iter().map(|r| r.key()).collect();
            let mut sorted = keys.clone();
            sorted.sort();
            assert_eq!(keys, sorted);
            assert_eq!(report.count_by_type()[&ResourceType::S3Bucket], 2);
        }
    }

    #[tokio::test]
    async fn test_discovery_is_read_only() {
        let cloud = Arc::new(ScriptedCloud::new());
        discover(registry(), handler_context(cloud.clone()), ResourceType::all(), 4).await;
        assert!(cloud.mutating_calls().is_empty(), "{:?}", cloud.mutating_calls());
    }
}
