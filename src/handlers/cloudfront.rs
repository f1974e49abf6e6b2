//! CloudFront distributions.
//!
//! A distribution can only be deleted once it is disabled and the disable
//! has finished deploying, so teardown walks an explicit phase machine:
//!
//! ```text
//! Enabled -> DisablingRequested -> WaitingDeployed -> Disabled -> DeletePending -> Deleted
//!                                        |                             |
//!                                        v                             v
//!                                      Failed                     DeleteFailed
//! ```

use serde_json::Value;
use std::collections::HashMap;

use super::{DeleteProgress, HandlerContext, ResourceHandler};
use crate::cloud::{array_at, str_at, AwsRequest};
use crate::error::{EngineResult, ErrorKind};
use crate::resource::{ResourceDescriptor, ResourceType};
use crate::retry::{poll_until, PollStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionPhase {
    Enabled,
    DisablingRequested,
    WaitingDeployed,
    Disabled,
    DeletePending,
    Deleted,
    DeleteFailed(String),
    Failed(String),
}

/// Drives a single distribution through [`DistributionPhase`]
pub struct DistributionTeardown<'a> {
    ctx: &'a HandlerContext,
    id: String,
    history: Vec<DistributionPhase>,
}

impl<'a> DistributionTeardown<'a> {
    pub fn new(ctx: &'a HandlerContext, id: &str) -> Self {
        Self {
            ctx,
            id: id.to_string(),
            history: Vec::new(),
        }
    }

    /// Resume a teardown whose disable was already requested
    pub fn resume_waiting(ctx: &'a HandlerContext, id: &str) -> Self {
        let mut teardown = Self::new(ctx, id);
        teardown.history.push(DistributionPhase::WaitingDeployed);
        teardown
    }

    pub fn phase(&self) -> Option<&DistributionPhase> {
        self.history.last()
    }

    pub fn history(&self) -> &[DistributionPhase] {
        &self.history
    }

    fn enter(&mut self, phase: DistributionPhase) {
        self.history.push(phase);
    }

    /// Current config and its ETag
    fn fetch_config(&self) -> EngineResult<(String, Value)> {
        let response = self.ctx.call(
            AwsRequest::new("cloudfront", "get-distribution-config")
                .arg("id", &self.id)
                .in_region("us-east-1"),
        )?;
        let etag = str_at(&response, "ETag")
            .ok_or_else(|| ErrorKind::Api {
                code: None,
                message: format!("distribution {} returned no ETag", self.id),
            })?
            .to_string();
        let config = response
            .get("DistributionConfig")
            .cloned()
            .unwrap_or(Value::Null);
        Ok((etag, config))
    }

    /// Disable the distribution if it is enabled, then enter `WaitingDeployed`
    pub fn request_disable(&mut self) -> EngineResult<()> {
        let (etag, mut config) = self.fetch_config()?;
        let enabled = config.get("Enabled").and_then(|v| v.as_bool()).unwrap_or(false);

        if enabled {
            self.enter(DistributionPhase::Enabled);
            config["Enabled"] = Value::Bool(false);
            self.ctx.call(
                AwsRequest::new("cloudfront", "update-distribution")
                    .arg("id", &self.id)
                    .arg("if-match", etag)
                    .arg("distribution-config", config.to_string())
                    .in_region("us-east-1"),
            )?;
            self.enter(DistributionPhase::DisablingRequested);
        }
        self.enter(DistributionPhase::WaitingDeployed);
        Ok(())
    }

    /// Poll until `Status=Deployed` and `Enabled=false`
    pub fn await_disabled(&mut self) -> EngineResult<()> {
        let ctx = self.ctx;
        let id = self.id.clone();
        let result = poll_until(
            &ctx.waits.cloudfront,
            &format!("distribution {} to finish disabling", id),
            |_| {
                let response = ctx.call(
                    AwsRequest::new("cloudfront", "get-distribution")
                        .arg("id", &id)
                        .in_region("us-east-1"),
                )?;
                let distribution = response.get("Distribution");
                let status = distribution
                    .and_then(|d| str_at(d, "Status"))
                    .unwrap_or("Unknown");
                let enabled = distribution
                    .and_then(|d| d.get("DistributionConfig"))
                    .and_then(|c| c.get("Enabled"))
                    .and_then(|v| v.as_bool())
                    .unwrap_or(true);
                if status == "Deployed" && !enabled {
                    Ok(PollStatus::Ready(()))
                } else {
                    Ok(PollStatus::Pending(format!("status {} enabled {}", status, enabled)))
                }
            },
        );

        match result {
            Ok(()) => {
                self.enter(DistributionPhase::Disabled);
                Ok(())
            }
            Err(err) => {
                self.enter(DistributionPhase::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Delete with a freshly fetched ETag; only valid after `Disabled`
    pub fn delete(&mut self) -> EngineResult<()> {
        if self.phase() != Some(&DistributionPhase::Disabled) {
            return Err(ErrorKind::DependencyConflict {
                resource: format!("distribution {}", self.id),
                blockers: vec!["distribution is not disabled and deployed".to_string()],
            });
        }
        self.enter(DistributionPhase::DeletePending);

        let result = self.fetch_config().and_then(|(etag, _)| {
            self.ctx.call(
                AwsRequest::new("cloudfront", "delete-distribution")
                    .arg("id", &self.id)
                    .arg("if-match", etag)
                    .in_region("us-east-1"),
            )
        });
        match result {
            Ok(_) => {
                self.enter(DistributionPhase::Deleted);
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                self.enter(DistributionPhase::Deleted);
                Ok(())
            }
            Err(err) => {
                self.enter(DistributionPhase::DeleteFailed(err.to_string()));
                Err(err)
            }
        }
    }
}

pub struct DistributionHandler;

impl ResourceHandler for DistributionHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::CloudFrontDistribution
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(
            AwsRequest::new("cloudfront", "list-distributions").in_region("us-east-1"),
        )?;
        let mut found = Vec::new();
        for item in array_at(&response, &["DistributionList", "Items"]) {
            let Some(id) = str_at(item, "Id") else {
                continue;
            };
            let comment = str_at(item, "Comment").unwrap_or_default();

            // Origin domains and aliases usually carry the bucket / stack name
            let mut labels = HashMap::new();
            for (i, origin) in array_at(item, &["Origins", "Items"]).iter().enumerate() {
                if let Some(domain) = str_at(origin, "DomainName") {
                    labels.insert(format!("origin{}", i), domain.to_string());
                }
            }
            for (i, alias) in array_at(item, &["Aliases", "Items"]).iter().enumerate() {
                if let Some(alias) = alias.as_str() {
                    labels.insert(format!("alias{}", i), alias.to_string());
                }
            }

            if !ctx.scope.matches(comment, id, &labels) {
                continue;
            }
            let name = if comment.is_empty() { id } else { comment };
            let mut descriptor = ctx
                .descriptor(ResourceType::CloudFrontDistribution, id)
                .with_name(name);
            if let Some(arn) = str_at(item, "ARN") {
                descriptor = descriptor.with_arn(arn);
            }
            if let Some(status) = str_at(item, "Status") {
                descriptor = descriptor.with_attribute("status", status);
            }
            if let Some(enabled) = item.get("Enabled").and_then(|v| v.as_bool()) {
                descriptor = descriptor.with_attribute("enabled", enabled.to_string());
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
        let mut teardown = DistributionTeardown::new(ctx, &resource.native_id);
        match teardown.request_disable() {
            Ok(()) => Ok(DeleteProgress::Pending("disable requested".to_string())),
            Err(err) if err.is_not_found() => Ok(DeleteProgress::Done),
            Err(err) => Err(err),
        }
    }

    fn wait_for_deletion(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<()> {
        let mut teardown = DistributionTeardown::resume_waiting(ctx, &resource.native_id);
        teardown.await_disabled()?;
        teardown.delete()
    }

    fn diagnose_blockers(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<Vec<String>> {
        let response = ctx.call(
            AwsRequest::new("cloudfront", "get-distribution")
                .arg("id", &resource.native_id)
                .in_region("us-east-1"),
        )?;
        let status = response
            .get("Distribution")
            .and_then(|d| str_at(d, "Status"))
            .unwrap_or("Unknown");
        Ok(vec![format!("distribution status is {}", status)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{handler_context, ScriptedCloud};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Fake distribution: disabling takes `deploy_polls` polls to deploy
    struct FakeDistribution {
        enabled: bool,
        polls_until_deployed: u32,
    }

    fn scripted(deploy_polls: u32) -> Arc<ScriptedCloud> {
        let state = Arc::new(Mutex::new(FakeDistribution {
            enabled: true,
            polls_until_deployed: deploy_polls,
        }));
        let config_state = state.clone();
        let update_state = state.clone();
        let poll_state = state;

        Arc::new(
            ScriptedCloud::new()
                .on("cloudfront", "get-distribution-config", move |_| {
                    let s = config_state.lock().unwrap();
                    Ok(json!({"ETag": if s.enabled { "E1" } else { "E2" },
                              "DistributionConfig": {"Enabled": s.enabled, "Comment": "proj-dev"}}))
                })
                .on("cloudfront", "update-distribution", move |req| {
                    assert_eq!(req.value_of("if-match"), Some("E1"));
                    assert!(req.value_of("distribution-config").unwrap().contains("\"Enabled\":false"));
                    update_state.lock().unwrap().enabled = false;
                    Ok(json!({"ETag": "E2"}))
                })
                .on("cloudfront", "get-distribution", move |_| {
                    let mut s = poll_state.lock().unwrap();
                    let status = if !s.enabled && s.polls_until_deployed == 0 {
                        "Deployed"
                    } else {
                        s.polls_until_deployed = s.polls_until_deployed.saturating_sub(1);
                        "InProgress"
                    };
                    Ok(json!({"Distribution": {"Status": status,
                              "DistributionConfig": {"Enabled": s.enabled}}}))
                })
                .on("cloudfront", "delete-distribution", |req| {
                    assert_eq!(req.value_of("if-match"), Some("E2"));
                    Ok(serde_json::Value::Null)
                }),
        )
    }

    #[test]
    fn test_disable_poll_then_delete() {
        let cloud = scripted(2);
        let ctx = handler_context(cloud.clone());
        let dist = ctx.descriptor(ResourceType::CloudFrontDistribution, "E123");

        let progress = DistributionHandler.delete(&ctx, &dist).unwrap();
        assert!(matches!(progress, DeleteProgress::Pending(_)));
        DistributionHandler.wait_for_deletion(&ctx, &dist).unwrap();

        assert_eq!(cloud.count("cloudfront", "update-distribution"), 1);
        assert_eq!(cloud.count("cloudfront", "get-distribution"), 3);
        assert_eq!(cloud.count("cloudfront", "delete-distribution"), 1);

        let ops = cloud.operations();
        let last_poll = ops.iter().rposition(|o| o == "cloudfront get-distribution").unwrap();
        let delete = ops.iter().position(|o| o == "cloudfront delete-distribution").unwrap();
        assert!(last_poll < delete);
    }

    #[test]
    fn test_poll_timeout_never_deletes() {
        // Never deploys within the three allowed polls
        let cloud = scripted(10);
        let ctx = handler_context(cloud.clone());

        let mut teardown = DistributionTeardown::new(&ctx, "E123");
        teardown.request_disable().unwrap();
        assert!(matches!(teardown.await_disabled(), Err(ErrorKind::Timeout { .. })));
        assert!(matches!(teardown.phase(), Some(DistributionPhase::Failed(_))));
        assert!(teardown.delete().is_err());

        assert_eq!(cloud.count("cloudfront", "update-distribution"), 1);
        assert_eq!(cloud.count("cloudfront", "delete-distribution"), 0);
    }

    #[test]
    fn test_phase_history() {
        let cloud = scripted(0);
        let ctx = handler_context(cloud);
        let mut teardown = DistributionTeardown::new(&ctx, "E123");
        teardown.request_disable().unwrap();
        teardown.await_disabled().unwrap();
        teardown.delete().unwrap();
        assert_eq!(
            teardown.history(),
            &[
                DistributionPhase::Enabled,
                DistributionPhase::DisablingRequested,
                DistributionPhase::WaitingDeployed,
                DistributionPhase::Disabled,
                DistributionPhase::DeletePending,
                DistributionPhase::Deleted,
            ]
        );
    }

    #[test]
    fn test_discover_matches_origin_domains() {
        let cloud = Arc::new(ScriptedCloud::new().respond(
            "cloudfront",
            "list-distributions",
            json!({"DistributionList": {"Items": [
                {"Id": "E1", "Comment": "", "Enabled": true, "Status": "Deployed",
                 "Origins": {"Items": [{"DomainName": "proj-frontend-dev.s3.amazonaws.com"}]}},
                {"Id": "E2", "Comment": "someone else", "Origins": {"Items": []}}
            ]}}),
        ));
        let found = DistributionHandler.discover(&handler_context(cloud)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].native_id, "E1");
        assert_eq!(found[0].region, "global");
        assert_eq!(found[0].attribute("enabled"), Some("true"));
    }
}
