use super::{ignore_not_found, DeleteProgress, HandlerContext, ResourceHandler};
use crate::cloud::{array_at, str_at, AwsRequest};
use crate::error::EngineResult;
use crate::resource::{ResourceDescriptor, ResourceType};

/// Built-in rule present in every account
const DEFAULT_SAMPLING_RULE: &str = "Default";

pub struct LogGroupHandler;

impl ResourceHandler for LogGroupHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::LogGroup
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(AwsRequest::new("logs", "describe-log-groups"))?;
        Ok(array_at(&response, &["logGroups"])
            .iter()
            .filter_map(|group| {
                let name = str_at(group, "logGroupName")?;
                if !ctx.matches_name(name) {
                    return None;
                }
                let mut descriptor = ctx.descriptor(ResourceType::LogGroup, name);
                if let Some(arn) = str_at(group, "arn") {
                    descriptor = descriptor.with_arn(arn.trim_end_matches(":*"));
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
        ignore_not_found(ctx.call(
            AwsRequest::new("logs", "delete-log-group").arg("log-group-name", &resource.native_id),
        ))?;
        Ok(DeleteProgress::Done)
    }
}

pub struct XRaySamplingRuleHandler;

impl ResourceHandler for XRaySamplingRuleHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::XRaySamplingRule
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(AwsRequest::new("xray", "get-sampling-rules"))?;
        Ok(array_at(&response, &["SamplingRuleRecords"])
            .iter()
            .filter_map(|record| record.get("SamplingRule"))
            .filter_map(|rule| {
                let name = str_at(rule, "RuleName")?;
                if name == DEFAULT_SAMPLING_RULE || !ctx.matches_name(name) {
                    return None;
                }
                let mut descriptor = ctx.descriptor(ResourceType::XRaySamplingRule, name);
                if let Some(arn) = str_at(rule, "RuleARN") {
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
        ignore_not_found(ctx.call(
            AwsRequest::new("xray", "delete-sampling-rule").arg("rule-name", &resource.native_id),
        ))?;
        Ok(DeleteProgress::Done)
    }
}

/// Topics are identified by ARN; the name is the last ARN segment
pub struct SnsTopicHandler;

impl ResourceHandler for SnsTopicHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::SnsTopic
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(AwsRequest::new("sns", "list-topics"))?;
        Ok(array_at(&response, &["Topics"])
            .iter()
            .filter_map(|topic| {
                let arn = str_at(topic, "TopicArn")?;
                let name = arn.rsplit(':').next().unwrap_or(arn);
                ctx.matches_name(name).then(|| {
                    ctx.descriptor(ResourceType::SnsTopic, arn)
                        .with_name(name)
                        .with_arn(arn)
                })
            })
            .collect())
    }

    fn delete(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<DeleteProgress> {
        ignore_not_found(ctx.call(
            AwsRequest::new("sns", "delete-topic").arg("topic-arn", &resource.native_id),
        ))?;
        Ok(DeleteProgress::Done)
    }
}

pub struct CloudWatchAlarmHandler;

impl ResourceHandler for CloudWatchAlarmHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::CloudWatchAlarm
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(AwsRequest::new("cloudwatch", "describe-alarms"))?;
        Ok(["MetricAlarms", "CompositeAlarms"]
            .iter()
            .flat_map(|section| array_at(&response, &[*section]).iter())
            .filter_map(|alarm| {
                let name = str_at(alarm, "AlarmName")?;
                if !ctx.matches_name(name) {
                    return None;
                }
                let mut descriptor = ctx.descriptor(ResourceType::CloudWatchAlarm, name);
                if let Some(arn) = str_at(alarm, "AlarmArn") {
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
        ignore_not_found(ctx.call(
            AwsRequest::new("cloudwatch", "delete-alarms").arg("alarm-names", &resource.native_id),
        ))?;
        Ok(DeleteProgress::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{handler_context, ScriptedCloud};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_default_sampling_rule_is_never_discovered() {
        let cloud = Arc::new(ScriptedCloud::new().respond(
            "xray",
            "get-sampling-rules",
            json!({"SamplingRuleRecords": [
                {"SamplingRule": {"RuleName": "Default"}},
                {"SamplingRule": {"RuleName": "proj-dev-sampling", "RuleARN": "arn:aws:xray:us-east-1:1:sampling-rule/proj-dev-sampling"}}
            ]}),
        ));
        let found = XRaySamplingRuleHandler.discover(&handler_context(cloud)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].native_id, "proj-dev-sampling");
    }

    #[test]
    fn test_topic_is_keyed_by_arn() {
        let arn = "arn:aws:sns:us-east-1:123:proj-alerts-dev";
        let cloud = Arc::new(ScriptedCloud::new().respond(
            "sns",
            "list-topics",
            json!({"Topics": [{"TopicArn": arn}, {"TopicArn": "arn:aws:sns:us-east-1:123:other"}]}),
        ));
        let found = SnsTopicHandler.discover(&handler_context(cloud)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].native_id, arn);
        assert_eq!(found[0].name, "proj-alerts-dev");
    }

    #[test]
    fn test_log_group_arn_drops_wildcard_suffix() {
        let cloud = Arc::new(ScriptedCloud::new().respond(
            "logs",
            "describe-log-groups",
            json!({"logGroups": [{
                "logGroupName": "/aws/lambda/proj-query-handler-dev",
                "arn": "arn:aws:logs:us-east-1:1:log-group:/aws/lambda/proj-query-handler-dev:*"
            }]}),
        ));
        let found = LogGroupHandler.discover(&handler_context(cloud)).unwrap();
        assert_eq!(
            found[0].arn.as_deref(),
            Some("arn:aws:logs:us-east-1:1:log-group:/aws/lambda/proj-query-handler-dev")
        );
    }
}
