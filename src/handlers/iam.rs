use super::{ignore_not_found, DeleteProgress, HandlerContext, ResourceHandler};
use crate::cloud::{array_at, str_at, AwsRequest};
use crate::error::EngineResult;
use crate::resource::{ResourceDescriptor, ResourceType};

fn iam(operation: &str) -> AwsRequest {
    AwsRequest::new("iam", operation)
}

/// Roles lose their attached, inline and instance-profile links before deletion
pub struct RoleHandler;

impl RoleHandler {
    fn detach_everything(&self, ctx: &HandlerContext, role: &str) -> EngineResult<()> {
        let attached = ctx.call(iam("list-attached-role-policies").arg("role-name", role))?;
        for policy in array_at(&attached, &["AttachedPolicies"]) {
            if let Some(arn) = str_at(policy, "PolicyArn") {
                ignore_not_found(ctx.call(
                    iam("detach-role-policy")
                        .arg("role-name", role)
                        .arg("policy-arn", arn),
                ))?;
            }
        }

        let inline = ctx.call(iam("list-role-policies").arg("role-name", role))?;
        for name in array_at(&inline, &["PolicyNames"]).iter().filter_map(|n| n.as_str()) {
            ignore_not_found(ctx.call(
                iam("delete-role-policy")
                    .arg("role-name", role)
                    .arg("policy-name", name),
            ))?;
        }

        let profiles = ctx.call(iam("list-instance-profiles-for-role").arg("role-name", role))?;
        for profile in array_at(&profiles, &["InstanceProfiles"]) {
            if let Some(name) = str_at(profile, "InstanceProfileName") {
                ignore_not_found(ctx.call(
                    iam("remove-role-from-instance-profile")
                        .arg("instance-profile-name", name)
                        .arg("role-name", role),
                ))?;
            }
        }
        Ok(())
    }
}

impl ResourceHandler for RoleHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::IamRole
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(iam("list-roles"))?;
        Ok(array_at(&response, &["Roles"])
            .iter()
            .filter(|role| !str_at(role, "Path").unwrap_or("/").starts_with("/aws-service-role/"))
            .filter_map(|role| {
                let name = str_at(role, "RoleName")?;
                if !ctx.matches_name(name) {
                    return None;
                }
                let mut descriptor = ctx.descriptor(ResourceType::IamRole, name);
                if let Some(arn) = str_at(role, "Arn") {
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
        match self.detach_everything(ctx, &resource.native_id) {
            Ok(()) => {}
            Err(err) if err.is_not_found() => return Ok(DeleteProgress::Done),
            Err(err) => return Err(err),
        }
        ignore_not_found(ctx.call(iam("delete-role").arg("role-name", &resource.native_id)))?;
        Ok(DeleteProgress::Done)
    }

    fn diagnose_blockers(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<Vec<String>> {
        let attached = ctx.call(iam("list-attached-role-policies").arg("role-name", &resource.native_id))?;
        Ok(array_at(&attached, &["AttachedPolicies"])
            .iter()
            .filter_map(|p| str_at(p, "PolicyArn"))
            .map(|arn| format!("attached policy {}", arn))
            .collect())
    }
}

/// Customer-managed policies, keyed by ARN
pub struct PolicyHandler;

impl ResourceHandler for PolicyHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::IamPolicy
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(iam("list-policies").arg("scope", "Local"))?;
        Ok(array_at(&response, &["Policies"])
            .iter()
            .filter_map(|policy| {
                let name = str_at(policy, "PolicyName")?;
                let arn = str_at(policy, "Arn")?;
                ctx.matches_name(name).then(|| {
                    ctx.descriptor(ResourceType::IamPolicy, arn)
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
        let arn = resource.native_id.as_str();

        let entities = match ctx.call(iam("list-entities-for-policy").arg("policy-arn", arn)) {
            Ok(e) => e,
            Err(err) if err.is_not_found() => return Ok(DeleteProgress::Done),
            Err(err) => return Err(err),
        };
        let detachments = [
            ("PolicyRoles", "RoleName", "detach-role-policy", "role-name"),
            ("PolicyUsers", "UserName", "detach-user-policy", "user-name"),
            ("PolicyGroups", "GroupName", "detach-group-policy", "group-name"),
        ];
        for (section, field, operation, arg) in detachments {
            for entity in array_at(&entities, &[section]) {
                if let Some(name) = str_at(entity, field) {
                    ignore_not_found(ctx.call(iam(operation).arg(arg, name).arg("policy-arn", arn)))?;
                }
            }
        }

        let versions = ctx.call(iam("list-policy-versions").arg("policy-arn", arn))?;
        for version in array_at(&versions, &["Versions"]) {
            let is_default = version
                .get("IsDefaultVersion")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if is_default {
                continue;
            }
            if let Some(id) = str_at(version, "VersionId") {
                ignore_not_found(ctx.call(
                    iam("delete-policy-version")
                        .arg("policy-arn", arn)
                        .arg("version-id", id),
                ))?;
            }
        }

        ignore_not_found(ctx.call(iam("delete-policy").arg("policy-arn", arn)))?;
        Ok(DeleteProgress::Done)
    }
}
