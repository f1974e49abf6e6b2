use std::collections::HashMap;

use super::{ignore_not_found, DeleteProgress, HandlerContext, ResourceHandler};
use crate::cloud::{array_at, str_at, AwsRequest};
use crate::error::EngineResult;
use crate::resource::{ResourceDescriptor, ResourceType};

pub struct LambdaFunctionHandler;

impl ResourceHandler for LambdaFunctionHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::LambdaFunction
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(AwsRequest::new("lambda", "list-functions"))?;
        let mut found = Vec::new();
        for function in array_at(&response, &["Functions"]) {
            let Some(name) = str_at(function, "FunctionName") else {
                continue;
            };
            if !ctx.matches_name(name) {
                continue;
            }
            let mut descriptor = ctx.descriptor(ResourceType::LambdaFunction, name);
            if let Some(arn) = str_at(function, "FunctionArn") {
                descriptor = descriptor.with_arn(arn);
            }
            if let Some(vpc_id) = function
                .get("VpcConfig")
                .and_then(|v| str_at(v, "VpcId"))
                .filter(|v| !v.is_empty())
            {
                descriptor = descriptor.with_attribute("vpc_id", vpc_id);
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
        ignore_not_found(ctx.call(
            AwsRequest::new("lambda", "delete-function")
                .arg("function-name", &resource.native_id),
        ))?;
        Ok(DeleteProgress::Done)
    }
}

/// Layers are removed by deleting every published version
pub struct LambdaLayerHandler;

impl ResourceHandler for LambdaLayerHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::LambdaLayer
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(AwsRequest::new("lambda", "list-layers"))?;
        Ok(array_at(&response, &["Layers"])
            .iter()
            .filter_map(|layer| {
                let name = str_at(layer, "LayerName")?;
                if !ctx.matches_name(name) {
                    return None;
                }
                let mut descriptor = ctx.descriptor(ResourceType::LambdaLayer, name);
                if let Some(arn) = str_at(layer, "LayerArn") {
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
        let versions = match ctx.call(
            AwsRequest::new("lambda", "list-layer-versions").arg("layer-name", &resource.native_id),
        ) {
            Ok(v) => v,
            Err(err) if err.is_not_found() => return Ok(DeleteProgress::Done),
            Err(err) => return Err(err),
        };

        for version in array_at(&versions, &["LayerVersions"]) {
            let Some(number) = version.get("Version").and_then(|v| v.as_i64()) else {
                continue;
            };
            ignore_not_found(ctx.call(
                AwsRequest::new("lambda", "delete-layer-version")
                    .arg("layer-name", &resource.native_id)
                    .arg("version-number", number.to_string()),
            ))?;
        }
        Ok(DeleteProgress::Done)
    }
}

pub struct ApiGatewayHandler;

impl ResourceHandler for ApiGatewayHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::ApiGateway
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(AwsRequest::new("apigateway", "get-rest-apis"))?;
        let mut found = Vec::new();
        for api in array_at(&response, &["items"]) {
            let (Some(id), Some(name)) = (str_at(api, "id"), str_at(api, "name")) else {
                continue;
            };
            let tags: HashMap<String, String> = api
                .get("tags")
                .and_then(|t| t.as_object())
                .map(|map| {
                    map.iter()
                        .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                        .collect()
                })
                .unwrap_or_default();
            if ctx.scope.matches(name, id, &tags) {
                found.push(
                    ctx.descriptor(ResourceType::ApiGateway, id)
                        .with_name(name)
                        .with_tags(tags),
                );
            }
        }
        Ok(found)
    }

    fn delete(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<DeleteProgress> {
        ignore_not_found(ctx.call(
            AwsRequest::new("apigateway", "delete-rest-api").arg("rest-api-id", &resource.native_id),
        ))?;
        Ok(DeleteProgress::Done)
    }
}

/// User pools with a hosted UI domain must drop the domain first
pub struct CognitoUserPoolHandler;

impl ResourceHandler for CognitoUserPoolHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::CognitoUserPool
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(
            AwsRequest::new("cognito-idp", "list-user-pools").arg("max-results", "60"),
        )?;
        Ok(array_at(&response, &["UserPools"])
            .iter()
            .filter_map(|pool| {
                let id = str_at(pool, "Id")?;
                let name = str_at(pool, "Name")?;
                ctx.scope
                    .matches(name, id, &HashMap::new())
                    .then(|| ctx.descriptor(ResourceType::CognitoUserPool, id).with_name(name))
            })
            .collect())
    }

    fn delete(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<DeleteProgress> {
        let pool = match ctx.call(
            AwsRequest::new("cognito-idp", "describe-user-pool")
                .arg("user-pool-id", &resource.native_id),
        ) {
            Ok(pool) => pool,
            Err(err) if err.is_not_found() => return Ok(DeleteProgress::Done),
            Err(err) => return Err(err),
        };

        if let Some(domain) = pool
            .get("UserPool")
            .and_then(|p| str_at(p, "Domain"))
            .filter(|d| !d.is_empty())
        {
            ignore_not_found(ctx.call(
                AwsRequest::new("cognito-idp", "delete-user-pool-domain")
                    .arg("domain", domain)
                    .arg("user-pool-id", &resource.native_id),
            ))?;
        }

        ignore_not_found(ctx.call(
            AwsRequest::new("cognito-idp", "delete-user-pool")
                .arg("user-pool-id", &resource.native_id),
        ))?;
        Ok(DeleteProgress::Done)
    }
}
