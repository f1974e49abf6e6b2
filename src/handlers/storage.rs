use serde_json::{json, Value};

use super::{ignore_not_found, DeleteProgress, HandlerContext, ResourceHandler};
use crate::cloud::{array_at, str_at, AwsRequest};
use crate::error::EngineResult;
use crate::resource::{ResourceDescriptor, ResourceType};

/// `delete-objects` accepts at most this many keys per call
const DELETE_BATCH: usize = 1000;

/// Passes over the bucket before giving up on emptying it
const MAX_EMPTY_PASSES: usize = 20;

pub struct S3BucketHandler;

impl S3BucketHandler {
    /// Delete every object version and delete marker in the bucket
    fn empty_bucket(&self, ctx: &HandlerContext, bucket: &str) -> EngineResult<usize> {
        let mut removed = 0;
        for _ in 0..MAX_EMPTY_PASSES {
            let listing = ctx.call(
                AwsRequest::new("s3api", "list-object-versions")
                    .arg("bucket", bucket)
                    .arg("max-items", DELETE_BATCH.to_string()),
            )?;
            let objects = object_identifiers(&listing);
            if objects.is_empty() {
                return Ok(removed);
            }

            for chunk in objects.chunks(DELETE_BATCH) {
                let payload = json!({"Objects": chunk, "Quiet": true});
                ctx.call(
                    AwsRequest::new("s3api", "delete-objects")
                        .arg("bucket", bucket)
                        .arg("delete", payload.to_string()),
                )?;
                removed += chunk.len();
            }
        }
        Ok(removed)
    }
}

/// `{Key, VersionId}` for versions and delete markers of a listing
fn object_identifiers(listing: &Value) -> Vec<Value> {
    ["Versions", "DeleteMarkers"]
        .iter()
        .flat_map(|section| array_at(listing, &[*section]).iter())
        .filter_map(|entry| {
            let key = str_at(entry, "Key")?;
            Some(match str_at(entry, "VersionId") {
                Some(version) => json!({"Key": key, "VersionId": version}),
                None => json!({"Key": key}),
            })
        })
        .collect()
}

impl ResourceHandler for S3BucketHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::S3Bucket
    }

    fn discover(&self, ctx: &HandlerContext) -> EngineResult<Vec<ResourceDescriptor>> {
        let response = ctx.call(AwsRequest::new("s3api", "list-buckets"))?;
        Ok(array_at(&response, &["Buckets"])
            .iter()
            .filter_map(|b| str_at(b, "Name"))
            .filter(|name| ctx.matches_name(name))
            .map(|name| {
                ctx.descriptor(ResourceType::S3Bucket, name)
                    .with_arn(format!("arn:aws:s3:::{}", name))
            })
            .collect())
    }

    fn delete(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<DeleteProgress> {
        match self.empty_bucket(ctx, &resource.native_id) {
            Ok(_) => {}
            Err(err) if err.is_not_found() => return Ok(DeleteProgress::Done),
            Err(err) => return Err(err),
        }
        ignore_not_found(ctx.call(
            AwsRequest::new("s3api", "delete-bucket").arg("bucket", &resource.native_id),
        ))?;
        Ok(DeleteProgress::Done)
    }

    fn diagnose_blockers(
        &self,
        ctx: &HandlerContext,
        resource: &ResourceDescriptor,
    ) -> EngineResult<Vec<String>> {
        let listing = ctx.call(
            AwsRequest::new("s3api", "list-object-versions")
                .arg("bucket", &resource.native_id)
                .arg("max-items", "10"),
        )?;
        let remaining = object_identifiers(&listing).len();
        if remaining == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![format!("{} object versions still in the bucket", remaining)])
    }
}
