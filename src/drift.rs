//! Tracked vs orphaned.

use crate::declared_state::TrackedSet;
use crate::resource::ResourceDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftStatus {
    Tracked,
    Orphaned,
}

/// A resource is tracked when its native ID, ARN or name is in declared
/// state under the same resource type
pub fn classify(resource: &ResourceDescriptor, tracked: &TrackedSet) -> DriftStatus {
    let kind = resource.resource_type;
    let known = tracked.contains_identity(kind, &resource.native_id)
        || resource
            .arn
            .as_deref()
            .is_some_and(|arn| tracked.contains_identity(kind, arn))
        || tracked.contains_identity(kind, &resource.name);
    if known {
        DriftStatus::Tracked
    } else {
        DriftStatus::Orphaned
    }
}

/// Split discovered resources into `(tracked, orphaned)`, keeping order
pub fn partition(
    resources: &[ResourceDescriptor],
    tracked: &TrackedSet,
) -> (Vec<ResourceDescriptor>, Vec<ResourceDescriptor>) {
    resources
        .iter()
        .cloned()
        .partition(|r| classify(r, tracked) == DriftStatus::Tracked)
}
