//! What the IaC tool already owns.

use std::collections::{HashMap, HashSet};

use crate::error::EngineResult;
use crate::iac::{DeclaredStateEntry, IacExecutor};
use crate::resource::{PolicyKind, ResourceType};

/// Identity keyed by the entry's resource type; `None` when the IaC type
/// has no counterpart in [`ResourceType`]
type TypedIdentity = (Option<ResourceType>, String);

/// Tracked identities and addresses read from declared state
#[derive(Debug, Clone, Default)]
pub struct TrackedSet {
    /// Native IDs plus alias identities (ARNs, names) of tracked resources
    identities: HashSet<TypedIdentity>,
    pub addresses: HashSet<String>,
    owners: HashMap<TypedIdentity, String>,
}

impl TrackedSet {
    pub fn from_entries(entries: &[DeclaredStateEntry]) -> Self {
        let mut set = Self::default();
        for entry in entries {
            set.insert(entry);
        }
        set
    }

    pub fn insert(&mut self, entry: &DeclaredStateEntry) {
        self.addresses.insert(entry.address.clone());
        for identity in entry.identities() {
            let key = (entry.resource_type.map(state_kind), identity.to_string());
            self.identities.insert(key.clone());
            self.owners.entry(key).or_insert_with(|| entry.address.clone());
        }
    }

    /// Whether `identity` is tracked for `resource_type`.
    ///
    /// Typed entries only match their own type. Untyped entries match any.
    pub fn contains_identity(&self, resource_type: ResourceType, identity: &str) -> bool {
        self.key_for(resource_type, identity).is_some()
    }

    fn key_for(&self, resource_type: ResourceType, identity: &str) -> Option<TypedIdentity> {
        [Some(state_kind(resource_type)), None]
            .into_iter()
            .map(|kind| (kind, identity.to_string()))
            .find(|key| self.identities.contains(key))
    }

    pub fn contains_address(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    /// Address that owns `identity` of `resource_type`, if tracked
    pub fn address_of(&self, resource_type: ResourceType, identity: &str) -> Option<&str> {
        let key = self.key_for(resource_type, identity)?;
        self.owners.get(&key).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Network and encryption policies share one IaC type and the state may
/// not say which one an entry is
fn state_kind(resource_type: ResourceType) -> ResourceType {
    match resource_type {
        ResourceType::OpenSearchPolicy(PolicyKind::Network) => {
            ResourceType::OpenSearchPolicy(PolicyKind::Encryption)
        }
        other => other,
    }
}

/// Read declared state through the IaC executor
pub fn inspect(iac: &dyn IacExecutor) -> EngineResult<TrackedSet> {
    let entries = iac.list_tracked()?;
    Ok(TrackedSet::from_entries(&entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::resource::VpcPart;
    use crate::test_helpers::FakeIac;

    #[test]
    fn test_inspect_collects_ids_and_addresses() {
        let iac = FakeIac::new()
            .with_entry("aws_vpc.main", ResourceType::Vpc(VpcPart::Vpc), "vpc-1")
            .with_entry("module.storage.aws_s3_bucket.documents", ResourceType::S3Bucket, "docs");
        let tracked = inspect(&iac).unwrap();
        assert_eq!(tracked.len(), 2);
        assert!(tracked.contains_identity(ResourceType::Vpc(VpcPart::Vpc), "vpc-1"));
        assert!(tracked.contains_address("module.storage.aws_s3_bucket.documents"));
        assert_eq!(
            tracked.address_of(ResourceType::S3Bucket, "docs"),
            Some("module.storage.aws_s3_bucket.documents")
        );
        assert_eq!(tracked.address_of(ResourceType::SnsTopic, "docs"), None);
    }

    #[test]
    fn test_aliases_are_tracked() {
        let entry = DeclaredStateEntry::new("aws_sns_topic.alerts", "aws_sns_topic", None, Some("arn:t".into()))
            .with_alias("alerts");
        let tracked = TrackedSet::from_entries(&[entry]);
        assert!(tracked.contains_identity(ResourceType::SnsTopic, "alerts"));
        assert!(tracked.contains_identity(ResourceType::LambdaFunction, "arn:t"));
    }

    #[test]
    fn test_typed_entries_match_only_their_type() {
        let role = DeclaredStateEntry::new(
            "module.lambda.aws_iam_role.query_handler",
            "aws_iam_role",
            Some(ResourceType::IamRole),
            Some("proj-query-handler-dev".into()),
        );
        let tracked = TrackedSet::from_entries(&[role]);
        assert!(tracked.contains_identity(ResourceType::IamRole, "proj-query-handler-dev"));
        assert!(!tracked.contains_identity(ResourceType::LambdaFunction, "proj-query-handler-dev"));
    }

    #[test]
    fn test_security_policy_without_kind_still_matches() {
        let entry = DeclaredStateEntry::new(
            "aws_opensearchserverless_security_policy.network",
            "aws_opensearchserverless_security_policy",
            ResourceType::from_iac_type("aws_opensearchserverless_security_policy", None),
            Some("proj-net".into()),
        );
        let tracked = TrackedSet::from_entries(&[entry]);
        assert!(tracked.contains_identity(ResourceType::OpenSearchPolicy(PolicyKind::Network), "proj-net"));
        assert!(!tracked.contains_identity(ResourceType::OpenSearchPolicy(PolicyKind::Data), "proj-net"));
    }

    #[test]
    fn test_unreachable_backend_is_fatal() {
        let err = inspect(&FakeIac::unavailable()).unwrap_err();
        assert!(matches!(err, ErrorKind::Config(_)));
        assert!(err.is_fatal());
    }
}
