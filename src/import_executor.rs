//! Applies `Import` decisions through the IaC import primitive.

use std::collections::HashMap;

use crate::declared_state::TrackedSet;
use crate::error::{EngineResult, ErrorKind};
use crate::iac::{DeclaredStateEntry, IacExecutor};
use crate::planner::{Decision, PlannedResource};
use crate::resolver::is_valid_address;
use crate::session::{CleanupSession, ResourceOutcome};

/// Counts of what the import pass did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    pub imported: usize,
    pub unresolved: usize,
    pub planned: usize,
}

/// Import every resource whose decision is `Import`.
///
/// Per-resource failures become `Unresolved` and the pass continues; only
/// fatal errors (an IaC binary that cannot run) abort it.
pub fn execute_imports(
    iac: &dyn IacExecutor,
    planned: &[PlannedResource],
    tracked: &mut TrackedSet,
    session: &mut CleanupSession,
) -> EngineResult<ImportStats> {
    let mut stats = ImportStats::default();
    let mut claimed: HashMap<String, String> = HashMap::new();

    for item in planned {
        let Decision::Import(address) = &item.decision else {
            continue;
        };
        let resource = &item.resource;

        let rejection = if !is_valid_address(address) {
            Some(format!("'{}' is not a valid resource address", address))
        } else if tracked.contains_address(address) {
            Some(format!("{} is already managed in declared state", address))
        } else {
            claimed
                .get(address)
                .map(|other| format!("{} was already chosen for {}", address, other))
        };
        if let Some(reason) = rejection {
            session.record_outcome(resource, ResourceOutcome::Unresolved(reason));
            stats.unresolved += 1;
            continue;
        }
        claimed.insert(address.clone(), resource.display_string());

        if session.dry_run {
            session.record_outcome(resource, ResourceOutcome::WouldImport(address.clone()));
            stats.planned += 1;
            continue;
        }

        let import_id = resource.resource_type.import_id(&resource.native_id);
        session.action(&format!(
            "{} import {} {}",
            iac.get_name(),
            address,
            import_id
        ));
        match iac.import(address, &import_id) {
            Ok(()) => {
                tracked.insert(&DeclaredStateEntry::new(
                    address,
                    resource.resource_type.iac_type(),
                    Some(resource.resource_type),
                    Some(resource.native_id.clone()),
                ));
                session.record_outcome(resource, ResourceOutcome::Imported(address.clone()));
                stats.imported += 1;
            }
            Err(err @ ErrorKind::Config(_)) => return Err(err),
            Err(err) => {
                session.record_outcome(resource, ResourceOutcome::Unresolved(err.to_string()));
                stats.unresolved += 1;
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Confidence, Suggestion};
    use crate::resource::{PolicyKind, ResourceDescriptor, ResourceType};
    use crate::test_helpers::{test_scope, FakeIac};

    fn planned(resource_type: ResourceType, id: &str, address: &str) -> PlannedResource {
        PlannedResource {
            resource: ResourceDescriptor::new(resource_type, id, "us-east-1"),
            suggestion: Suggestion {
                address: address.to_string(),
                confidence: Confidence::Exact,
            },
            decision: Decision::Import(address.to_string()),
        }
    }

    #[test]
    fn test_imports_and_tracks() {
        let iac = FakeIac::new();
        let mut tracked = TrackedSet::default();
        let mut session = CleanupSession::in_memory("reconcile", test_scope(), false);
        let items = vec![
            planned(ResourceType::S3Bucket, "docs", "module.storage.aws_s3_bucket.documents"),
            planned(
                ResourceType::OpenSearchPolicy(PolicyKind::Network),
                "proj-net",
                "module.bedrock.aws_opensearchserverless_security_policy.network",
            ),
        ];
        let stats = execute_imports(&iac, &items, &mut tracked, &mut session).unwrap();
        assert_eq!(stats.imported, 2);
        assert!(tracked.contains_identity(ResourceType::S3Bucket, "docs"));
        assert_eq!(iac.imports()[1].1, "proj-net/network");
    }

    #[test]
    fn test_failure_is_unresolved_and_run_continues() {
        let iac = FakeIac::new().failing_import("aws_s3_bucket.a", "resource already managed");
        let mut tracked = TrackedSet::default();
        let mut session = CleanupSession::in_memory("reconcile", test_scope(), false);
        let items = vec![
            planned(ResourceType::S3Bucket, "a", "aws_s3_bucket.a"),
            planned(ResourceType::S3Bucket, "b", "aws_s3_bucket.b"),
        ];
        let stats = execute_imports(&iac, &items, &mut tracked, &mut session).unwrap();
        assert_eq!(stats, ImportStats { imported: 1, unresolved: 1, planned: 0 });
        match session.outcome(&items[0].resource.key()) {
            Some(ResourceOutcome::Unresolved(reason)) => assert!(reason.contains("already managed")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_and_managed_addresses_rejected() {
        let iac = FakeIac::new();
        let mut tracked = TrackedSet::from_entries(&[DeclaredStateEntry::new(
            "aws_s3_bucket.taken",
            "aws_s3_bucket",
            None,
            Some("other".into()),
        )]);
        let mut session = CleanupSession::in_memory("reconcile", test_scope(), false);
        let items = vec![
            planned(ResourceType::S3Bucket, "a", "aws_s3_bucket.taken"),
            planned(ResourceType::S3Bucket, "b", "aws_s3_bucket.docs"),
            planned(ResourceType::S3Bucket, "c", "aws_s3_bucket.docs"),
            planned(ResourceType::S3Bucket, "d", "bad address"),
        ];
        let stats = execute_imports(&iac, &items, &mut tracked, &mut session).unwrap();
        assert_eq!(stats.imported, 1);
        assert_eq!(stats.unresolved, 3);
        assert_eq!(iac.imports().len(), 1);
    }

    #[test]
    fn test_dry_run_never_calls_import() {
        let iac = FakeIac::new();
        let mut tracked = TrackedSet::default();
        let mut session = CleanupSession::in_memory("reconcile", test_scope(), true);
        let items = vec![planned(ResourceType::S3Bucket, "docs", "aws_s3_bucket.docs")];
        let stats = execute_imports(&iac, &items, &mut tracked, &mut session).unwrap();
        assert_eq!(stats.planned, 1);
        assert!(iac.imports().is_empty());
        assert!(session.log_lines().iter().any(|l| l.contains("[DRYRUN]")));
    }
}
