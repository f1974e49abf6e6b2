use crate::error::EngineResult;
use crate::resource::ResourceType;

/// One resource the IaC tool owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredStateEntry {
    /// Full address, e.g. `module.storage.aws_s3_bucket.documents`
    pub address: String,
    /// Terraform/OpenTofu type of the resource block
    pub iac_type: String,
    /// Engine type, when the IaC type is one the engine knows
    pub resource_type: Option<ResourceType>,
    /// Provider ID recorded in state (`id` attribute)
    pub native_id: Option<String>,
    /// Other identity attributes (ARN, name, bucket) that also count as tracked
    pub aliases: Vec<String>,
}

impl DeclaredStateEntry {
    pub fn new(
        address: &str,
        iac_type: &str,
        resource_type: Option<ResourceType>,
        native_id: Option<String>,
    ) -> Self {
        Self {
            address: address.to_string(),
            iac_type: iac_type.to_string(),
            resource_type,
            native_id,
            aliases: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        if !alias.is_empty() && Some(&alias) != self.native_id.as_ref() && !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
        self
    }

    /// Native ID followed by every alias
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.native_id
            .iter()
            .map(|s| s.as_str())
            .chain(self.aliases.iter().map(|s| s.as_str()))
    }
}

/// Trait for Infrastructure as Code executors (Terraform, OpenTofu)
pub trait IacExecutor: Send + Sync {
    /// Get the name of this executor (e.g., "terraform", "tofu")
    fn get_name(&self) -> &str;

    /// Every resource recorded in declared state.
    ///
    /// An unreachable backend or missing binary is a configuration error.
    fn list_tracked(&self) -> EngineResult<Vec<DeclaredStateEntry>>;

    /// Adopt the live resource `import_id` at `address`
    fn import(&self, address: &str, import_id: &str) -> EngineResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_skip_duplicates_and_native_id() {
        let entry = DeclaredStateEntry::new(
            "aws_s3_bucket.docs",
            "aws_s3_bucket",
            Some(ResourceType::S3Bucket),
            Some("proj-docs-dev".into()),
        )
        .with_alias("proj-docs-dev")
        .with_alias("arn:aws:s3:::proj-docs-dev")
        .with_alias("arn:aws:s3:::proj-docs-dev")
        .with_alias("");
        assert_eq!(entry.aliases, vec!["arn:aws:s3:::proj-docs-dev"]);
        assert_eq!(entry.identities().count(), 2);
    }
}
