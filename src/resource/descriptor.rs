use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::kind::ResourceType;

/// Identity of a live resource: `(type, region, native id)` is unique
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub resource_type: ResourceType,
    pub region: String,
    pub native_id: String,
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.resource_type.as_str(), self.region, self.native_id)
    }
}

/// A live cloud resource found during discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub resource_type: ResourceType,
    /// Provider ID (bucket name, function name, vpc-..., distribution ID)
    pub native_id: String,
    /// Human-readable name (Name tag or the resource's own name)
    pub name: String,
    pub tags: HashMap<String, String>,
    pub region: String,
    pub arn: Option<String>,
    /// Type-specific facts gathered during discovery (vpc id, state, ...)
    pub attributes: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    pub fn new(
        resource_type: ResourceType,
        native_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        let native_id = native_id.into();
        Self {
            resource_type,
            name: native_id.clone(),
            native_id,
            tags: HashMap::new(),
            region: region.into(),
            arn: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = Some(arn.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            resource_type: self.resource_type,
            region: self.region.clone(),
            native_id: self.native_id.clone(),
        }
    }

    /// One-line label used in progress output and the run log
    pub fn display_string(&self) -> String {
        if self.name == self.native_id {
            format!("{} {}", self.resource_type.display_name(), self.native_id)
        } else {
            format!(
                "{} {} ({})",
                self.resource_type.display_name(),
                self.name,
                self.native_id
            )
        }
    }
}

/// The project prefix / environment / region a run is scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryScope {
    pub project_prefix: String,
    pub environment: String,
    pub region: String,
}

impl DiscoveryScope {
    pub fn new(
        project_prefix: impl Into<String>,
        environment: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            project_prefix: project_prefix.into(),
            environment: environment.into(),
            region: region.into(),
        }
    }

    /// Naming-convention filter: both the project prefix and the environment
    /// must occur (case-insensitively) in the name, the ARN/ID or a tag value.
    pub fn matches(&self, name: &str, id: &str, tags: &HashMap<String, String>) -> bool {
        let mut haystack = format!("{} {}", name, id);
        for value in tags.values() {
            haystack.push(' ');
            haystack.push_str(value);
        }
        let haystack = haystack.to_lowercase();

        haystack.contains(&self.project_prefix.to_lowercase())
            && haystack.contains(&self.environment.to_lowercase())
    }

    /// Conventional name `<prefix>-<env>` used by confirmation prompts
    pub fn stack_name(&self) -> String {
        format!("{}-{}", self.project_prefix, self.environment)
    }
}
