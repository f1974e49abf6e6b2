//! Resource model shared by every stage of the pipeline

pub mod descriptor;
pub mod kind;

pub use descriptor::{DiscoveryScope, ResourceDescriptor, ResourceKey};
pub use kind::{PolicyKind, ResourceType, VpcPart};
