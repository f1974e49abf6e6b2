pub mod executor;
pub mod terraform;

pub use executor::{DeclaredStateEntry, IacExecutor};
pub use terraform::TerraformCli;
