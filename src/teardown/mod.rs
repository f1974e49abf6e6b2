pub mod graph;
pub mod orchestrator;

pub use graph::{build_tasks, levels, TaskState, TeardownTask};
pub use orchestrator::{run_teardown, TeardownOptions, TeardownReport};
