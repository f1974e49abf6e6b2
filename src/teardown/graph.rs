//! Teardown tasks and their dependency levels.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{EngineResult, ErrorKind};
use crate::handlers::HandlerRegistry;
use crate::resource::{ResourceDescriptor, ResourceKey, ResourceType, VpcPart};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InProgress,
    /// Delete accepted, provider still working on it.
    ///
    /// The blocking worker does the wait itself, so this state is recorded
    /// after the worker returns: the history shows the task went through an
    /// asynchronous wait, not that it is waiting right now.
    WaitingAsync,
    Completed,
    Failed(String),
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct TeardownTask {
    pub resource: ResourceDescriptor,
    pub depends_on: Vec<ResourceKey>,
    pub state: TaskState,
    pub attempt: u32,
    /// Every state the task passed through, oldest first
    pub history: Vec<TaskState>,
}

impl TeardownTask {
    pub fn new(resource: ResourceDescriptor, depends_on: Vec<ResourceKey>) -> Self {
        Self {
            resource,
            depends_on,
            state: TaskState::Pending,
            attempt: 0,
            history: vec![TaskState::Pending],
        }
    }

    pub fn key(&self) -> ResourceKey {
        self.resource.key()
    }

    pub fn transition(&mut self, state: TaskState) {
        self.history.push(state.clone());
        self.state = state;
    }
}

/// VPC-scoped resources only depend on resources in the same VPC
fn same_network(a: &ResourceDescriptor, b: &ResourceDescriptor) -> bool {
    let vpc_of = |r: &ResourceDescriptor| match r.resource_type {
        ResourceType::Vpc(VpcPart::Vpc) => Some(r.native_id.clone()),
        _ => r.attribute("vpc_id").map(str::to_string),
    };
    match (vpc_of(a), vpc_of(b)) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}

/// One task per resource, depending on every resource of a type its handler
/// waits for
pub fn build_tasks(
    resources: Vec<ResourceDescriptor>,
    registry: &dyn HandlerRegistry,
) -> EngineResult<Vec<TeardownTask>> {
    let mut tasks = Vec::with_capacity(resources.len());
    for resource in &resources {
        let handler = registry.get(resource.resource_type)?;
        let waits_for = handler.dependencies();
        let depends_on = resources
            .iter()
            .filter(|other| waits_for.contains(&other.resource_type))
            .filter(|other| same_network(resource, other))
            .map(|other| other.key())
            .collect();
        tasks.push(TeardownTask::new(resource.clone(), depends_on));
    }
    Ok(tasks)
}

/// Group tasks into levels; every dependency sits in an earlier level.
///
/// Dependencies on resources outside the task set are ignored.
pub fn levels(tasks: &[TeardownTask]) -> EngineResult<Vec<Vec<ResourceKey>>> {
    let edges: HashMap<ResourceKey, &[ResourceKey]> = tasks
        .iter()
        .map(|t| (t.key(), t.depends_on.as_slice()))
        .collect();

    let mut depth: HashMap<ResourceKey, usize> = HashMap::new();
    let mut visiting = HashSet::new();
    for task in tasks {
        level_of(&task.key(), &edges, &mut depth, &mut visiting)?;
    }

    let mut grouped: BTreeMap<usize, Vec<ResourceKey>> = BTreeMap::new();
    for task in tasks {
        grouped.entry(depth[&task.key()]).or_default().push(task.key());
    }
    Ok(grouped
        .into_values()
        .map(|mut keys| {
            keys.sort();
            keys
        })
        .collect())
}

fn level_of(
    key: &ResourceKey,
    edges: &HashMap<ResourceKey, &[ResourceKey]>,
    depth: &mut HashMap<ResourceKey, usize>,
    visiting: &mut HashSet<ResourceKey>,
) -> EngineResult<usize> {
    if let Some(d) = depth.get(key) {
        return Ok(*d);
    }
    if visiting.contains(key) {
        return Err(ErrorKind::Config(format!(
            "Circular teardown dependency detected involving: {}",
            key
        )));
    }
    visiting.insert(key.clone());

    let mut level = 0;
    for dep in edges.get(key).copied().unwrap_or_default() {
        if edges.contains_key(dep) {
            level = level.max(level_of(dep, edges, depth, visiting)? + 1);
        }
    }

    visiting.remove(key);
    depth.insert(key.clone(), level);
    Ok(level)
}
