//! Tree-wide dependency life cycle.
//!
//! Each operation walks every leaf below a schema node, depth-first in
//! declaration order, and forwards to the leaf's dependencies.

use tracing::debug;

use crate::dependency::Dependency;
use crate::error::Result;
use crate::schema::{ControlSchema, GroupSchema};

/// Bind every dependency below `root`. Stops at the first configuration
/// error.
pub fn start_all(root: &GroupSchema) -> Result<()> {
    let mut bound = 0;
    for control in root.controls() {
        for dependency in control.dependencies() {
            dependency.bind()?;
            bound += 1;
        }
    }
    debug!(group = %root.name(), dependencies = bound, "dependency tracking started");
    Ok(())
}

/// Evaluate every dependency below `root` once with current values, without
/// touching subscriptions.
///
/// Resume catch-ups triggered while the pass runs count as part of it and do
/// not clear values either.
pub fn execute_all_once(root: &GroupSchema) -> Result<()> {
    let tree_root = root_of(root);
    tree_root.set_restoring(true);
    let result = root
        .controls()
        .iter()
        .flat_map(|control| control.dependencies())
        .try_for_each(|dependency| dependency.run_once());
    tree_root.set_restoring(false);
    debug!(group = %root.name(), ok = result.is_ok(), "dependencies executed once");
    result
}

/// Destroy every dependency below `root` and empty the dependency lists.
/// Safe to call any number of times.
pub fn destroy_all(root: &GroupSchema) {
    let mut destroyed = 0;
    for control in root.controls() {
        for dependency in control.take_dependencies() {
            dependency.destroy();
            destroyed += 1;
        }
    }
    debug!(group = %root.name(), dependencies = destroyed, "dependencies destroyed");
}

/// Unbind every dependency outside `scope` whose source lies inside it.
///
/// Used before `scope` leaves the tree. The returned dependencies are
/// `Unbound` and can be bound again against whatever the source name
/// resolves to afterwards.
pub fn detach_sources_in(root: &GroupSchema, scope: &GroupSchema) -> Vec<Dependency> {
    let inside = scope.controls();
    let contains = |control: &ControlSchema| inside.iter().any(|c| c.ptr_eq(control));
    let detached: Vec<Dependency> = root
        .controls()
        .iter()
        .filter(|control| !contains(*control))
        .flat_map(|control| control.dependencies())
        .filter(|dependency| dependency.source().is_some_and(|source| contains(&source)))
        .collect();
    for dependency in &detached {
        dependency.unbind();
    }
    debug!(group = %scope.name(), dependencies = detached.len(), "dependencies detached from sources");
    detached
}

fn root_of(group: &GroupSchema) -> GroupSchema {
    let mut current = group.clone();
    while let Some(parent) = current.parent() {
        current = parent;
    }
    current
}
