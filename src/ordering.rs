//! Dependency ordering of components.
//!
//! Produces a sequence in which every component appears after all of its
//! dependencies, so a component being converted always observes its
//! dependencies' post-conversion state.
//!
//! ## Process
//!
//! 1.  **Edge validation**: every `depends_on` entry must name a declared
//!     component.
//! 2.  **Kahn's algorithm**: components with no unprocessed dependencies are
//!     emitted one at a time. The ready set is ordered by name, so the result
//!     is deterministic for a given manifest.
//! 3.  **Cycle reporting**: if components remain once nothing is ready, a
//!     depth-first walk over the remainder extracts one concrete cycle for
//!     the error message.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::{Component, Manifest};
use crate::error::{Error, Result};

/// Order every component of a manifest, dependencies first.
pub fn resolve(manifest: &Manifest) -> Result<Vec<String>> {
    dependency_order(&manifest.components)
}

/// Order `components` so each one follows all of its dependencies.
pub fn dependency_order(components: &BTreeMap<String, Component>) -> Result<Vec<String>> {
    // name -> number of dependencies not yet emitted
    let mut remaining: BTreeMap<&str, usize> = BTreeMap::new();
    // dependency -> components that depend on it
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for (name, component) in components {
        let deps: BTreeSet<&str> = component.depends_on.iter().map(String::as_str).collect();
        for dep in &deps {
            if !components.contains_key(*dep) {
                return Err(Error::UnknownDependency {
                    component: name.clone(),
                    dependency: dep.to_string(),
                });
            }
            dependents.entry(*dep).or_default().push(name.as_str());
        }
        remaining.insert(name.as_str(), deps.len());
    }

    let mut ready: BTreeSet<&str> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(components.len());

    while let Some(name) = ready.pop_first() {
        remaining.remove(name);
        order.push(name.to_string());

        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(count) = remaining.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if !remaining.is_empty() {
        let stuck: BTreeSet<&str> = remaining.keys().copied().collect();
        return Err(Error::CycleDetected {
            cycle: find_cycle(components, &stuck).join(" -> "),
        });
    }

    Ok(order)
}

/// Find one dependency cycle among the `stuck` components.
///
/// Every stuck component either lies on a cycle or depends on one, so the
/// walk always terminates on a back edge.
fn find_cycle(components: &BTreeMap<String, Component>, stuck: &BTreeSet<&str>) -> Vec<String> {
    let mut path: Vec<&str> = Vec::new();
    let mut on_path: HashMap<&str, usize> = HashMap::new();

    let Some(mut current) = stuck.iter().next().copied() else {
        return Vec::new();
    };

    loop {
        if let Some(&start) = on_path.get(current) {
            let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
            cycle.push(current.to_string());
            return cycle;
        }
        on_path.insert(current, path.len());
        path.push(current);

        let next = components
            .get(current)
            .and_then(|c| {
                c.depends_on
                    .iter()
                    .map(String::as_str)
                    .filter(|d| stuck.contains(d))
                    .min()
            });

        match next {
            Some(dep) => current = dep,
            // Unreachable for a genuinely stuck set; report the path walked
            None => return path.iter().map(|s| s.to_string()).collect(),
        }
    }
}
