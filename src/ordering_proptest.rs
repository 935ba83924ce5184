//! Property-based tests for dependency ordering.
//!
//! Random acyclic graphs are generated by only allowing a component to
//! depend on components with a lower index, then shuffling the names so
//! declaration order carries no hint.

#[cfg(test)]
mod proptest_tests {
    use std::collections::{BTreeMap, HashSet};

    use proptest::prelude::*;

    use crate::config::Component;
    use crate::ordering::dependency_order;

    /// Adjacency lists where node `i` only depends on nodes `< i`.
    fn acyclic_graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
        (1usize..24).prop_flat_map(|n| {
            (0..n)
                .map(|i| {
                    if i == 0 {
                        Just(Vec::new()).boxed()
                    } else {
                        proptest::collection::vec(0..i, 0..4).boxed()
                    }
                })
                .collect::<Vec<_>>()
        })
    }

    fn build(graph: &[Vec<usize>], names: &[String]) -> BTreeMap<String, Component> {
        graph
            .iter()
            .enumerate()
            .map(|(i, deps)| {
                let mut component = Component::new(&names[i], "https://example.com/x.git", "main");
                component.depends_on = deps.iter().map(|d| names[*d].clone()).collect();
                (names[i].clone(), component)
            })
            .collect()
    }

    fn transitive_deps(graph: &[Vec<usize>], node: usize, out: &mut HashSet<usize>) {
        for dep in &graph[node] {
            if out.insert(*dep) {
                transitive_deps(graph, *dep, out);
            }
        }
    }

    proptest! {
        /// Property: every component comes strictly after all of its
        /// transitive dependencies
        #[test]
        fn order_respects_transitive_dependencies(
            (graph, names) in acyclic_graph().prop_flat_map(|g| {
                let n = g.len();
                let names = Just((0..n).map(|i| format!("c{i:02}")).collect::<Vec<_>>()).prop_shuffle();
                (Just(g), names)
            })
        ) {
            let components = build(&graph, &names);
            let order = dependency_order(&components).unwrap();

            prop_assert_eq!(order.len(), graph.len());
            let position: BTreeMap<&str, usize> = order
                .iter()
                .enumerate()
                .map(|(i, name)| (name.as_str(), i))
                .collect();

            for node in 0..graph.len() {
                let mut deps = HashSet::new();
                transitive_deps(&graph, node, &mut deps);
                for dep in deps {
                    prop_assert!(
                        position[names[dep].as_str()] < position[names[node].as_str()],
                        "{} must precede {}",
                        names[dep],
                        names[node]
                    );
                }
            }
        }

        /// Property: the order is deterministic for a given graph
        #[test]
        fn order_is_deterministic(graph in acyclic_graph()) {
            let names: Vec<String> = (0..graph.len()).map(|i| format!("c{i:02}")).collect();
            let components = build(&graph, &names);
            prop_assert_eq!(
                dependency_order(&components).unwrap(),
                dependency_order(&components).unwrap()
            );
        }

        /// Property: closing any dependency chain back on itself is reported
        /// as a cycle
        #[test]
        fn back_edge_is_always_a_cycle(graph in acyclic_graph()) {
            prop_assume!(graph.len() >= 2);
            let names: Vec<String> = (0..graph.len()).map(|i| format!("c{i:02}")).collect();
            let mut components = build(&graph, &names);
            let last = names.last().unwrap().clone();
            // c00 -> last -> c00
            components.get_mut(&names[0]).unwrap().depends_on.push(last.clone());
            components.get_mut(&last).unwrap().depends_on.push(names[0].clone());

            let is_cycle = matches!(
                dependency_order(&components),
                Err(crate::error::Error::CycleDetected { .. })
            );
            prop_assert!(is_cycle);
        }
    }
}
