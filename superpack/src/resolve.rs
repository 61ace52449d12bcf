//! Dependency expansion for pack requests.
//!
//! A request for one pack must first mount everything it transitively
//! depends on. [`collect_downloadable_dependencies`] flattens that graph into
//! an acquisition order in which every dependency precedes the packs that
//! need it.

use std::collections::HashMap;

use thiserror::Error;

use crate::index::{Pack, PackIndex};

/// Result type for dependency resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors raised while expanding dependencies.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// A pack (or one of its dependencies) is not in the index.
    #[error("unknown pack {name}{}", required_by.as_ref().map(|p| format!(" (required by {})", p)).unwrap_or_default())]
    UnknownPack {
        name: String,
        required_by: Option<String>,
    },

    /// The dependency graph loops back on itself.
    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Collect the not-yet-mounted transitive dependencies of `pack_name`.
///
/// The result is in topological order (dependencies first), contains no
/// duplicates and excludes `pack_name` itself. Packs already mounted are
/// skipped together with their own dependencies. The walk keeps its own
/// stack, so chain depth is bounded by memory rather than the thread stack.
///
/// # Errors
///
/// [`ResolveError::UnknownPack`] if `pack_name` or any dependency is missing
/// from the index, [`ResolveError::Cycle`] if the graph reachable from
/// `pack_name` contains a cycle.
pub fn collect_downloadable_dependencies(
    index: &PackIndex,
    pack_name: &str,
) -> ResolveResult<Vec<String>> {
    let root = index.get(pack_name).ok_or_else(|| ResolveError::UnknownPack {
        name: pack_name.to_string(),
        required_by: None,
    })?;

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut order = Vec::new();
    // Each frame is a pack on the current path and its next dependency.
    let mut stack: Vec<(&Pack, usize)> = vec![(root, 0)];
    marks.insert(root.name.as_str(), Mark::Visiting);

    while let Some(frame) = stack.last_mut() {
        let pack = frame.0;
        let position = frame.1;
        frame.1 += 1;

        let Some(dependency) = pack.dependencies.get(position) else {
            stack.pop();
            marks.insert(pack.name.as_str(), Mark::Done);
            order.push(pack.name.clone());
            continue;
        };

        let next = index
            .get(dependency)
            .ok_or_else(|| ResolveError::UnknownPack {
                name: dependency.clone(),
                required_by: Some(pack.name.clone()),
            })?;
        // Mounted packs need no download, and neither do their dependencies.
        if next.is_mounted() {
            continue;
        }

        match marks.get(next.name.as_str()) {
            Some(Mark::Done) => continue,
            Some(Mark::Visiting) => {
                let start = stack
                    .iter()
                    .position(|(p, _)| p.name == next.name)
                    .unwrap_or(0);
                let mut path: Vec<String> =
                    stack[start..].iter().map(|(p, _)| p.name.clone()).collect();
                path.push(next.name.clone());
                return Err(ResolveError::Cycle { path });
            }
            None => {}
        }

        marks.insert(next.name.as_str(), Mark::Visiting);
        stack.push((next, 0));
    }

    // The root is emitted last; it is not its own dependency.
    order.pop();
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PackState;
    use proptest::prelude::*;

    fn index(packs: Vec<Pack>) -> PackIndex {
        let mut index = PackIndex::new();
        for pack in packs {
            index.insert(pack).unwrap();
        }
        index
    }

    #[test]
    fn test_no_dependencies() {
        let index = index(vec![Pack::new("root", 1)]);
        assert!(collect_downloadable_dependencies(&index, "root")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_chain_is_reversed() {
        let index = index(vec![
            Pack::new("root", 1).with_dependencies(["mid"]),
            Pack::new("mid", 1).with_dependencies(["leaf"]),
            Pack::new("leaf", 1),
        ]);

        assert_eq!(
            collect_downloadable_dependencies(&index, "root").unwrap(),
            vec!["leaf", "mid"]
        );
    }

    #[test]
    fn test_diamond_has_no_duplicates() {
        let index = index(vec![
            Pack::new("root", 1).with_dependencies(["left", "right"]),
            Pack::new("left", 1).with_dependencies(["base"]),
            Pack::new("right", 1).with_dependencies(["base"]),
            Pack::new("base", 1),
        ]);

        assert_eq!(
            collect_downloadable_dependencies(&index, "root").unwrap(),
            vec!["base", "left", "right"]
        );
    }

    #[test]
    fn test_mounted_subtree_is_skipped() {
        let mut index = index(vec![
            Pack::new("root", 1).with_dependencies(["mounted", "fresh"]),
            Pack::new("mounted", 1).with_dependencies(["deep"]),
            Pack::new("deep", 1),
            Pack::new("fresh", 1),
        ]);
        index.get_mut("mounted").unwrap().state = PackState::Mounted;

        assert_eq!(
            collect_downloadable_dependencies(&index, "root").unwrap(),
            vec!["fresh"]
        );
    }

    #[test]
    fn test_cycle_detected() {
        let index = index(vec![
            Pack::new("root", 1).with_dependencies(["a"]),
            Pack::new("a", 1).with_dependencies(["b"]),
            Pack::new("b", 1).with_dependencies(["a"]),
        ]);

        let err = collect_downloadable_dependencies(&index, "root").unwrap_err();
        assert_eq!(
            err,
            ResolveError::Cycle {
                path: vec!["a".to_string(), "b".to_string(), "a".to_string()]
            }
        );
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let index = index(vec![Pack::new("root", 1).with_dependencies(["root"])]);

        assert!(matches!(
            collect_downloadable_dependencies(&index, "root"),
            Err(ResolveError::Cycle { .. })
        ));
    }

    #[test]
    fn test_unknown_packs() {
        let index = index(vec![Pack::new("root", 1).with_dependencies(["ghost"])]);

        assert_eq!(
            collect_downloadable_dependencies(&index, "root"),
            Err(ResolveError::UnknownPack {
                name: "ghost".to_string(),
                required_by: Some("root".to_string()),
            })
        );
        assert_eq!(
            collect_downloadable_dependencies(&index, "nope")
                .unwrap_err()
                .to_string(),
            "unknown pack nope"
        );
    }

    #[test]
    fn test_deep_chain() {
        const DEPTH: usize = 100_000;
        let index = index(
            (0..DEPTH)
                .map(|i| {
                    let pack = Pack::new(format!("p{}", i), 1);
                    if i + 1 < DEPTH {
                        pack.with_dependencies([format!("p{}", i + 1)])
                    } else {
                        pack
                    }
                })
                .collect(),
        );

        let order = collect_downloadable_dependencies(&index, "p0").unwrap();
        assert_eq!(order.len(), DEPTH - 1);
        assert_eq!(order[0], format!("p{}", DEPTH - 1));
        assert_eq!(order[DEPTH - 2], "p1");
    }

    /// Acyclic graphs where pack `i` may only depend on packs `j < i`.
    fn dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
        (1usize..20).prop_flat_map(|n| {
            (0..n)
                .map(|i| proptest::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i))
                .collect::<Vec<_>>()
        })
    }

    fn transitive(graph: &[Vec<usize>], node: usize, out: &mut Vec<usize>) {
        for &dep in &graph[node] {
            if !out.contains(&dep) {
                out.push(dep);
                transitive(graph, dep, out);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_topological_and_unique(graph in dag()) {
            let index = index(
                graph
                    .iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        Pack::new(format!("p{}", i), 1)
                            .with_dependencies(deps.iter().map(|d| format!("p{}", d)))
                    })
                    .collect(),
            );
            let root = graph.len() - 1;
            let order = collect_downloadable_dependencies(&index, &format!("p{}", root)).unwrap();

            let position: HashMap<&str, usize> =
                order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
            prop_assert_eq!(position.len(), order.len(), "duplicates in {:?}", order);
            let root_name = format!("p{}", root);
            prop_assert!(!position.contains_key(root_name.as_str()));

            let mut expected = Vec::new();
            transitive(&graph, root, &mut expected);
            prop_assert_eq!(order.len(), expected.len());

            for name in &order {
                let pack = index.get(name).unwrap();
                for dep in &pack.dependencies {
                    prop_assert!(position[dep.as_str()] < position[name.as_str()]);
                }
            }
        }
    }
}
