// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dce_core::ResourceState;

fn urn(name: &str) -> Urn {
    Urn::parse(format!("urn:pulumi:dev::proj::pkg:index:Widget::{name}")).unwrap()
}

fn resource(name: &str) -> ResourceState {
    ResourceState::builder().urn(urn(name)).name(name).build()
}

#[test]
fn dependencies_of_includes_parent_and_deps() {
    let mut child = resource("child");
    child.parent = Some(urn("parent"));
    child.dependencies = vec![urn("sibling")];
    let graph = DependencyGraph::build(&[resource("parent"), resource("sibling"), child]);

    let mut deps = graph.dependencies_of(&urn("child")).to_vec();
    deps.sort();
    assert_eq!(deps, vec![urn("parent"), urn("sibling")]);
}

#[test]
fn dependents_of_is_transitive() {
    let mut b = resource("b");
    b.dependencies = vec![urn("a")];
    let mut c = resource("c");
    c.dependencies = vec![urn("b")];
    let graph = DependencyGraph::build(&[resource("a"), b, c]);

    let dependents = graph.dependents_of(&urn("a"));
    assert!(dependents.contains(&urn("b")));
    assert!(dependents.contains(&urn("c")));
}

#[test]
fn dependencies_of_set_unions_transitive_closures() {
    let mut b = resource("b");
    b.dependencies = vec![urn("a")];
    let graph = DependencyGraph::build(&[resource("a"), b, resource("c")]);

    let closure = graph.dependencies_of_set(&[urn("b"), urn("c")]);
    assert!(closure.contains(&urn("a")));
    assert!(!closure.contains(&urn("c")));
}

#[test]
fn reverse_topological_deletes_dependents_before_dependencies() {
    let mut child = resource("child");
    child.parent = Some(urn("parent"));
    let graph = DependencyGraph::build(&[resource("parent"), child]);

    let order = graph.reverse_topological(&[urn("parent"), urn("child")]);
    let child_pos = order.iter().position(|u| u == &urn("child")).unwrap();
    let parent_pos = order.iter().position(|u| u == &urn("parent")).unwrap();
    assert!(child_pos < parent_pos);
}

#[test]
fn provider_edge_is_tracked() {
    let mut r = resource("r");
    r.provider = Some(dce_core::ProviderRef::new(
        urn("default_pkg"),
        "4c2d1e",
    ));
    let graph = DependencyGraph::build(&[resource("default_pkg"), r]);
    assert_eq!(graph.dependencies_of(&urn("r")).to_vec(), vec![urn("default_pkg")]);
}
