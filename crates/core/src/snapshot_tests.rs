// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::resource::ResourceState;

fn urn(name: &str) -> Urn {
    Urn::parse(format!("urn:pulumi:dev::proj::pkg:index:Widget::{name}")).unwrap()
}

fn resource(name: &str) -> ResourceState {
    ResourceState::builder().urn(urn(name)).name(name).id(format!("id-{name}")).build()
}

#[test]
fn empty_snapshot_is_valid() {
    let snap = Snapshot::new(Manifest::default());
    assert!(snap.validate().is_ok());
}

#[test]
fn forward_reference_to_parent_is_rejected() {
    let mut child = resource("child");
    child.parent = Some(urn("parent"));
    let mut snap = Snapshot::new(Manifest::default());
    snap.resources.push(child);
    snap.resources.push(resource("parent"));
    let err = snap.validate().unwrap_err();
    assert!(err.reason.contains("does not precede"));
}

#[test]
fn parent_preceding_child_is_valid() {
    let mut child = resource("child");
    child.parent = Some(urn("parent"));
    let mut snap = Snapshot::new(Manifest::default());
    snap.resources.push(resource("parent"));
    snap.resources.push(child);
    assert!(snap.validate().is_ok());
}

#[test]
fn reference_to_tombstone_is_allowed_regardless_of_position() {
    let mut child = resource("child");
    child.deleted_with = Some(urn("sibling"));
    let mut tombstone = resource("sibling");
    tombstone.delete = true;

    let mut snap = Snapshot::new(Manifest::default());
    snap.resources.push(child);
    snap.resources.push(tombstone);
    assert!(snap.validate().is_ok());
}

#[test]
fn dangling_reference_reports_unresolved() {
    let mut child = resource("child");
    child.dependencies.push(urn("ghost"));
    let mut snap = Snapshot::new(Manifest::default());
    snap.resources.push(child);
    let err = snap.validate().unwrap_err();
    assert!(err.reason.contains("does not resolve"));
}

#[test]
fn duplicate_live_urn_is_rejected() {
    let mut snap = Snapshot::new(Manifest::default());
    snap.resources.push(resource("dup"));
    snap.resources.push(resource("dup"));
    let err = snap.validate().unwrap_err();
    assert!(err.reason.contains("duplicate"));
}

#[test]
fn duplicate_urn_is_fine_when_one_copy_is_a_tombstone() {
    let mut live = resource("dup");
    live.id = "id-new".into();
    let mut tombstone = resource("dup");
    tombstone.delete = true;

    let mut snap = Snapshot::new(Manifest::default());
    snap.resources.push(tombstone);
    snap.resources.push(live);
    assert!(snap.validate().is_ok());
}

#[test]
fn find_prefers_live_copy_over_tombstone() {
    let mut tombstone = resource("dup");
    tombstone.delete = true;
    let live = resource("dup");

    let mut snap = Snapshot::new(Manifest::default());
    snap.resources.push(tombstone);
    snap.resources.push(live.clone());

    let found = snap.find(&urn("dup")).unwrap();
    assert!(!found.delete);
    assert_eq!(found.id, live.id);
}

#[test]
fn provider_type_mismatch_is_rejected() {
    let mut provider = resource("default_pkg");
    provider.urn = Urn::parse("urn:pulumi:dev::proj::pulumi:providers:pkg::default").unwrap();
    provider.ty = "pkg:index:Widget".into();
    let mut snap = Snapshot::new(Manifest::default());
    snap.resources.push(provider);
    let err = snap.validate().unwrap_err();
    assert!(err.reason.contains("IsProviderType"));
}
