use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dce_core::{
    Alias, Goal, PropertyMap, PropertyValue, ResourceState, StepOp, Urn, ValidationError,
};
use dce_registry::{CheckResult, CreateResult, DiffResult, Provider, ProviderCallError, UpdateResult};
use parking_lot::Mutex;

use super::*;

#[derive(Default)]
struct FakeState {
    diff: DiffResult,
    check_failures: Vec<String>,
}

#[derive(Clone, Default)]
struct FakeProvider(Arc<Mutex<FakeState>>);

impl FakeProvider {
    fn with_diff(diff: DiffResult) -> Self {
        let fake = FakeProvider::default();
        fake.0.lock().diff = diff;
        fake
    }
}

#[async_trait]
impl Provider for FakeProvider {
    async fn check(
        &self,
        _urn: &Urn,
        _olds: &PropertyMap,
        news: &PropertyMap,
    ) -> Result<CheckResult, ProviderCallError> {
        Ok(CheckResult { inputs: news.clone(), failures: self.0.lock().check_failures.clone() })
    }

    async fn diff(
        &self,
        _urn: &Urn,
        _olds: &PropertyMap,
        _news: &PropertyMap,
        _ignore_changes: &[String],
    ) -> Result<DiffResult, ProviderCallError> {
        Ok(self.0.lock().diff.clone())
    }

    async fn configure(&self, _inputs: &PropertyMap) -> Result<(), ProviderCallError> {
        Ok(())
    }

    async fn create(
        &self,
        _urn: &Urn,
        properties: &PropertyMap,
    ) -> Result<CreateResult, ProviderCallError> {
        Ok(CreateResult { id: "id".into(), outputs: properties.clone() })
    }

    async fn update(
        &self,
        _urn: &Urn,
        _id: &str,
        _olds: &PropertyMap,
        news: &PropertyMap,
    ) -> Result<UpdateResult, ProviderCallError> {
        Ok(UpdateResult { outputs: news.clone() })
    }

    async fn delete(&self, _urn: &Urn, _id: &str, _properties: &PropertyMap) -> Result<(), ProviderCallError> {
        Ok(())
    }

    async fn read(&self, _urn: &Urn, id: &str, inputs: &PropertyMap) -> Result<CreateResult, ProviderCallError> {
        Ok(CreateResult { id: id.to_string(), outputs: inputs.clone() })
    }

    async fn invoke(&self, _token: &str, _args: &PropertyMap) -> Result<PropertyMap, ProviderCallError> {
        Ok(PropertyMap::new())
    }

    async fn get_plugin_info(&self) -> Result<Option<String>, ProviderCallError> {
        Ok(None)
    }
}

fn generator(old: Vec<ResourceState>) -> StepGenerator {
    StepGenerator::new("dev", "proj", &old, TargetOptions::default())
}

fn provider(diff: DiffResult) -> Option<Arc<dyn Provider>> {
    Some(Arc::new(FakeProvider::with_diff(diff)) as Arc<dyn Provider>)
}

#[tokio::test]
async fn register_resource_with_no_old_state_creates() {
    let gen = generator(Vec::new());
    let goal = Goal::builder().ty("pkg:index:Widget").name("r").build();

    let chain = gen.register_resource(&goal, None).await.unwrap();

    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].op, StepOp::Create);
}

#[tokio::test]
async fn register_resource_import_id_creates_an_import_step() {
    let gen = generator(Vec::new());
    let goal = Goal::builder()
        .ty("pkg:index:Widget")
        .name("r")
        .import_id(Some("existing-id".to_string()))
        .build();

    let chain = gen.register_resource(&goal, None).await.unwrap();

    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].op, StepOp::Import);
}

#[tokio::test]
async fn register_resource_unchanged_is_same() {
    let urn = Urn::new("dev", "proj", "", "pkg:index:Widget", "r");
    let mut props = PropertyMap::new();
    props.insert("size".into(), PropertyValue::number(1.0));
    let old = ResourceState::builder()
        .urn(urn)
        .ty("pkg:index:Widget")
        .name("r")
        .inputs(props.clone())
        .build();
    let gen = generator(vec![old]);
    let goal = Goal::builder().ty("pkg:index:Widget").name("r").properties(props).build();

    let chain = gen.register_resource(&goal, provider(DiffResult::default()).as_ref()).await.unwrap();

    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].op, StepOp::Same);
}

#[tokio::test]
async fn register_resource_with_changed_keys_updates() {
    let urn = Urn::new("dev", "proj", "", "pkg:index:Widget", "r");
    let mut old_props = PropertyMap::new();
    old_props.insert("size".into(), PropertyValue::number(1.0));
    let old = ResourceState::builder().urn(urn).ty("pkg:index:Widget").name("r").inputs(old_props).build();
    let mut new_props = PropertyMap::new();
    new_props.insert("size".into(), PropertyValue::number(2.0));
    let gen = generator(vec![old]);
    let goal = Goal::builder().ty("pkg:index:Widget").name("r").properties(new_props).build();
    let diff = DiffResult { changed_keys: vec!["size".into()], ..Default::default() };

    let chain = gen.register_resource(&goal, provider(diff).as_ref()).await.unwrap();

    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].op, StepOp::Update);
}

#[tokio::test]
async fn register_resource_with_replace_keys_emits_the_three_step_chain() {
    let urn = Urn::new("dev", "proj", "", "pkg:index:Widget", "r");
    let old = ResourceState::builder().urn(urn).ty("pkg:index:Widget").name("r").build();
    let gen = generator(vec![old]);
    let goal = Goal::builder().ty("pkg:index:Widget").name("r").build();
    let diff = DiffResult { replace_keys: vec!["id".into()], ..Default::default() };

    let chain = gen.register_resource(&goal, provider(diff).as_ref()).await.unwrap();

    assert_eq!(
        chain.iter().map(|s| s.op).collect::<Vec<_>>(),
        vec![StepOp::CreateReplacement, StepOp::Replace, StepOp::DeleteReplaced]
    );
}

#[tokio::test]
async fn replace_of_a_protected_resource_is_rejected() {
    let urn = Urn::new("dev", "proj", "", "pkg:index:Widget", "r");
    let old = ResourceState::builder().urn(urn).ty("pkg:index:Widget").name("r").protect(true).build();
    let gen = generator(vec![old]);
    let goal = Goal::builder().ty("pkg:index:Widget").name("r").build();
    let diff = DiffResult { replace_requested: true, ..Default::default() };

    let err = gen.register_resource(&goal, provider(diff).as_ref()).await.unwrap_err();

    assert!(matches!(
        err,
        GeneratorError::Validation(ValidationError::ProtectedResource { attempted: "replaced", .. })
    ));
}

#[tokio::test]
async fn replace_on_changes_wildcard_forces_replace_on_init_error() {
    let urn = Urn::new("dev", "proj", "", "pkg:index:Widget", "r");
    let old = ResourceState::builder()
        .urn(urn)
        .ty("pkg:index:Widget")
        .name("r")
        .replace_on_changes(vec!["*".to_string()])
        .init_errors(vec!["boom".to_string()])
        .build();
    let gen = generator(vec![old]);
    let goal = Goal::builder()
        .ty("pkg:index:Widget")
        .name("r")
        .replace_on_changes(vec!["*".to_string()])
        .build();

    let chain =
        gen.register_resource(&goal, provider(DiffResult::default()).as_ref()).await.unwrap();

    assert_eq!(chain[0].op, StepOp::CreateReplacement);
}

#[tokio::test]
async fn duplicate_urn_in_the_same_run_is_an_error() {
    let gen = generator(Vec::new());
    let goal = Goal::builder().ty("pkg:index:Widget").name("r").build();

    gen.register_resource(&goal, None).await.unwrap();
    let err = gen.register_resource(&goal, None).await.unwrap_err();

    assert!(matches!(err, GeneratorError::Validation(ValidationError::DuplicateUrn(_))));
}

#[tokio::test]
async fn unregistered_parent_is_an_error() {
    let gen = generator(Vec::new());
    let bogus_parent = Urn::new("dev", "proj", "", "pkg:index:Parent", "ghost");
    let goal = Goal::builder().ty("pkg:index:Widget").name("r").parent(Some(bogus_parent)).build();

    let err = gen.register_resource(&goal, None).await.unwrap_err();

    assert!(matches!(err, GeneratorError::CouldNotFindParent { .. }));
}

#[tokio::test]
async fn finalize_deletes_unobserved_old_resources() {
    let urn = Urn::new("dev", "proj", "", "pkg:index:Widget", "orphan");
    let old = ResourceState::builder().urn(urn.clone()).ty("pkg:index:Widget").name("orphan").build();
    let gen = generator(vec![old]);

    let chain = gen.finalize().unwrap();

    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].op, StepOp::Delete);
    assert_eq!(chain[0].urn, urn);
}

#[tokio::test]
async fn finalize_skips_resources_observed_this_run() {
    let urn = Urn::new("dev", "proj", "", "pkg:index:Widget", "r");
    let old = ResourceState::builder().urn(urn).ty("pkg:index:Widget").name("r").build();
    let gen = generator(vec![old]);
    let goal = Goal::builder().ty("pkg:index:Widget").name("r").build();
    gen.register_resource(&goal, provider(DiffResult::default()).as_ref()).await.unwrap();

    let chain = gen.finalize().unwrap();

    assert!(chain.is_empty());
}

#[tokio::test]
async fn finalize_of_a_protected_orphan_is_rejected() {
    let urn = Urn::new("dev", "proj", "", "pkg:index:Widget", "orphan");
    let old = ResourceState::builder().urn(urn).ty("pkg:index:Widget").name("orphan").protect(true).build();
    let gen = generator(vec![old]);

    let err = gen.finalize().unwrap_err();

    assert!(matches!(
        err,
        GeneratorError::Validation(ValidationError::ProtectedResource { attempted: "deleted", .. })
    ));
}

#[tokio::test]
async fn targeting_suppresses_non_targeted_resources_to_same() {
    let urn = Urn::new("dev", "proj", "", "pkg:index:Widget", "r");
    let old = ResourceState::builder().urn(urn).ty("pkg:index:Widget").name("r").build();
    let options = TargetOptions {
        targets: dce_core::TargetSet::new(["urn:pulumi:dev::proj::pkg:index:Widget::other"]),
        ..Default::default()
    };
    let gen = StepGenerator::new("dev", "proj", &[old], options);
    let goal = Goal::builder().ty("pkg:index:Widget").name("r").build();

    let chain = gen.register_resource(&goal, provider(DiffResult::default()).as_ref()).await.unwrap();

    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].op, StepOp::Same);
}

#[tokio::test]
async fn targeting_drops_a_non_targeted_would_be_create_entirely() {
    let options = TargetOptions {
        targets: dce_core::TargetSet::new(["urn:pulumi:dev::proj::pkg:index:Widget::other"]),
        ..Default::default()
    };
    let gen = StepGenerator::new("dev", "proj", &[], options);
    let goal = Goal::builder().ty("pkg:index:Widget").name("r").build();

    let chain = gen.register_resource(&goal, None).await.unwrap();

    assert!(chain.is_empty());
}

#[tokio::test]
async fn alias_matches_the_old_resource_under_its_previous_name() {
    let old_urn = Urn::new("dev", "proj", "", "pkg:index:Widget", "legacy");
    let old = ResourceState::builder().urn(old_urn.clone()).ty("pkg:index:Widget").name("legacy").build();
    let gen = generator(vec![old]);
    let goal = Goal::builder()
        .ty("pkg:index:Widget")
        .name("current")
        .aliases(vec![Alias::Urn(old_urn)])
        .build();

    let chain = gen.register_resource(&goal, provider(DiffResult::default()).as_ref()).await.unwrap();

    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].op, StepOp::Same);
}

#[test]
fn rebuild_base_state_clears_dangling_references() {
    let parent = Urn::new("dev", "proj", "", "pkg:index:Parent", "p");
    let child_urn = Urn::new("dev", "proj", parent.qualified_type(), "pkg:index:Widget", "c");
    let mut child = ResourceState::builder().urn(child_urn).ty("pkg:index:Widget").name("c").build();
    child.parent = Some(parent.clone());
    child.dependencies = vec![parent.clone()];

    let mut removed = HashSet::new();
    removed.insert(parent);

    let survivors = rebuild_base_state(&[child], &removed);

    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].parent, None);
    assert!(survivors[0].dependencies.is_empty());
}

#[test]
fn rebuild_base_state_drops_removed_resources() {
    let urn = Urn::new("dev", "proj", "", "pkg:index:Widget", "gone");
    let r = ResourceState::builder().urn(urn.clone()).ty("pkg:index:Widget").name("gone").build();
    let mut removed = HashSet::new();
    removed.insert(urn);

    let survivors = rebuild_base_state(&[r], &removed);

    assert!(survivors.is_empty());
}
