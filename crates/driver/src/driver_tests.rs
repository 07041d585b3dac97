use std::sync::Arc;

use async_trait::async_trait;
use dce_builtin::{BackendClient, BackendError, OutputWaiterStore};
use dce_core::{Goal, Manifest, PropertyMap, PropertyValue, ResourceState, Snapshot, Urn};
use dce_registry::{CheckResult, CreateResult, DiffResult, Provider, ProviderCallError, ProviderLoader, UpdateResult};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::construct::{ConstructRequest, LanguageHost, SubMonitor};
use crate::source::{EventIterator, RegisterResult, Source, SourceError, SourceEvent};

#[derive(Default)]
struct FakeState {
    read_empty_ids: Vec<Urn>,
}

#[derive(Clone, Default)]
struct FakeProvider(Arc<Mutex<FakeState>>);

impl FakeProvider {
    fn gone_on_refresh(urn: Urn) -> Self {
        let fake = FakeProvider::default();
        fake.0.lock().read_empty_ids.push(urn);
        fake
    }
}

#[async_trait]
impl Provider for FakeProvider {
    async fn check(&self, _urn: &Urn, _olds: &PropertyMap, news: &PropertyMap) -> Result<CheckResult, ProviderCallError> {
        Ok(CheckResult { inputs: news.clone(), failures: Vec::new() })
    }

    async fn diff(
        &self,
        _urn: &Urn,
        _olds: &PropertyMap,
        _news: &PropertyMap,
        _ignore_changes: &[String],
    ) -> Result<DiffResult, ProviderCallError> {
        Ok(DiffResult::default())
    }

    async fn configure(&self, _inputs: &PropertyMap) -> Result<(), ProviderCallError> {
        Ok(())
    }

    async fn create(&self, _urn: &Urn, properties: &PropertyMap) -> Result<CreateResult, ProviderCallError> {
        Ok(CreateResult { id: "id-1".into(), outputs: properties.clone() })
    }

    async fn update(&self, _urn: &Urn, _id: &str, _olds: &PropertyMap, news: &PropertyMap) -> Result<UpdateResult, ProviderCallError> {
        Ok(UpdateResult { outputs: news.clone() })
    }

    async fn delete(&self, _urn: &Urn, _id: &str, _properties: &PropertyMap) -> Result<(), ProviderCallError> {
        Ok(())
    }

    async fn read(&self, urn: &Urn, id: &str, inputs: &PropertyMap) -> Result<CreateResult, ProviderCallError> {
        if self.0.lock().read_empty_ids.contains(urn) {
            return Ok(CreateResult { id: String::new(), outputs: PropertyMap::new() });
        }
        Ok(CreateResult { id: id.to_string(), outputs: inputs.clone() })
    }

    async fn invoke(&self, _token: &str, _args: &PropertyMap) -> Result<PropertyMap, ProviderCallError> {
        Ok(PropertyMap::new())
    }

    async fn get_plugin_info(&self) -> Result<Option<String>, ProviderCallError> {
        Ok(None)
    }
}

#[derive(Clone, Default)]
struct FakeLoader {
    provider: FakeProvider,
}

#[async_trait]
impl ProviderLoader for FakeLoader {
    async fn load(
        &self,
        _package: &str,
        _version: Option<&str>,
        _server_url: Option<&str>,
        _config: &PropertyMap,
    ) -> Result<Arc<dyn Provider>, ProviderCallError> {
        Ok(Arc::new(self.provider.clone()))
    }
}

struct FakeBackend;

#[async_trait]
impl BackendClient for FakeBackend {
    async fn get_stack_outputs(
        &self,
        _name: &str,
        _on_decrypt_error: &(dyn Fn(BackendError) -> Result<PropertyMap, BackendError> + Sync),
    ) -> Result<PropertyMap, BackendError> {
        Ok(PropertyMap::new())
    }

    async fn get_stack_resource_outputs(&self, _stack_name: &str) -> Result<Vec<(Urn, PropertyMap)>, BackendError> {
        Ok(Vec::new())
    }
}

struct ScriptedIterator {
    goals: std::collections::VecDeque<Goal>,
}

#[async_trait]
impl EventIterator for ScriptedIterator {
    async fn next(&mut self) -> Result<Option<SourceEvent>, SourceError> {
        Ok(self.goals.pop_front().map(|goal| {
            let (done, _rx) = tokio::sync::oneshot::channel();
            SourceEvent::RegisterResource { goal: Box::new(goal), done }
        }))
    }

    async fn cancel(&mut self) {}
}

struct ScriptedSource {
    goals: Vec<Goal>,
}

impl ScriptedSource {
    fn new(goals: Vec<Goal>) -> Self {
        ScriptedSource { goals }
    }
}

#[async_trait]
impl Source for ScriptedSource {
    fn project(&self) -> &str {
        "proj"
    }

    async fn iterate(&self, _cancel: CancellationToken) -> Result<Box<dyn EventIterator>, SourceError> {
        Ok(Box::new(ScriptedIterator { goals: self.goals.clone().into() }))
    }
}

fn deployment(
    old: Snapshot,
    options: DeploymentOptions,
    loader: FakeLoader,
) -> Deployment<FakeLoader, FakeBackend> {
    Deployment::new(
        "dev",
        "proj",
        old,
        options,
        loader,
        FakeBackend,
        Arc::new(OutputWaiterStore::new([])),
        CancellationToken::new(),
    )
}

fn provider_resource(pkg: &str) -> (ResourceState, ProviderRef) {
    let urn = Urn::new("dev", "proj", "", &format!("pulumi:providers:{pkg}"), "default");
    let state = ResourceState {
        urn: urn.clone(),
        ty: format!("pulumi:providers:{pkg}"),
        name: "default".into(),
        provider: None,
        custom: true,
        external: false,
        id: "prov-1".into(),
        inputs: PropertyMap::new(),
        outputs: PropertyMap::new(),
        parent: None,
        dependencies: Vec::new(),
        property_dependencies: indexmap::IndexMap::new(),
        deleted_with: None,
        protect: false,
        retain_on_delete: false,
        delete: false,
        pending_replacement: false,
        import_id: None,
        aliases: Vec::new(),
        custom_timeouts: dce_core::CustomTimeouts::default(),
        additional_secret_outputs: Vec::new(),
        ignore_changes: Vec::new(),
        replace_on_changes: Vec::new(),
        init_errors: Vec::new(),
        view_of: None,
    };
    let provider_ref = ProviderRef::new(urn, "prov-1");
    (state, provider_ref)
}

fn custom_resource(urn: Urn, provider: Option<ProviderRef>) -> ResourceState {
    ResourceState {
        urn,
        ty: "pkg:index:Widget".into(),
        name: "w".into(),
        provider,
        custom: true,
        external: false,
        id: "id-0".into(),
        inputs: PropertyMap::new(),
        outputs: PropertyMap::new(),
        parent: None,
        dependencies: Vec::new(),
        property_dependencies: indexmap::IndexMap::new(),
        deleted_with: None,
        protect: false,
        retain_on_delete: false,
        delete: false,
        pending_replacement: false,
        import_id: None,
        aliases: Vec::new(),
        custom_timeouts: dce_core::CustomTimeouts::default(),
        additional_secret_outputs: Vec::new(),
        ignore_changes: Vec::new(),
        replace_on_changes: Vec::new(),
        init_errors: Vec::new(),
        view_of: None,
    }
}

#[tokio::test]
async fn refresh_drops_resource_the_provider_no_longer_has() {
    let urn = Urn::new("dev", "proj", "", "pkg:index:Widget", "w");
    let (provider_state, provider_ref) = provider_resource("pkg");
    let old = Snapshot {
        manifest: Manifest::default(),
        secrets_manager: None,
        resources: vec![provider_state, custom_resource(urn.clone(), Some(provider_ref))],
        pending_operations: Vec::new(),
    };

    let loader = FakeLoader { provider: FakeProvider::gone_on_refresh(urn.clone()) };
    let options = DeploymentOptions { refresh: true, refresh_only: true, ..DeploymentOptions::default() };
    let dep = deployment(old, options, loader);

    let snapshot = dep.run(&ScriptedSource::new(Vec::new())).await.unwrap();

    assert!(snapshot.find(&urn).is_none());
}

#[tokio::test]
async fn refresh_updates_outputs_for_a_resource_the_provider_still_has() {
    let urn = Urn::new("dev", "proj", "", "pkg:index:Widget", "w");
    let (provider_state, provider_ref) = provider_resource("pkg");
    let old = Snapshot {
        manifest: Manifest::default(),
        secrets_manager: None,
        resources: vec![provider_state, custom_resource(urn.clone(), Some(provider_ref))],
        pending_operations: Vec::new(),
    };

    let options = DeploymentOptions { refresh: true, refresh_only: true, ..DeploymentOptions::default() };
    let dep = deployment(old, options, FakeLoader::default());

    let snapshot = dep.run(&ScriptedSource::new(Vec::new())).await.unwrap();

    let surviving = snapshot.find(&urn).unwrap();
    assert_eq!(surviving.id, "id-0");
}

#[tokio::test]
async fn registering_a_custom_resource_synthesizes_its_default_provider() {
    let old = Snapshot::new(Manifest::default());
    let dep = deployment(old, DeploymentOptions::default(), FakeLoader::default());

    let goal = Goal::builder().ty("pkg:index:Widget").name("w").custom(true).build();
    let snapshot = dep.run(&ScriptedSource::new(vec![goal])).await.unwrap();

    let provider_urn = Urn::new("dev", "proj", "", "pulumi:providers:pkg", "default");
    assert!(snapshot.find(&provider_urn).is_some());
    let widget = snapshot.find(&Urn::new("dev", "proj", "", "pkg:index:Widget", "w")).unwrap();
    assert!(widget.provider.is_some());
}

#[tokio::test]
async fn run_fails_fast_when_cancelled_before_draining() {
    let old = Snapshot::new(Manifest::default());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let dep = Deployment::new(
        "dev",
        "proj",
        old,
        DeploymentOptions::default(),
        FakeLoader::default(),
        FakeBackend,
        Arc::new(OutputWaiterStore::new([])),
        cancel,
    );

    let err = dep.run(&ScriptedSource::new(Vec::new())).await.unwrap_err();

    assert!(matches!(err, DriverError::Cancelled));
}

struct FakeLanguageHost {
    child_properties: PropertyMap,
}

#[async_trait]
impl LanguageHost for FakeLanguageHost {
    async fn run(
        &self,
        _request: &ConstructRequest,
        _config: &PropertyMap,
        _secret_keys: &[String],
        monitor: &dyn SubMonitor,
    ) -> Result<(), crate::construct::ConstructError> {
        let announce = Goal::builder().ty("pulumi:pulumi:Stack").name("sub").custom(false).build();
        let RegisterResult { urn: stack_urn, .. } = monitor.register_resource(announce).await?;

        let child = Goal::builder()
            .ty("pkg:index:Widget")
            .name("widget")
            .custom(true)
            .properties(self.child_properties.clone())
            .build();
        monitor.register_resource(child).await?;

        let mut outputs = PropertyMap::new();
        outputs.insert("url".into(), PropertyValue::string("https://sub.example.com"));
        monitor.register_resource_outputs(stack_urn, outputs).await?;
        Ok(())
    }
}

#[tokio::test]
async fn construct_rewrites_parent_name_and_dependencies_for_sub_stack_resources() {
    let old = Snapshot::new(Manifest::default());
    let dep = deployment(old, DeploymentOptions::default(), FakeLoader::default());

    let dep_urn = Urn::new("dev", "proj", "", "pkg:index:Widget", "dep");
    let mut child_properties = PropertyMap::new();
    child_properties.insert("region".into(), PropertyValue::string("us-east-1"));
    let dep = dep.with_language_host(Arc::new(FakeLanguageHost { child_properties }));

    let mut props = PropertyMap::new();
    props.insert("source".into(), PropertyValue::string("./sub"));
    let goal = Goal::builder()
        .ty("pulumi:pulumi:Stack")
        .name("sub")
        .custom(false)
        .properties(props)
        .dependencies(vec![dep_urn.clone()])
        .build();

    let snapshot = dep.run(&ScriptedSource::new(vec![goal])).await.unwrap();

    let stack_urn = Urn::new("dev", "proj", "", "pulumi:pulumi:Stack", "sub");
    let stack = snapshot.find(&stack_urn).unwrap();
    assert_eq!(stack.outputs.get("url"), Some(&PropertyValue::string("https://sub.example.com")));

    let child_parent_qualified = stack_urn.qualified_type().to_string();
    let child_urn = Urn::new("dev", "proj", &child_parent_qualified, "pkg:index:Widget", "sub-widget");
    let child = snapshot.find(&child_urn).unwrap();
    assert_eq!(child.parent.as_ref(), Some(&stack_urn));
    assert!(child.dependencies.contains(&dep_urn));
}

#[tokio::test]
async fn construct_fails_without_a_configured_language_host() {
    let old = Snapshot::new(Manifest::default());
    let dep = deployment(old, DeploymentOptions::default(), FakeLoader::default());

    let mut props = PropertyMap::new();
    props.insert("source".into(), PropertyValue::string("./sub"));
    let goal = Goal::builder().ty("pulumi:pulumi:Stack").name("sub").custom(false).properties(props).build();

    // A register-resource failure answers that resource's own `done`
    // channel (§4.10, §7) rather than failing the run; with no other
    // resources to register, nothing ends up in the final snapshot.
    let snapshot = dep.run(&ScriptedSource::new(vec![goal])).await.unwrap();

    assert!(snapshot.resources.is_empty());
}
