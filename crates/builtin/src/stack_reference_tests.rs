// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

struct FakeBackend {
    outputs: PropertyMap,
}

#[async_trait]
impl BackendClient for FakeBackend {
    async fn get_stack_outputs(
        &self,
        _name: &str,
        _on_decrypt_error: &(dyn Fn(BackendError) -> Result<PropertyMap, BackendError> + Sync),
    ) -> Result<PropertyMap, BackendError> {
        Ok(self.outputs.clone())
    }

    async fn get_stack_resource_outputs(
        &self,
        _stack_name: &str,
    ) -> Result<Vec<(Urn, PropertyMap)>, BackendError> {
        Ok(Vec::new())
    }
}

fn urn() -> Urn {
    Urn::parse("urn:pulumi:dev::proj::pulumi:pulumi:StackReference::ref").unwrap()
}

fn name_input(name: &str) -> PropertyMap {
    let mut m = PropertyMap::new();
    m.insert("name".into(), PropertyValue::string(name));
    m
}

#[tokio::test]
async fn create_falls_through_to_backend_for_non_co_deployed_stack() {
    let mut backend_outputs = PropertyMap::new();
    backend_outputs.insert("url".into(), PropertyValue::string("https://example.com"));
    let provider = StackReferenceProvider::new(
        Arc::new(OutputWaiterStore::new([])),
        StackId::new("proj", "self"),
        FakeBackend { outputs: backend_outputs },
        CancellationToken::new(),
    );

    let created = provider.create(&urn(), &name_input("other")).await.unwrap();

    assert_eq!(created.id, "other");
    assert_eq!(created.outputs.get("name"), Some(&PropertyValue::string("other")));
    let PropertyValue::Object(outputs) = created.outputs.get("outputs").unwrap() else {
        panic!("expected object");
    };
    assert_eq!(outputs.get("url"), Some(&PropertyValue::string("https://example.com")));
}

#[tokio::test]
async fn create_resolves_against_the_waiter_store_for_a_co_deployed_stack() {
    let own = StackId::new("proj", "self");
    let target = StackId::new("proj", "other");
    let store = Arc::new(OutputWaiterStore::new([own.clone(), target.clone()]));
    let mut outputs = PropertyMap::new();
    outputs.insert("x".into(), PropertyValue::number(1.0));
    store.set_outputs(target, outputs);

    let provider = StackReferenceProvider::new(
        store,
        own,
        FakeBackend { outputs: PropertyMap::new() },
        CancellationToken::new(),
    );

    let created = provider.create(&urn(), &name_input("other")).await.unwrap();
    let PropertyValue::Object(outputs) = created.outputs.get("outputs").unwrap() else {
        panic!("expected object");
    };
    assert_eq!(outputs.get("x"), Some(&PropertyValue::number(1.0)));
}

#[tokio::test]
async fn secret_output_names_are_sorted_and_only_include_secrets() {
    let own = StackId::new("proj", "self");
    let target = StackId::new("proj", "other");
    let store = Arc::new(OutputWaiterStore::new([own.clone(), target.clone()]));
    let mut outputs = PropertyMap::new();
    outputs.insert("zeta".into(), PropertyValue::Secret(Box::new(PropertyValue::string("s"))));
    outputs.insert("alpha".into(), PropertyValue::Secret(Box::new(PropertyValue::string("s"))));
    outputs.insert("plain".into(), PropertyValue::string("p"));
    store.set_outputs(target, outputs);

    let provider = StackReferenceProvider::new(
        store,
        own,
        FakeBackend { outputs: PropertyMap::new() },
        CancellationToken::new(),
    );

    let created = provider.create(&urn(), &name_input("other")).await.unwrap();
    let PropertyValue::Array(names) = created.outputs.get("secretOutputNames").unwrap() else {
        panic!("expected array");
    };
    assert_eq!(
        names,
        &vec![PropertyValue::string("alpha"), PropertyValue::string("zeta")]
    );
}

#[tokio::test]
async fn check_rejects_missing_name_input() {
    let provider = StackReferenceProvider::new(
        Arc::new(OutputWaiterStore::new([])),
        StackId::new("proj", "self"),
        FakeBackend { outputs: PropertyMap::new() },
        CancellationToken::new(),
    );

    let err = provider.check(&urn(), &PropertyMap::new(), &PropertyMap::new()).await.unwrap_err();
    assert!(matches!(err, ProviderCallError::Failed(_)));
}

#[tokio::test]
async fn get_resource_returns_a_previously_registered_resource() {
    let provider = StackReferenceProvider::new(
        Arc::new(OutputWaiterStore::new([])),
        StackId::new("proj", "self"),
        FakeBackend { outputs: PropertyMap::new() },
        CancellationToken::new(),
    );
    let target = Urn::parse("urn:pulumi:dev::proj::pkg:index:Widget::r").unwrap();
    provider.register_resource(target.clone(), "id-1".into(), PropertyMap::new());

    let mut args = PropertyMap::new();
    args.insert("urn".into(), PropertyValue::string(target.to_string()));
    let result = provider.invoke("pulumi:pulumi:getResource", &args).await.unwrap();

    assert_eq!(result.get("id"), Some(&PropertyValue::string("id-1")));
}

#[tokio::test]
async fn get_resource_fails_for_an_unknown_urn() {
    let provider = StackReferenceProvider::new(
        Arc::new(OutputWaiterStore::new([])),
        StackId::new("proj", "self"),
        FakeBackend { outputs: PropertyMap::new() },
        CancellationToken::new(),
    );
    let mut args = PropertyMap::new();
    args.insert(
        "urn".into(),
        PropertyValue::string("urn:pulumi:dev::proj::pkg:index:Widget::missing"),
    );

    let err = provider.invoke("pulumi:pulumi:getResource", &args).await.unwrap_err();
    assert!(matches!(err, ProviderCallError::Failed(_)));
}
