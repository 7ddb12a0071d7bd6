//! Generic-aware resolution: parameterized keys, variable binding, chains
//! through type arguments

use std::sync::Arc;

use plexus_registry::domain::{
    ClassMetadata, Error, ProvidesMember, RawType, ServiceKey, ServiceValue, TypeRef,
};
use plexus_registry::ServiceRegistry;

/// Marker for the `Codec<F>` family
struct Codec;
#[derive(Debug)]
struct Json;
#[derive(Debug)]
struct Yaml;
#[derive(Debug)]
struct CodecImpl;

fn codec_key<F: 'static>() -> ServiceKey {
    ServiceKey::parameterized(RawType::of::<Codec>(), vec![ServiceKey::of::<F>()])
}

fn codec_meta() -> ClassMetadata {
    ClassMetadata::of::<Codec>()
        .with_type_params(&["F"])
        .utility()
        .provides(ProvidesMember::static_method_keyed(
            "codec",
            TypeRef::generic(RawType::of::<Codec>(), vec![TypeRef::param("F")]),
            vec![],
            |_| Ok(ServiceValue::present(CodecImpl)),
        ))
}

#[test]
fn parameterized_keys_resolve_independently() {
    let registry = ServiceRegistry::new();
    registry.register_metadata(codec_meta()).unwrap();
    registry.register_key(&codec_key::<Json>()).unwrap();
    registry.register_key(&codec_key::<Yaml>()).unwrap();

    let j1 = registry.lookup_key::<CodecImpl>(&codec_key::<Json>()).unwrap();
    let j2 = registry.lookup_key::<CodecImpl>(&codec_key::<Json>()).unwrap();
    let y = registry.lookup_key::<CodecImpl>(&codec_key::<Yaml>()).unwrap();

    // Same argument shares the singleton; different arguments do not
    assert!(Arc::ptr_eq(&j1, &j2));
    assert!(!Arc::ptr_eq(&j1, &y));
}

#[test]
fn bare_constructor_key_matches_nothing() {
    let registry = ServiceRegistry::new();
    registry.register_metadata(codec_meta()).unwrap();
    registry.register_key(&codec_key::<Json>()).unwrap();

    let err = registry
        .lookup_key::<CodecImpl>(&ServiceKey::of::<Codec>())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn generic_supertype_contracts_substitute_arguments() {
    /// Marker for the `Store<T>` family
    struct Store;
    /// Marker for the `Readable<T>` contract family
    struct Readable;
    #[derive(Debug)]
    struct User;
    #[derive(Debug)]
    struct Order;
    #[derive(Debug)]
    struct StoreImpl;

    let registry = ServiceRegistry::new();
    registry
        .register_metadata(
            ClassMetadata::of::<Store>()
                .with_type_params(&["T"])
                .contract_ref(TypeRef::generic(
                    RawType::of::<Readable>(),
                    vec![TypeRef::param("T")],
                ))
                .utility()
                .provides(ProvidesMember::static_method_keyed(
                    "store",
                    TypeRef::generic(RawType::of::<Store>(), vec![TypeRef::param("T")]),
                    vec![],
                    |_| Ok(ServiceValue::present(StoreImpl)),
                )),
        )
        .unwrap();

    let store_users =
        ServiceKey::parameterized(RawType::of::<Store>(), vec![ServiceKey::of::<User>()]);
    registry.register_key(&store_users).unwrap();

    // Fetchable under the substituted contract key
    let readable_users =
        ServiceKey::parameterized(RawType::of::<Readable>(), vec![ServiceKey::of::<User>()]);
    let found = registry.lookup_key::<StoreImpl>(&readable_users).unwrap();
    let direct = registry.lookup_key::<StoreImpl>(&store_users).unwrap();
    assert!(Arc::ptr_eq(&found, &direct));

    // A different argument is a different contract entirely
    let readable_orders =
        ServiceKey::parameterized(RawType::of::<Readable>(), vec![ServiceKey::of::<Order>()]);
    assert!(registry
        .lookup_key::<StoreImpl>(&readable_orders)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn unresolvable_variable_fails_at_registration() {
    struct Broken;

    let meta = ClassMetadata::of::<Broken>()
        .with_type_params(&["T"])
        .utility()
        .provides(ProvidesMember::static_field_keyed(
            "bad",
            TypeRef::param("U"),
            || Ok(ServiceValue::null()),
        ));

    let registry = ServiceRegistry::new();
    registry.add_metadata(meta);

    let key = ServiceKey::parameterized(RawType::of::<Broken>(), vec![ServiceKey::of::<Json>()]);
    match registry.register_key(&key) {
        Err(Error::UnresolvableType { variable, context }) => {
            assert_eq!(variable, "U");
            assert!(context.contains("bad"));
        }
        other => panic!("expected unresolvable type, got {other:?}"),
    }
}

#[test]
fn argument_arity_mismatch_fails_at_registration() {
    let registry = ServiceRegistry::new();
    registry.register_metadata(codec_meta()).unwrap();

    // The family declares one parameter; a bare key binds none
    let err = registry.register_key(&ServiceKey::of::<Codec>()).unwrap_err();
    assert!(matches!(err, Error::InvalidMetadata { .. }));
}

#[test]
fn unknown_key_fails_before_activation() {
    struct Never;
    let registry = ServiceRegistry::new();
    let err = registry.register_key(&ServiceKey::of::<Never>()).unwrap_err();
    assert!(matches!(err, Error::InvalidMetadata { .. }));
}
