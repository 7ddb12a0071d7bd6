//! Lookup semantics: scopes, wrapper shapes, null values, ambiguity

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use plexus_registry::domain::{
    ClassMetadata, Error, ParamSpec, ProvidesMember, Scope, ServiceKey, TypeRef, ValueProvider,
};
use plexus_registry::ServiceRegistry;

#[derive(Debug)]
struct Config {
    name: &'static str,
}

fn config_meta() -> ClassMetadata {
    ClassMetadata::of::<Config>().constructs::<Config>(vec![], |_| Ok(Config { name: "app" }))
}

#[derive(Debug)]
struct FeatureFlag;

fn flags_meta() -> ClassMetadata {
    struct Flags;
    ClassMetadata::of::<Flags>()
        .utility()
        .provides(ProvidesMember::static_field_nullable("flag", || {
            None::<FeatureFlag>
        }))
}

#[test]
fn singleton_lookups_share_one_instance() {
    let registry = ServiceRegistry::new();
    registry.register_metadata(config_meta()).unwrap();

    let a = registry.lookup::<Config>().unwrap();
    let b = registry.lookup::<Config>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.name, "app");
}

#[test]
fn per_lookup_constructs_fresh_instances() {
    static BUILT: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug)]
    struct Session {
        id: usize,
    }

    let meta = ClassMetadata::of::<Session>()
        .with_scope(Scope::PerLookup)
        .constructs::<Session>(vec![], |_| {
            Ok(Session {
                id: BUILT.fetch_add(1, Ordering::SeqCst),
            })
        });

    let registry = ServiceRegistry::new();
    registry.register_metadata(meta).unwrap();

    let a = registry.lookup::<Session>().unwrap();
    let b = registry.lookup::<Session>().unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(BUILT.load(Ordering::SeqCst), 2);
}

#[test]
fn missing_contract_is_service_not_found() {
    #[derive(Debug)]
    struct Ghost;

    let registry = ServiceRegistry::new();
    let err = registry.lookup::<Ghost>().unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn missing_contract_shapes_are_empty_not_errors() {
    #[derive(Debug)]
    struct Nothing;

    let registry = ServiceRegistry::new();
    assert!(registry.lookup_optional::<Nothing>().unwrap().is_none());
    assert!(registry.provider::<Nothing>().get().unwrap().is_none());
    assert!(registry.lookup_all::<Nothing>().unwrap().is_empty());
}

#[test]
fn null_value_is_not_found_for_bare_lookup() {
    let registry = ServiceRegistry::new();
    registry.register_metadata(flags_meta()).unwrap();

    let err = registry.lookup::<FeatureFlag>().unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn null_value_is_none_for_optional_and_provider() {
    let registry = ServiceRegistry::new();
    registry.register_metadata(flags_meta()).unwrap();

    assert!(registry.lookup_optional::<FeatureFlag>().unwrap().is_none());
    assert!(registry.provider::<FeatureFlag>().get().unwrap().is_none());
}

#[test]
fn null_value_is_a_present_element_for_lookup_all() {
    let registry = ServiceRegistry::new();
    registry.register_metadata(flags_meta()).unwrap();

    let all = registry.lookup_all::<FeatureFlag>().unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].is_none());
}

#[test]
fn two_bare_candidates_are_ambiguous() {
    #[derive(Debug)]
    struct Greeting(&'static str);
    struct English;
    struct French;

    let registry = ServiceRegistry::new();
    registry
        .register_metadata(ClassMetadata::of::<English>().utility().provides(
            ProvidesMember::static_field("hello", || Greeting("hello")),
        ))
        .unwrap();
    registry
        .register_metadata(ClassMetadata::of::<French>().utility().provides(
            ProvidesMember::static_field("bonjour", || Greeting("bonjour")),
        ))
        .unwrap();

    match registry.lookup::<Greeting>() {
        Err(Error::AmbiguousLookup { candidates, .. }) => assert_eq!(candidates.len(), 2),
        other => panic!("expected ambiguity, got {other:?}"),
    }

    // Multiplicity is still served through the iterable shape
    let all = registry.lookup_all::<Greeting>().unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn constructor_parameters_inject_shared_singletons() {
    #[derive(Debug)]
    struct Conn {
        url: &'static str,
    }
    #[derive(Debug)]
    struct Repo {
        conn: Arc<Conn>,
    }

    let registry = ServiceRegistry::new();
    registry
        .register_metadata(
            ClassMetadata::of::<Conn>().constructs::<Conn>(vec![], |_| Ok(Conn { url: "mem://" })),
        )
        .unwrap();
    registry
        .register_metadata(ClassMetadata::of::<Repo>().constructs::<Repo>(
            vec![ParamSpec::bare(TypeRef::of::<Conn>())],
            |args| {
                let conn = args[0]
                    .bare::<Conn>()
                    .ok_or_else(|| Error::container("missing conn argument"))?;
                Ok(Repo { conn })
            },
        ))
        .unwrap();

    let repo = registry.lookup::<Repo>().unwrap();
    assert_eq!(repo.conn.url, "mem://");

    let conn = registry.lookup::<Conn>().unwrap();
    assert!(Arc::ptr_eq(&repo.conn, &conn));
}

#[test]
fn missing_dependency_surfaces_as_unsatisfied() {
    #[derive(Debug)]
    struct Mailer;
    #[derive(Debug)]
    struct Notifier;

    let registry = ServiceRegistry::new();
    registry
        .register_metadata(ClassMetadata::of::<Notifier>().constructs::<Notifier>(
            vec![ParamSpec::bare(TypeRef::of::<Mailer>())],
            |_| Ok(Notifier),
        ))
        .unwrap();

    match registry.lookup::<Notifier>() {
        Err(Error::UnsatisfiedDependency { key, source }) => {
            assert!(key.contains("Notifier"));
            assert!(source.is_not_found());
        }
        other => panic!("expected unsatisfied dependency, got {other:?}"),
    }
}

#[test]
fn mutually_dependent_singletons_fail_instead_of_deadlocking() {
    #[derive(Debug)]
    struct Ping;
    #[derive(Debug)]
    struct Pong;

    let registry = ServiceRegistry::new();
    registry
        .register_metadata(ClassMetadata::of::<Ping>().constructs::<Ping>(
            vec![ParamSpec::bare(TypeRef::of::<Pong>())],
            |_| Ok(Ping),
        ))
        .unwrap();
    registry
        .register_metadata(ClassMetadata::of::<Pong>().constructs::<Pong>(
            vec![ParamSpec::bare(TypeRef::of::<Ping>())],
            |_| Ok(Pong),
        ))
        .unwrap();

    let err = registry.lookup::<Ping>().unwrap_err();
    assert!(matches!(err, Error::UnsatisfiedDependency { .. }));
    assert!(format!("{err:?}").contains("cycle"));

    // The failed construction must not wedge unrelated lookups
    registry.register_metadata(config_meta()).unwrap();
    assert_eq!(registry.lookup::<Config>().unwrap().name, "app");
}

#[test]
fn self_referential_per_lookup_fails_instead_of_recursing() {
    #[derive(Debug)]
    struct Echo;

    let registry = ServiceRegistry::new();
    registry
        .register_metadata(
            ClassMetadata::of::<Echo>()
                .with_scope(Scope::PerLookup)
                .constructs::<Echo>(vec![ParamSpec::bare(TypeRef::of::<Echo>())], |_| Ok(Echo)),
        )
        .unwrap();

    let err = registry.lookup::<Echo>().unwrap_err();
    assert!(matches!(err, Error::UnsatisfiedDependency { .. }));
}

#[test]
fn provider_parameters_defer_resolution() {
    #[derive(Debug)]
    struct Token(&'static str);
    struct LazyUser {
        token: ValueProvider,
    }

    let registry = ServiceRegistry::new();
    registry
        .register_metadata(ClassMetadata::of::<LazyUser>().constructs::<LazyUser>(
            vec![ParamSpec::provider(TypeRef::of::<Token>())],
            |args| {
                let provider = args[0]
                    .provider()
                    .ok_or_else(|| Error::container("missing provider argument"))?;
                Ok(LazyUser {
                    token: provider.clone(),
                })
            },
        ))
        .unwrap();

    let user = registry.lookup::<LazyUser>().unwrap();
    // Nothing provides Token yet
    assert!(user.token.get().unwrap().is_null());

    struct Vault;
    registry
        .register_metadata(ClassMetadata::of::<Vault>().utility().provides(
            ProvidesMember::static_field("token", || Token("t-1")),
        ))
        .unwrap();

    let got = user.token.get().unwrap();
    assert_eq!(got.downcast::<Token>().unwrap().0, "t-1");
}

#[test]
fn wrong_type_for_key_is_a_downcast_error() {
    let registry = ServiceRegistry::new();
    registry.register_metadata(config_meta()).unwrap();

    let err = registry
        .lookup_key::<String>(&ServiceKey::of::<Config>())
        .unwrap_err();
    assert!(matches!(err, Error::Downcast { .. }));
}

#[test]
fn report_counts_catalog_and_descriptors() {
    let registry = ServiceRegistry::new();
    registry.register_metadata(config_meta()).unwrap();
    let _ = registry.lookup::<Config>().unwrap();

    let report = registry.report();
    assert_eq!(report.classes, 1);
    assert_eq!(report.descriptors, 1);
    assert_eq!(report.singletons_built, 1);

    let json = registry.report_json().unwrap();
    assert!(json.contains("\"descriptors\""));
}
