//! Lifecycle coordination: start/stop hooks, handles, destroy directives,
//! shutdown ordering

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use plexus_registry::domain::{
    ClassMetadata, DestroyDirective, DestroyTarget, Error, LifecycleHooks, ProvidesMember, Scope,
};
use plexus_registry::{LifecycleState, ServiceRegistry};

#[test]
fn start_hook_runs_once_per_singleton() {
    static STARTED: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug)]
    struct Engine;

    let registry = ServiceRegistry::new();
    registry
        .register_metadata(
            ClassMetadata::of::<Engine>()
                .constructs::<Engine>(vec![], |_| Ok(Engine))
                .with_hooks(LifecycleHooks::none().on_start::<Engine>(|_| {
                    STARTED.fetch_add(1, Ordering::SeqCst);
                })),
        )
        .unwrap();

    let _ = registry.lookup::<Engine>().unwrap();
    let _ = registry.lookup::<Engine>().unwrap();
    assert_eq!(STARTED.load(Ordering::SeqCst), 1);
}

#[test]
fn handle_close_runs_stop_hook_exactly_once() {
    static STOPPED: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug)]
    struct Stream;

    let registry = ServiceRegistry::new();
    registry
        .register_metadata(
            ClassMetadata::of::<Stream>()
                .with_scope(Scope::PerLookup)
                .constructs::<Stream>(vec![], |_| Ok(Stream))
                .with_hooks(LifecycleHooks::none().on_stop::<Stream>(|_| {
                    STOPPED.fetch_add(1, Ordering::SeqCst);
                })),
        )
        .unwrap();

    let handle = registry.lookup_handle::<Stream>().unwrap();
    assert_eq!(handle.state(), LifecycleState::Started);

    handle.close().unwrap();
    assert_eq!(handle.state(), LifecycleState::Stopped);
    assert_eq!(STOPPED.load(Ordering::SeqCst), 1);

    // Repeated close is a no-op, not a second teardown
    handle.close().unwrap();
    assert_eq!(STOPPED.load(Ordering::SeqCst), 1);
}

#[test]
fn singleton_handle_close_leaves_the_instance_running() {
    static STOPPED: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug)]
    struct Cache;

    let registry = ServiceRegistry::new();
    registry
        .register_metadata(
            ClassMetadata::of::<Cache>()
                .constructs::<Cache>(vec![], |_| Ok(Cache))
                .with_hooks(LifecycleHooks::none().on_stop::<Cache>(|_| {
                    STOPPED.fetch_add(1, Ordering::SeqCst);
                })),
        )
        .unwrap();

    let handle = registry.lookup_handle::<Cache>().unwrap();
    handle.close().unwrap();

    // Registry-owned instance: still started, stop deferred to shutdown
    assert_eq!(handle.state(), LifecycleState::Started);
    assert_eq!(STOPPED.load(Ordering::SeqCst), 0);

    registry.shutdown().unwrap();
    assert_eq!(STOPPED.load(Ordering::SeqCst), 1);
}

#[test]
fn destroy_directive_replaces_the_stop_hook() {
    static DESTROYED: AtomicUsize = AtomicUsize::new(0);
    static STOPPED: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug)]
    struct Conn;
    struct Pool;

    let registry = ServiceRegistry::new();
    registry
        .register_metadata(
            ClassMetadata::of::<Pool>().utility().provides(
                ProvidesMember::static_field("conn", || Conn)
                    .with_scope(Scope::PerLookup)
                    .with_hooks(LifecycleHooks::none().on_stop::<Conn>(|_| {
                        STOPPED.fetch_add(1, Ordering::SeqCst);
                    }))
                    .with_destroy(DestroyDirective::of::<Conn>(
                        "release",
                        DestroyTarget::ProvidedInstance,
                        |_| {
                            DESTROYED.fetch_add(1, Ordering::SeqCst);
                        },
                    )),
            ),
        )
        .unwrap();

    let handle = registry.lookup_handle::<Conn>().unwrap();
    handle.close().unwrap();

    assert_eq!(DESTROYED.load(Ordering::SeqCst), 1);
    assert_eq!(STOPPED.load(Ordering::SeqCst), 0);
}

#[test]
fn shutdown_stops_singletons_in_reverse_creation_order() {
    static ORDER: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    #[derive(Debug)]
    struct First;
    #[derive(Debug)]
    struct Second;

    let registry = ServiceRegistry::new();
    registry
        .register_metadata(
            ClassMetadata::of::<First>()
                .constructs::<First>(vec![], |_| Ok(First))
                .with_hooks(
                    LifecycleHooks::none()
                        .on_stop::<First>(|_| ORDER.lock().unwrap().push("first")),
                ),
        )
        .unwrap();
    registry
        .register_metadata(
            ClassMetadata::of::<Second>()
                .constructs::<Second>(vec![], |_| Ok(Second))
                .with_hooks(
                    LifecycleHooks::none()
                        .on_stop::<Second>(|_| ORDER.lock().unwrap().push("second")),
                ),
        )
        .unwrap();

    let _ = registry.lookup::<First>().unwrap();
    let _ = registry.lookup::<Second>().unwrap();

    registry.shutdown().unwrap();
    assert_eq!(*ORDER.lock().unwrap(), vec!["second", "first"]);
}

#[test]
fn shutdown_is_idempotent_and_runs_registered_hooks() {
    static HOOK_RUNS: AtomicUsize = AtomicUsize::new(0);

    let registry = ServiceRegistry::new();
    registry.on_shutdown(Box::new(|| {
        HOOK_RUNS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    registry.shutdown().unwrap();
    registry.shutdown().unwrap();
    assert_eq!(HOOK_RUNS.load(Ordering::SeqCst), 1);
}

#[test]
fn teardown_failures_aggregate_without_blocking_others() {
    static SURVIVOR_STOPPED: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug)]
    struct Flaky;
    #[derive(Debug)]
    struct Steady;

    let mut failing = LifecycleHooks::none();
    failing.stop = Some(Arc::new(|_| Err(Error::container("flaky refused to stop"))));

    let registry = ServiceRegistry::new();
    registry
        .register_metadata(
            ClassMetadata::of::<Steady>()
                .constructs::<Steady>(vec![], |_| Ok(Steady))
                .with_hooks(LifecycleHooks::none().on_stop::<Steady>(|_| {
                    SURVIVOR_STOPPED.fetch_add(1, Ordering::SeqCst);
                })),
        )
        .unwrap();
    registry
        .register_metadata(
            ClassMetadata::of::<Flaky>()
                .constructs::<Flaky>(vec![], |_| Ok(Flaky))
                .with_hooks(failing),
        )
        .unwrap();

    let _ = registry.lookup::<Steady>().unwrap();
    let _ = registry.lookup::<Flaky>().unwrap();

    match registry.shutdown() {
        Err(Error::Teardown { errors }) => assert_eq!(errors.len(), 1),
        other => panic!("expected teardown aggregate, got {other:?}"),
    }
    // The failure did not block the other instance's teardown
    assert_eq!(SURVIVOR_STOPPED.load(Ordering::SeqCst), 1);
}
