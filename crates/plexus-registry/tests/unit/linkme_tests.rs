//! Auto-registration through the distributed slice

use linkme::distributed_slice;
use plexus_registry::domain::{ClassEntry, ClassMetadata, PLEXUS_CLASSES};
use plexus_registry::ServiceRegistry;

#[derive(Debug)]
struct LinkedWidget {
    marker: &'static str,
}

fn linked_widget_metadata() -> ClassMetadata {
    ClassMetadata::of::<LinkedWidget>()
        .constructs::<LinkedWidget>(vec![], |_| Ok(LinkedWidget { marker: "linked" }))
}

#[distributed_slice(PLEXUS_CLASSES)]
static LINKED_WIDGET: ClassEntry = ClassEntry {
    name: "LinkedWidget",
    metadata: linked_widget_metadata,
};

#[test]
fn linked_classes_are_discoverable() {
    let names = plexus_registry::domain::list_classes();
    assert!(names.contains(&"LinkedWidget"));
}

#[test]
fn register_linked_activates_slice_entries() {
    let registry = ServiceRegistry::new();
    let count = registry.register_linked().unwrap();
    assert!(count >= 1);

    let widget = registry.lookup::<LinkedWidget>().unwrap();
    assert_eq!(widget.marker, "linked");
}

#[test]
fn load_linked_catalogs_without_activating() {
    let registry = ServiceRegistry::new();
    let count = registry.load_linked();
    assert!(count >= 1);

    // Cataloged but not scanned: nothing is fetchable yet
    assert!(registry.lookup::<LinkedWidget>().unwrap_err().is_not_found());
    assert_eq!(registry.report().descriptors, 0);

    // Explicit activation brings it live
    registry.register::<LinkedWidget>().unwrap();
    assert!(registry.lookup::<LinkedWidget>().is_ok());
}
